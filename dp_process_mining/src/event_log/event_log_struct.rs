use serde::{Deserialize, Serialize};

///
/// A single recorded event
///
/// Only the activity label is relevant for directly-follows statistics.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Event {
    /// Activity label of the event
    pub activity: String,
}

impl Event {
    /// Create a new event with the provided activity
    pub fn new<S: Into<String>>(activity: S) -> Self {
        Event {
            activity: activity.into(),
        }
    }
}

impl From<&str> for Event {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

///
/// Trace consisting of an ordered list of [`Event`]s of one case
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trace {
    /// Case identifier
    #[serde(default)]
    pub case_id: String,
    /// Events contained in trace (in order of occurrence)
    pub events: Vec<Event>,
}

impl Trace {
    /// Create a trace from a case id and a sequence of activity labels
    pub fn from_activities<I, S>(case_id: impl Into<String>, activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Trace {
            case_id: case_id.into(),
            events: activities.into_iter().map(Event::new).collect(),
        }
    }

    /// Activity labels of the trace, in order
    pub fn activities(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.iter().map(|e| e.activity.as_str())
    }
}

///
/// Event log consisting of a list of [`Trace`]s
///
/// Immutable once ingested: the privacy pipeline only ever reads it.
///
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventLog {
    /// Traces contained in log
    pub traces: Vec<Trace>,
}

impl EventLog {
    /// Build an event log from activity sequences
    ///
    /// Case ids are assigned by position (`"0"`, `"1"`, ...).
    pub fn from_activity_sequences<I, T, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventLog {
            traces: sequences
                .into_iter()
                .enumerate()
                .map(|(i, acts)| Trace::from_activities(i.to_string(), acts))
                .collect(),
        }
    }

    /// Number of events over all traces
    pub fn num_events(&self) -> usize {
        self.traces.iter().map(|t| t.events.len()).sum()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
