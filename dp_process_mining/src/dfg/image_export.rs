use std::{collections::HashMap, fs::File, io::Write};

use graphviz_rust::{
    cmd::Format,
    dot_generator::{attr, edge, graph, id, node, node_id, stmt},
    dot_structures::*,
    printer::{DotPrinter, PrinterContext},
};
use uuid::Uuid;

use super::dfg_struct::DirectlyFollowsGraph;
use crate::privacy::trace_statistics::{END_ACTIVITY, START_ACTIVITY};

///
/// Export the image of a [`DirectlyFollowsGraph`]
///
/// Also see [`export_dfg_image_svg`] and [`export_dfg_image_png`]
///
pub fn export_dfg_image<P: AsRef<std::path::Path>>(
    dfg: &DirectlyFollowsGraph<'_>,
    path: P,
    format: Format,
    dpi_factor: Option<f32>,
) -> Result<(), std::io::Error> {
    let g = export_dfg_to_dot_graph(dfg, dpi_factor);

    let out = graphviz_rust::exec(g, &mut PrinterContext::default(), vec![format.into()])?;

    let mut f = File::create(path)?;
    f.write_all(&out)?;
    Ok(())
}

/// Node id of the start marker
const START_NODE: &str = "0xb2e-start-0x31c";
/// Node id of the end marker
const END_NODE: &str = "0xb2e-end-0x31c";

///
/// Export a [`DirectlyFollowsGraph`] to a DOT graph (used in Graphviz)
///
/// Start and end activities are connected to explicit start/end marker nodes. Activities are
/// addressed by generated node ids (`act-<i>` in sorted label order), so any activity label,
/// including [`START_ACTIVITY`] and [`END_ACTIVITY`], yields a node of its own. Arcs referring to
/// activities the graph does not contain are skipped. Equal graphs yield equal DOT sources
/// (apart from the random graph id).
///
pub fn export_dfg_to_dot_graph(dfg: &DirectlyFollowsGraph<'_>, dpi_factor: Option<f32>) -> Graph {
    let mut sorted_acts: Vec<(&String, &u32)> = dfg.activities.iter().collect();
    sorted_acts.sort();
    let node_ids: HashMap<&str, String> = sorted_acts
        .iter()
        .enumerate()
        .map(|(i, (act, _))| (act.as_str(), format!("act-{i}")))
        .collect();

    let marker_nodes = vec![
        stmt!(node!(esc START_NODE; attr!("label", esc ""), attr!("tooltip", esc START_ACTIVITY), attr!("shape", "circle"), attr!("style", "filled"), attr!("fillcolor", "\"#4B9969\""), attr!("width", 0.3))),
        stmt!(node!(esc END_NODE; attr!("label", esc ""), attr!("tooltip", esc END_ACTIVITY), attr!("shape", "doublecircle"), attr!("style", "filled"), attr!("fillcolor", "\"#D4001F\""), attr!("width", 0.3))),
    ];

    let activity_nodes: Vec<Stmt> = sorted_acts
        .iter()
        .map(|(act, count)| {
            let node_id = &node_ids[act.as_str()];
            let counted_label = format!("{act}: {count}");
            stmt!(node!(esc node_id; attr!("label", esc counted_label), attr!("shape", "box"), attr!("style", "rounded"), attr!("fontsize", 12), attr!("height", 0.5)))
        })
        .collect();

    let mut sorted_arcs: Vec<(&String, &String, u32)> = dfg
        .directly_follows_relations
        .iter()
        .filter_map(|((from, to), frequency)| {
            Some((node_ids.get(&**from)?, node_ids.get(&**to)?, *frequency))
        })
        .collect();
    sorted_arcs.sort();
    let mut starts: Vec<&String> = dfg
        .start_activities
        .iter()
        .filter_map(|a| node_ids.get(a.as_str()))
        .collect();
    starts.sort();
    let mut ends: Vec<&String> = dfg
        .end_activities
        .iter()
        .filter_map(|a| node_ids.get(a.as_str()))
        .collect();
    ends.sort();

    let arcs: Vec<Stmt> = sorted_arcs
        .into_iter()
        .map(|(from, to, frequency)| {
            stmt!(edge!(node_id!(esc from) => node_id!(esc to), vec![attr!("label", (format!("{}", frequency)))]))
        })
        .chain(starts.into_iter().map(|act| {
            stmt!(edge!(node_id!(esc START_NODE) => node_id!(esc act), vec![attr!("style", "dashed")]))
        }))
        .chain(ends.into_iter().map(|act| {
            stmt!(edge!(node_id!(esc act) => node_id!(esc END_NODE), vec![attr!("style", "dashed")]))
        }))
        .collect();

    let mut global_graph_options = vec![stmt!(attr!("rankdir", "LR"))];
    if let Some(dpi_fac) = dpi_factor {
        global_graph_options.push(stmt!(attr!("dpi", (dpi_fac * 96.0))))
    }

    graph!(strict di id!(esc Uuid::new_v4()), vec![global_graph_options, marker_nodes, activity_nodes, arcs].into_iter().flatten().collect())
}

///
/// Convert a [`DirectlyFollowsGraph`] to a String containing its DOT source
///
pub fn export_dfg_to_dot_string(dfg: &DirectlyFollowsGraph<'_>) -> String {
    export_dfg_to_dot_graph(dfg, None).print(&mut PrinterContext::default())
}

///
/// Export the image of a [`DirectlyFollowsGraph`] as a SVG file
///
/// Also consider using [`DirectlyFollowsGraph::export_svg`] for convenience.
pub fn export_dfg_image_svg<P: AsRef<std::path::Path>>(
    dfg: &DirectlyFollowsGraph<'_>,
    path: P,
) -> Result<(), std::io::Error> {
    export_dfg_image(dfg, path, Format::Svg, None)
}

///
/// Export the image of a [`DirectlyFollowsGraph`] as a PNG file
///
/// Also consider using [`DirectlyFollowsGraph::export_png`] for convenience.
pub fn export_dfg_image_png<P: AsRef<std::path::Path>>(
    dfg: &DirectlyFollowsGraph<'_>,
    path: P,
) -> Result<(), std::io::Error> {
    export_dfg_image(dfg, path, Format::Png, Some(2.0))
}
