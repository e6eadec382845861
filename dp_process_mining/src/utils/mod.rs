#[cfg(test)]
/// Helpers shared by tests
pub mod test_utils {
    use std::path::PathBuf;

    /// Directory containing the fixture event logs
    pub fn get_test_data_path() -> PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data")
    }
}
