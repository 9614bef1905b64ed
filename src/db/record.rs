/// One stored sighting: insertion time plus the answers in question order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Seconds since the epoch, taken from the server clock at insert time
    pub timestamp: i64,
    pub fields: Vec<String>,
}
