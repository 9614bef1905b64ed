use super::validation::FieldViolation;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;

/// Outcome of handing a completed questionnaire to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Accepted,
    /// Nothing was written; lists every field outside the length bounds
    Rejected(Vec<FieldViolation>),
}

/// Durable storage as seen by the conversation engine and the dispatcher.
///
/// `Err` means the store itself failed (unavailable, I/O); a record that does
/// not pass validation is `Ok(InsertOutcome::Rejected)`.
pub trait SightingStore: Send + Sync {
    fn insert(&self, fields: &[String]) -> impl Future<Output = Result<InsertOutcome>> + Send;

    /// Human-readable listing of recent records, empty when there are none
    fn render_recent(&self) -> impl Future<Output = Result<String>> + Send;
}

impl<S: SightingStore> SightingStore for Arc<S> {
    fn insert(&self, fields: &[String]) -> impl Future<Output = Result<InsertOutcome>> + Send {
        (**self).insert(fields)
    }

    fn render_recent(&self) -> impl Future<Output = Result<String>> + Send {
        (**self).render_recent()
    }
}
