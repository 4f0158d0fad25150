use crate::model::{AttendanceRecord, BatchOutcome, Scope, Student, StudentFilter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Raised by remote backends; the local store never produces it.
    #[allow(dead_code)]
    #[error("transport error: {0}")]
    Transport(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Transport(_) => "transport_failed",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Storage(_) => "db_query_failed",
        }
    }
}

/// Read side of the attendance backend.
pub trait QueryService {
    fn fetch_attendance(&self, scope: &Scope) -> Result<Vec<AttendanceRecord>, ServiceError>;
    fn fetch_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, ServiceError>;
}

/// Write side of the attendance backend. Marking only stages locally; this is
/// reached from a save.
pub trait CommandService {
    fn create_attendance(&mut self, record: &AttendanceRecord) -> Result<(), ServiceError>;

    /// One request for the whole batch. `Err` means the batch as a whole did
    /// not go through; per-record rejections are reported in the outcome.
    fn create_attendance_batch(
        &mut self,
        records: &[AttendanceRecord],
    ) -> Result<BatchOutcome, ServiceError>;
}
