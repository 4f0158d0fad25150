use crate::ipc::error::err;
use crate::model::AttendanceStatus;
use crate::services::ServiceError;
use crate::validation::FieldError;
use crate::workspace::WorkspaceError;
use chrono::NaiveDate;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ServiceError> for HandlerErr {
    fn from(e: ServiceError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<WorkspaceError> for HandlerErr {
    fn from(e: WorkspaceError) -> Self {
        let details = match &e {
            WorkspaceError::DuplicateMark { student_id }
            | WorkspaceError::UnknownStudent { student_id } => {
                Some(json!({ "studentId": student_id }))
            }
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Turns a non-empty list of field errors into a `validation_failed` reply.
pub fn check_form(errors: Vec<FieldError>) -> Result<(), HandlerErr> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(HandlerErr {
        code: "validation_failed",
        message: errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        details: Some(json!({ "fields": errors })),
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    raw.parse().map_err(HandlerErr::bad_params)
}
