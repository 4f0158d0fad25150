use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{check_form, get_optional_str, get_required_date, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentFilter;
use crate::report::attendance_summary;
use crate::services::QueryService;
use crate::store::SqliteStore;
use crate::validation::DateRangeForm;
use rusqlite::Connection;
use serde_json::json;

fn attendance_summary_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let academic_year_id = get_required_str(params, "academicYearId")?;
    let range = DateRangeForm {
        from: get_required_date(params, "from")?,
        to: get_required_date(params, "to")?,
    };
    check_form(range.validate())?;

    let store = SqliteStore::new(conn);
    if !store.course_exists(&course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }
    let students = store.fetch_students(&StudentFilter {
        course_id: Some(course_id.clone()),
        academic_year_id: Some(academic_year_id.clone()),
        year_of_study: get_optional_str(params, "yearOfStudy"),
    })?;
    let records = store.fetch_attendance_range(&course_id, &academic_year_id, range.from, range.to)?;
    let report = attendance_summary(&students, &records);

    Ok(json!({
        "courseId": course_id,
        "academicYearId": academic_year_id,
        "from": range.from,
        "to": range.to,
        "report": report
    }))
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_summary_model(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.attendanceSummary" => Some(handle_attendance_summary(state, req)),
        _ => None,
    }
}
