use crate::ipc::error::{err, ok};
use crate::ipc::handlers::session::session_view;
use crate::ipc::helpers::{check_form, get_required_date, get_required_str, get_status, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use crate::model::{AttendanceRecord, Scope};
use crate::services::{CommandService, QueryService};
use crate::store::SqliteStore;
use crate::validation::AttendanceForm;
use crate::workspace::SaveOutcome;
use chrono::{Local, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

fn attendance_mark(session: &mut Session, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let scope = session.workspace.scope().clone();
    let form = AttendanceForm {
        student_id: student_id.clone(),
        course_id: scope.course_id,
        academic_year_id: scope.academic_year_id,
        date: scope.date,
        status: get_required_str(params, "status")?,
    };
    check_form(form.validate(Local::now().date_naive()))?;
    let status = get_status(params)?;

    let stats = session.workspace.mark(&student_id, status)?;
    Ok(json!({
        "studentId": student_id,
        "status": status,
        "stats": stats,
        "pendingCount": session.workspace.pending_count()
    }))
}

fn attendance_mark_all_present(session: &mut Session) -> serde_json::Value {
    let staged = session.workspace.mark_all_unmarked_present();
    json!({
        "staged": staged,
        "stats": session.workspace.stats(),
        "pendingCount": session.workspace.pending_count()
    })
}

fn attendance_save(conn: &Connection, session: &mut Session) -> Result<serde_json::Value, HandlerErr> {
    let mut store = SqliteStore::new(conn);
    let outcome = session.workspace.save(&mut store)?;

    // The workspace asks for a refresh instead of reaching into the store itself.
    // The batch is already written by now, so a failed re-fetch only leaves the
    // optimistic view in place.
    let mut refresh_failed = false;
    if session.drain_events() {
        if let Err(e) = session.workspace.refresh(&store) {
            warn!(error = %e, "re-fetch after attendance save failed");
            refresh_failed = true;
        }
    }

    let result = match outcome {
        SaveOutcome::NothingToSave => json!({
            "saved": false,
            "nothingToSave": true,
            "session": session_view(&session.workspace)
        }),
        SaveOutcome::Saved(report) => json!({
            "saved": true,
            "nothingToSave": false,
            "report": report,
            "partial": report.is_partial(),
            "refreshFailed": refresh_failed,
            "session": session_view(&session.workspace)
        }),
    };
    Ok(result)
}

fn parse_scope(params: &serde_json::Value) -> Result<Scope, HandlerErr> {
    Ok(Scope {
        course_id: get_required_str(params, "courseId")?,
        academic_year_id: get_required_str(params, "academicYearId")?,
        date: get_required_date(params, "date")?,
    })
}

fn attendance_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let scope = parse_scope(params)?;
    let records = SqliteStore::new(conn).fetch_attendance(&scope)?;
    Ok(json!({ "records": records }))
}

/// Persist one record directly, outside the staged workflow. An open session on
/// the same scope is refreshed so it sees the new record.
fn attendance_create(
    conn: &Connection,
    session: Option<&mut Session>,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let scope = parse_scope(params)?;
    let form = AttendanceForm {
        student_id: get_required_str(params, "studentId")?,
        course_id: scope.course_id.clone(),
        academic_year_id: scope.academic_year_id.clone(),
        date: scope.date,
        status: get_required_str(params, "status")?,
    };
    check_form(form.validate(Local::now().date_naive()))?;
    let record = AttendanceRecord {
        student_id: form.student_id,
        course_id: scope.course_id.clone(),
        academic_year_id: scope.academic_year_id.clone(),
        date: scope.date,
        status: get_status(params)?,
        marked_by: get_required_str(params, "markedBy")?,
        marked_at: Utc::now(),
    };

    let mut store = SqliteStore::new(conn);
    store.create_attendance(&record)?;
    info!(student_id = %record.student_id, date = %record.date, "attendance recorded directly");

    if let Some(session) = session {
        if *session.workspace.scope() == scope {
            session.workspace.refresh(&store)?;
        }
    }
    Ok(json!({ "record": record }))
}

fn handle_session_op(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "open an attendance session first", None);
    };
    let result = match req.method.as_str() {
        "attendance.mark" => attendance_mark(session, &req.params),
        "attendance.markAllPresent" => Ok(attendance_mark_all_present(session)),
        "attendance.save" => attendance_save(conn, session),
        "attendance.stats" => Ok(json!({
            "stats": session.workspace.stats(),
            "pendingCount": session.workspace.pending_count()
        })),
        other => Err(HandlerErr::new(
            "not_implemented",
            format!("unknown method: {}", other),
        )),
    };
    session.drain_events();
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_list(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = attendance_create(conn, state.session.as_mut(), &req.params);
    if let Some(session) = state.session.as_ref() {
        session.drain_events();
    }
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark"
        | "attendance.markAllPresent"
        | "attendance.save"
        | "attendance.stats" => Some(handle_session_op(state, req)),
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.create" => Some(handle_attendance_create(state, req)),
        _ => None,
    }
}
