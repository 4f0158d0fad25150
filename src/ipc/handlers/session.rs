use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    check_form, get_optional_str, get_required_date, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request, Session};
use crate::model::Scope;
use crate::store::SqliteStore;
use crate::validation::FieldError;
use crate::workspace::AttendanceWorkspace;
use chrono::Local;
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

const LAST_SESSION_KEY: &str = "session.last";

pub fn session_view(ws: &AttendanceWorkspace) -> serde_json::Value {
    let students: Vec<serde_json::Value> = ws
        .roster()
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "rollNumber": s.roll_number,
                "yearOfStudy": s.year_of_study,
                "status": ws.status_of(&s.id),
                "pending": ws.is_pending(&s.id)
            })
        })
        .collect();
    json!({
        "sessionId": ws.id().to_string(),
        "scope": ws.scope(),
        "markedBy": ws.marked_by(),
        "students": students,
        "stats": ws.stats(),
        "pendingCount": ws.pending_count(),
        "saving": ws.is_saving()
    })
}

fn session_open(conn: &Connection, params: &serde_json::Value) -> Result<Session, HandlerErr> {
    let scope = Scope {
        course_id: get_required_str(params, "courseId")?,
        academic_year_id: get_required_str(params, "academicYearId")?,
        date: get_required_date(params, "date")?,
    };
    if scope.date > Local::now().date_naive() {
        check_form(vec![FieldError::new(
            "date",
            "attendance cannot be marked for a future date",
        )])?;
    }
    let marked_by = get_required_str(params, "markedBy")?;
    if marked_by.trim().is_empty() {
        return Err(HandlerErr::bad_params("markedBy must not be empty"));
    }
    let year_of_study = get_optional_str(params, "yearOfStudy");

    let store = SqliteStore::new(conn);
    if !store.course_exists(&scope.course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }
    if !store.academic_year_exists(&scope.academic_year_id)? {
        return Err(HandlerErr::new("not_found", "academic year not found"));
    }

    let last = json!({
        "courseId": scope.course_id,
        "academicYearId": scope.academic_year_id,
        "yearOfStudy": year_of_study,
        "markedBy": marked_by,
    });
    let mut workspace = AttendanceWorkspace::open(scope, marked_by, year_of_study, &store)?;
    let events = workspace.subscribe();
    db::settings_set_json(conn, LAST_SESSION_KEY, &last)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(Session { workspace, events })
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match session_open(conn, &req.params) {
        Ok(session) => {
            // A new scope never inherits staged marks from the previous one.
            if let Some(prev) = state.session.take() {
                info!(
                    discarded_pending = prev.workspace.pending_count(),
                    "previous attendance session closed"
                );
            }
            let view = session_view(&session.workspace);
            state.session = Some(session);
            ok(&req.id, view)
        }
        Err(error) => error.response(&req.id),
    }
}

fn handle_session_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let discarded = state
        .session
        .take()
        .map(|s| s.workspace.pending_count())
        .unwrap_or(0);
    ok(&req.id, json!({ "discardedPending": discarded }))
}

fn handle_session_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(session) => ok(&req.id, session_view(&session.workspace)),
        None => err(&req.id, "no_session", "open an attendance session first", None),
    }
}

fn handle_session_last(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match db::settings_get_json(conn, LAST_SESSION_KEY) {
        Ok(last) => ok(&req.id, json!({ "last": last })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.open" => Some(handle_session_open(state, req)),
        "session.close" => Some(handle_session_close(state, req)),
        "session.state" => Some(handle_session_state(state, req)),
        "session.last" => Some(handle_session_last(state, req)),
        _ => None,
    }
}
