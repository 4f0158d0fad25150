use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use rusqlite::Connection;
use serde::Deserialize;

use crate::workspace::{AttendanceWorkspace, WorkspaceEvent};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The open attendance session and the event feed the sidecar drains after each request.
pub struct Session {
    pub workspace: AttendanceWorkspace,
    pub events: Receiver<WorkspaceEvent>,
}

impl Session {
    /// Empty the event feed. Returns true when a save asked for committed
    /// records to be re-fetched.
    pub fn drain_events(&self) -> bool {
        let mut refresh = false;
        for event in self.events.try_iter() {
            if let WorkspaceEvent::RefreshCommitted(_) = event {
                refresh = true;
            }
        }
        refresh
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub db_file_name: String,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(db_file_name: impl Into<String>) -> Self {
        Self {
            workspace: None,
            db: None,
            db_file_name: db_file_name.into(),
            session: None,
        }
    }
}
