//! Attendance reconciliation for one (course, academic year, date) scope.
//!
//! Two record sets are merged here: `committed` holds what the backend already
//! persisted, `pending` holds marks staged locally and not yet saved. A student
//! appears in at most one of the two. Everything the UI shows about a roster row
//! comes from [`AttendanceWorkspace::status_of`].

use crate::model::{
    AttendanceRecord, AttendanceStats, AttendanceStatus, BatchOutcome, MarkState, Scope, Student,
    StudentFilter,
};
use crate::services::{CommandService, QueryService, ServiceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("attendance already marked for student {student_id}")]
    DuplicateMark { student_id: String },

    #[error("student {student_id} is not in the loaded roster")]
    UnknownStudent { student_id: String },

    #[error("a save is already in progress")]
    SaveInFlight,

    #[error("save ticket does not belong to this session")]
    StaleSave,

    #[error("save failed: {0}")]
    Save(#[source] ServiceError),

    #[error("loading attendance failed: {0}")]
    Query(#[source] ServiceError),
}

impl WorkspaceError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkspaceError::DuplicateMark { .. } => "duplicate_mark",
            WorkspaceError::UnknownStudent { .. } => "unknown_student",
            WorkspaceError::SaveInFlight => "save_in_flight",
            WorkspaceError::StaleSave => "stale_save",
            WorkspaceError::Save(_) => "save_failed",
            WorkspaceError::Query(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// Derived statistics were recomputed; views should re-render.
    Changed(AttendanceStats),
    /// A batch was persisted; the owner should re-fetch committed records for the scope.
    RefreshCommitted(Scope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingMark {
    status: AttendanceStatus,
    marked_at: DateTime<Utc>,
}

/// Handed out by [`AttendanceWorkspace::begin_save`]; carries the exact batch to submit.
#[derive(Debug)]
pub struct SaveTicket {
    workspace_id: Uuid,
    records: Vec<AttendanceRecord>,
}

impl SaveTicket {
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SaveReport {
    /// The batch went through but the backend rejected some of its records.
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingToSave,
    Saved(SaveReport),
}

pub struct AttendanceWorkspace {
    id: Uuid,
    scope: Scope,
    marked_by: String,
    roster: Vec<Student>,
    roster_ids: HashSet<String>,
    committed: HashMap<String, AttendanceStatus>,
    pending: BTreeMap<String, PendingMark>,
    stats: AttendanceStats,
    save_in_flight: bool,
    subscribers: Vec<Sender<WorkspaceEvent>>,
}

impl AttendanceWorkspace {
    pub fn new(
        scope: Scope,
        marked_by: impl Into<String>,
        roster: Vec<Student>,
        committed: Vec<AttendanceRecord>,
    ) -> Self {
        let roster_ids = roster.iter().map(|s| s.id.clone()).collect();
        let mut ws = Self {
            id: Uuid::new_v4(),
            scope,
            marked_by: marked_by.into(),
            roster,
            roster_ids,
            committed: HashMap::new(),
            pending: BTreeMap::new(),
            stats: AttendanceStats::default(),
            save_in_flight: false,
            subscribers: Vec::new(),
        };
        ws.rebuild_committed(committed);
        ws.recompute();
        ws
    }

    /// Fetch roster and committed records for `scope` and start with nothing staged.
    pub fn open(
        scope: Scope,
        marked_by: impl Into<String>,
        year_of_study: Option<String>,
        query: &dyn QueryService,
    ) -> Result<Self, WorkspaceError> {
        let filter = StudentFilter::for_scope(&scope, year_of_study);
        let roster = query
            .fetch_students(&filter)
            .map_err(WorkspaceError::Query)?;
        let committed = query
            .fetch_attendance(&scope)
            .map_err(WorkspaceError::Query)?;
        info!(
            course_id = %scope.course_id,
            academic_year_id = %scope.academic_year_id,
            date = %scope.date,
            roster = roster.len(),
            committed = committed.len(),
            "attendance session opened"
        );
        Ok(Self::new(scope, marked_by, roster, committed))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn marked_by(&self) -> &str {
        &self.marked_by
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn stats(&self) -> AttendanceStats {
        self.stats
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_saving(&self) -> bool {
        self.save_in_flight
    }

    pub fn subscribe(&mut self) -> Receiver<WorkspaceEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn status_of(&self, student_id: &str) -> MarkState {
        if let Some(p) = self.pending.get(student_id) {
            return MarkState::Marked(p.status);
        }
        match self.committed.get(student_id) {
            Some(s) => MarkState::Marked(*s),
            None => MarkState::NotMarked,
        }
    }

    pub fn is_marked(&self, student_id: &str) -> bool {
        self.pending.contains_key(student_id) || self.committed.contains_key(student_id)
    }

    /// True when the mark is staged locally but not yet persisted.
    pub fn is_pending(&self, student_id: &str) -> bool {
        self.pending.contains_key(student_id)
    }

    pub fn mark(
        &mut self,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceStats, WorkspaceError> {
        if self.is_marked(student_id) {
            return Err(WorkspaceError::DuplicateMark {
                student_id: student_id.to_string(),
            });
        }
        if !self.roster_ids.contains(student_id) {
            return Err(WorkspaceError::UnknownStudent {
                student_id: student_id.to_string(),
            });
        }
        self.pending.insert(
            student_id.to_string(),
            PendingMark {
                status,
                marked_at: Utc::now(),
            },
        );
        debug!(student_id, %status, "attendance staged");
        self.recompute();
        Ok(self.stats)
    }

    /// Stage `present` for every roster student that has no mark yet.
    /// Returns how many were newly staged.
    pub fn mark_all_unmarked_present(&mut self) -> usize {
        let now = Utc::now();
        let unmarked: Vec<String> = self
            .roster
            .iter()
            .filter(|s| !self.is_marked(&s.id))
            .map(|s| s.id.clone())
            .collect();
        for id in &unmarked {
            self.pending.insert(
                id.clone(),
                PendingMark {
                    status: AttendanceStatus::Present,
                    marked_at: now,
                },
            );
        }
        if !unmarked.is_empty() {
            debug!(count = unmarked.len(), "staged remaining students present");
            self.recompute();
        }
        unmarked.len()
    }

    /// Reserve the save slot and snapshot everything pending into one batch.
    /// `Ok(None)` means there is nothing to save. The slot stays taken until the
    /// ticket comes back through [`Self::finish_save`] or [`Self::abandon_save`].
    pub fn begin_save(&mut self) -> Result<Option<SaveTicket>, WorkspaceError> {
        if self.save_in_flight {
            return Err(WorkspaceError::SaveInFlight);
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let records = self
            .pending
            .iter()
            .map(|(student_id, p)| AttendanceRecord {
                student_id: student_id.clone(),
                course_id: self.scope.course_id.clone(),
                academic_year_id: self.scope.academic_year_id.clone(),
                date: self.scope.date,
                status: p.status,
                marked_by: self.marked_by.clone(),
                marked_at: p.marked_at,
            })
            .collect();
        self.save_in_flight = true;
        Ok(Some(SaveTicket {
            workspace_id: self.id,
            records,
        }))
    }

    /// Apply the collaborator's answer for `ticket`.
    ///
    /// On failure nothing staged is touched. On success the submitted marks
    /// leave `pending` and stand in `committed` until the next refresh, even
    /// when the backend rejected some of them.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<BatchOutcome, ServiceError>,
    ) -> Result<SaveReport, WorkspaceError> {
        if ticket.workspace_id != self.id {
            return Err(WorkspaceError::StaleSave);
        }
        self.save_in_flight = false;

        let outcome = match result {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, pending = self.pending.len(), "attendance batch save failed");
                return Err(WorkspaceError::Save(e));
            }
        };

        for record in &ticket.records {
            self.pending.remove(&record.student_id);
            self.committed.insert(record.student_id.clone(), record.status);
        }
        let report = SaveReport {
            submitted: ticket.records.len(),
            succeeded: outcome.success_count,
            failed: outcome.error_count,
        };
        if report.is_partial() {
            warn!(
                submitted = report.submitted,
                failed = report.failed,
                "attendance batch saved with rejected records"
            );
        } else {
            info!(submitted = report.submitted, "attendance batch saved");
        }
        self.recompute();
        self.publish(WorkspaceEvent::RefreshCommitted(self.scope.clone()));
        Ok(report)
    }

    /// Release the save slot for a ticket that will never be finished.
    /// Pending marks stay staged so a later save submits them again. The
    /// sidecar finishes every ticket inline; owners that submit the batch
    /// elsewhere need this when the request is cancelled.
    #[allow(dead_code)]
    pub fn abandon_save(&mut self, ticket: SaveTicket) -> Result<(), WorkspaceError> {
        if ticket.workspace_id != self.id {
            return Err(WorkspaceError::StaleSave);
        }
        self.save_in_flight = false;
        info!(records = ticket.records.len(), "attendance save abandoned");
        Ok(())
    }

    /// Submit everything pending as one batch and wait for the answer.
    pub fn save(&mut self, commands: &mut dyn CommandService) -> Result<SaveOutcome, WorkspaceError> {
        let Some(ticket) = self.begin_save()? else {
            return Ok(SaveOutcome::NothingToSave);
        };
        let result = commands.create_attendance_batch(ticket.records());
        self.finish_save(ticket, result).map(SaveOutcome::Saved)
    }

    /// Re-fetch committed records for this scope.
    pub fn refresh(&mut self, query: &dyn QueryService) -> Result<(), WorkspaceError> {
        let records = query
            .fetch_attendance(&self.scope)
            .map_err(WorkspaceError::Query)?;
        self.apply_committed(records);
        Ok(())
    }

    /// Replace the committed set with freshly fetched records.
    pub fn apply_committed(&mut self, records: Vec<AttendanceRecord>) {
        self.rebuild_committed(records);
        self.recompute();
    }

    fn rebuild_committed(&mut self, records: Vec<AttendanceRecord>) {
        self.committed.clear();
        for r in records {
            if !r.in_scope(&self.scope) {
                debug!(student_id = %r.student_id, "ignoring record outside session scope");
                continue;
            }
            self.committed.insert(r.student_id, r.status);
        }
        let committed = &self.committed;
        let before = self.pending.len();
        self.pending.retain(|id, _| !committed.contains_key(id));
        let dropped = before - self.pending.len();
        if dropped > 0 {
            warn!(dropped, "staged marks superseded by persisted attendance");
        }
    }

    fn recompute(&mut self) {
        let statuses = self
            .committed
            .values()
            .copied()
            .chain(self.pending.values().map(|p| p.status));
        self.stats = AttendanceStats::from_statuses(statuses);
        self.publish(WorkspaceEvent::Changed(self.stats));
    }

    fn publish(&mut self, event: WorkspaceEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
