use crate::model::{
    AcademicYear, AttendanceRecord, AttendanceStatus, BatchOutcome, Course, Scope, Student,
    StudentFilter,
};
use crate::services::{CommandService, QueryService, ServiceError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

/// Attendance backend over the workspace database.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| conversion_err(idx, format!("bad date {raw:?}: {e}")))
}

fn get_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<AttendanceStatus> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_err(idx, e))
}

fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    // Rows migrated from before marked_at existed carry an empty string.
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        Err(e) => {
            warn!(marked_at = %raw, error = %e, "unreadable marking timestamp, using epoch");
            Ok(DateTime::default())
        }
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        student_id: row.get(0)?,
        course_id: row.get(1)?,
        academic_year_id: row.get(2)?,
        date: get_date(row, 3)?,
        status: get_status(row, 4)?,
        marked_by: row.get(5)?,
        marked_at: get_timestamp(row, 6)?,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        roll_number: row.get(2)?,
        course_id: row.get(3)?,
        year_of_study: row.get(4)?,
        academic_year_id: row.get(5)?,
    })
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> Result<bool, ServiceError> {
    Ok(conn
        .query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

fn insert_record(conn: &Connection, record: &AttendanceRecord) -> Result<(), ServiceError> {
    if !row_exists(conn, "SELECT 1 FROM students WHERE id = ?", &record.student_id)? {
        return Err(ServiceError::NotFound(format!(
            "student {}",
            record.student_id
        )));
    }
    if !row_exists(conn, "SELECT 1 FROM courses WHERE id = ?", &record.course_id)? {
        return Err(ServiceError::NotFound(format!("course {}", record.course_id)));
    }
    if !row_exists(
        conn,
        "SELECT 1 FROM academic_years WHERE id = ?",
        &record.academic_year_id,
    )? {
        return Err(ServiceError::NotFound(format!(
            "academic year {}",
            record.academic_year_id
        )));
    }
    conn.execute(
        "INSERT INTO attendance(student_id, course_id, academic_year_id, date, status, marked_by, marked_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &record.student_id,
            &record.course_id,
            &record.academic_year_id,
            record.date.to_string(),
            record.status.as_str(),
            &record.marked_by,
            record.marked_at.to_rfc3339(),
        ),
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            ServiceError::Conflict(format!(
                "attendance already recorded for student {} on {}",
                record.student_id, record.date
            ))
        } else {
            ServiceError::Storage(e)
        }
    })?;
    Ok(())
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn create_course(&self, code: &str, name: &str) -> Result<Course, ServiceError> {
        let course = Course {
            id: Uuid::new_v4().to_string(),
            code: code.trim().to_string(),
            name: name.trim().to_string(),
        };
        self.conn
            .execute(
                "INSERT INTO courses(id, code, name) VALUES(?, ?, ?)",
                (&course.id, &course.code, &course.name),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ServiceError::Conflict(format!("course code {} already exists", course.code))
                } else {
                    ServiceError::Storage(e)
                }
            })?;
        Ok(course)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, ServiceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name FROM courses ORDER BY code")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Course {
                    id: r.get(0)?,
                    code: r.get(1)?,
                    name: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create_academic_year(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<AcademicYear, ServiceError> {
        let year = AcademicYear {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            start_date,
            end_date,
        };
        self.conn
            .execute(
                "INSERT INTO academic_years(id, name, start_date, end_date) VALUES(?, ?, ?, ?)",
                (
                    &year.id,
                    &year.name,
                    year.start_date.to_string(),
                    year.end_date.to_string(),
                ),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ServiceError::Conflict(format!("academic year {} already exists", year.name))
                } else {
                    ServiceError::Storage(e)
                }
            })?;
        Ok(year)
    }

    pub fn list_academic_years(&self) -> Result<Vec<AcademicYear>, ServiceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, start_date, end_date FROM academic_years ORDER BY start_date DESC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(AcademicYear {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    start_date: get_date(r, 2)?,
                    end_date: get_date(r, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn course_exists(&self, course_id: &str) -> Result<bool, ServiceError> {
        row_exists(self.conn, "SELECT 1 FROM courses WHERE id = ?", course_id)
    }

    pub fn academic_year_exists(&self, academic_year_id: &str) -> Result<bool, ServiceError> {
        row_exists(
            self.conn,
            "SELECT 1 FROM academic_years WHERE id = ?",
            academic_year_id,
        )
    }

    pub fn create_student(
        &self,
        name: &str,
        roll_number: &str,
        course_id: &str,
        year_of_study: &str,
        academic_year_id: &str,
    ) -> Result<Student, ServiceError> {
        if !self.course_exists(course_id)? {
            return Err(ServiceError::NotFound(format!("course {course_id}")));
        }
        if !self.academic_year_exists(academic_year_id)? {
            return Err(ServiceError::NotFound(format!(
                "academic year {academic_year_id}"
            )));
        }
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            roll_number: roll_number.trim().to_string(),
            course_id: course_id.to_string(),
            year_of_study: year_of_study.trim().to_string(),
            academic_year_id: academic_year_id.to_string(),
        };
        self.conn
            .execute(
                "INSERT INTO students(id, name, roll_number, course_id, year_of_study, academic_year_id)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    &student.id,
                    &student.name,
                    &student.roll_number,
                    &student.course_id,
                    &student.year_of_study,
                    &student.academic_year_id,
                ),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ServiceError::Conflict(format!(
                        "roll number {} already used in this course and year",
                        student.roll_number
                    ))
                } else {
                    ServiceError::Storage(e)
                }
            })?;
        Ok(student)
    }

    /// All records for one course and academic year between `from` and `to`, inclusive.
    pub fn fetch_attendance_range(
        &self,
        course_id: &str,
        academic_year_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, course_id, academic_year_id, date, status, marked_by, marked_at
             FROM attendance
             WHERE course_id = ? AND academic_year_id = ? AND date >= ? AND date <= ?
             ORDER BY date, student_id",
        )?;
        let rows = stmt
            .query_map(
                (course_id, academic_year_id, from.to_string(), to.to_string()),
                record_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl QueryService for SqliteStore<'_> {
    fn fetch_attendance(&self, scope: &Scope) -> Result<Vec<AttendanceRecord>, ServiceError> {
        self.fetch_attendance_range(
            &scope.course_id,
            &scope.academic_year_id,
            scope.date,
            scope.date,
        )
    }

    fn fetch_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, ServiceError> {
        let mut sql = String::from(
            "SELECT id, name, roll_number, course_id, year_of_study, academic_year_id
             FROM students
             WHERE 1 = 1",
        );
        let mut bind: Vec<Value> = Vec::new();
        if let Some(c) = &filter.course_id {
            sql.push_str(" AND course_id = ?");
            bind.push(Value::Text(c.clone()));
        }
        if let Some(y) = &filter.academic_year_id {
            sql.push_str(" AND academic_year_id = ?");
            bind.push(Value::Text(y.clone()));
        }
        if let Some(y) = &filter.year_of_study {
            sql.push_str(" AND year_of_study = ?");
            bind.push(Value::Text(y.clone()));
        }
        sql.push_str(" ORDER BY roll_number, name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind), student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl CommandService for SqliteStore<'_> {
    fn create_attendance(&mut self, record: &AttendanceRecord) -> Result<(), ServiceError> {
        insert_record(self.conn, record)
    }

    fn create_attendance_batch(
        &mut self,
        records: &[AttendanceRecord],
    ) -> Result<BatchOutcome, ServiceError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = BatchOutcome::default();
        for record in records {
            match insert_record(&tx, record) {
                Ok(()) => outcome.success_count += 1,
                Err(ServiceError::Conflict(msg)) | Err(ServiceError::NotFound(msg)) => {
                    debug!(student_id = %record.student_id, reason = %msg, "attendance record rejected");
                    outcome.error_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tx.commit()?;
        Ok(outcome)
    }
}
