#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_rollbookd");
        let mut child = Command::new(exe)
            .env_remove("ROLLBOOKD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn rollbookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Asserts the call failed and returns the error object.
    pub fn request_err(
        &mut self,
        method: &str,
        params: serde_json::Value,
        code: &str,
    ) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().expect("error object");
        assert_eq!(
            error.get("code").and_then(|v| v.as_str()),
            Some(code),
            "{} error: {}",
            method,
            error
        );
        error
    }

    pub fn close(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

pub fn str_at<'a>(v: &'a serde_json::Value, path: &[&str]) -> &'a str {
    let mut cur = v;
    for key in path {
        cur = cur.get(*key).unwrap_or_else(|| panic!("missing {} in {}", key, v));
    }
    cur.as_str().unwrap_or_else(|| panic!("{:?} is not a string", path))
}

/// Course, academic year 2024-2025 and students with roll numbers 01..=count.
pub struct Fixture {
    pub course_id: String,
    pub academic_year_id: String,
    pub student_ids: Vec<String>,
}

pub fn seed(sidecar: &mut Sidecar, workspace: &PathBuf, count: usize) -> Fixture {
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = sidecar.request_ok(
        "courses.create",
        json!({ "code": "CS-101", "name": "Intro to Computing" }),
    );
    let course_id = str_at(&course, &["course", "id"]).to_string();
    let year = sidecar.request_ok(
        "academicYears.create",
        json!({ "name": "2024-2025", "startDate": "2024-07-01", "endDate": "2025-06-30" }),
    );
    let academic_year_id = str_at(&year, &["academicYear", "id"]).to_string();

    let mut student_ids = Vec::new();
    for i in 1..=count {
        let created = sidecar.request_ok(
            "students.create",
            json!({
                "name": format!("Student {}", i),
                "rollNumber": format!("{:02}", i),
                "courseId": course_id,
                "yearOfStudy": "1",
                "academicYearId": academic_year_id,
            }),
        );
        student_ids.push(str_at(&created, &["student", "id"]).to_string());
    }
    Fixture {
        course_id,
        academic_year_id,
        student_ids,
    }
}

pub fn status_of(session_view: &serde_json::Value, student_id: &str) -> String {
    session_view
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array")
        .iter()
        .find(|s| s.get("id").and_then(|v| v.as_str()) == Some(student_id))
        .and_then(|s| s.get("status"))
        .and_then(|v| v.as_str())
        .expect("student status")
        .to_string()
}
