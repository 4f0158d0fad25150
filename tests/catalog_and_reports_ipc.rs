mod common;

use common::{seed, temp_dir, Sidecar};
use serde_json::json;

#[test]
fn academic_year_naming_and_date_order_are_enforced() {
    let workspace = temp_dir("rollbook-catalog-years");
    let mut sidecar = Sidecar::spawn();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let error = sidecar.request_err(
        "academicYears.create",
        json!({ "name": "2024-2026", "startDate": "2025-07-01", "endDate": "2025-06-30" }),
        "validation_failed",
    );
    let fields: Vec<&str> = error["details"]["fields"]
        .as_array()
        .expect("fields")
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["name", "endDate"]);

    sidecar.request_err(
        "academicYears.create",
        json!({ "name": "2024-2025", "startDate": "2024-13-01", "endDate": "2025-06-30" }),
        "bad_params",
    );

    sidecar.request_ok(
        "academicYears.create",
        json!({ "name": "2024-2025", "startDate": "2024-07-01", "endDate": "2025-06-30" }),
    );
    sidecar.request_ok(
        "academicYears.create",
        json!({ "name": "2025-2026", "startDate": "2025-07-01", "endDate": "2026-06-30" }),
    );
    sidecar.request_err(
        "academicYears.create",
        json!({ "name": "2024-2025", "startDate": "2024-08-01", "endDate": "2025-05-30" }),
        "conflict",
    );

    let listed = sidecar.request_ok("academicYears.list", json!({}));
    let names: Vec<&str> = listed["academicYears"]
        .as_array()
        .expect("years")
        .iter()
        .filter_map(|y| y["name"].as_str())
        .collect();
    assert_eq!(names, vec!["2025-2026", "2024-2025"]);

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn courses_and_students_require_valid_references() {
    let workspace = temp_dir("rollbook-catalog-courses");
    let mut sidecar = Sidecar::spawn();
    sidecar.request_err("courses.list", json!({}), "no_workspace");
    let fx = seed(&mut sidecar, &workspace, 2);

    sidecar.request_err(
        "courses.create",
        json!({ "code": "CS-101", "name": "Duplicate" }),
        "conflict",
    );
    sidecar.request_err(
        "courses.create",
        json!({ "code": "CS 102", "name": "Spaces" }),
        "validation_failed",
    );
    sidecar.request_err(
        "students.create",
        json!({
            "name": "Nobody",
            "rollNumber": "99",
            "courseId": "missing",
            "yearOfStudy": "1",
            "academicYearId": fx.academic_year_id,
        }),
        "not_found",
    );
    sidecar.request_err(
        "students.create",
        json!({
            "name": "Again",
            "rollNumber": "01",
            "courseId": fx.course_id,
            "yearOfStudy": "1",
            "academicYearId": fx.academic_year_id,
        }),
        "conflict",
    );

    let students = sidecar.request_ok(
        "students.list",
        json!({ "courseId": fx.course_id, "academicYearId": fx.academic_year_id }),
    );
    assert_eq!(students["students"].as_array().map(|a| a.len()), Some(2));

    let courses = sidecar.request_ok("courses.list", json!({}));
    assert_eq!(courses["courses"][0]["code"], json!("CS-101"));

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn attendance_summary_covers_saved_sessions_in_range() {
    let workspace = temp_dir("rollbook-reports-summary");
    let mut sidecar = Sidecar::spawn();
    let fx = seed(&mut sidecar, &workspace, 3);

    let days = ["2024-09-02", "2024-09-03", "2024-09-04"];
    for day in days {
        sidecar.request_ok(
            "session.open",
            json!({
                "courseId": fx.course_id,
                "academicYearId": fx.academic_year_id,
                "date": day,
                "markedBy": "faculty-1",
            }),
        );
        if day == "2024-09-03" {
            sidecar.request_ok(
                "attendance.mark",
                json!({ "studentId": fx.student_ids[0], "status": "absent" }),
            );
        }
        sidecar.request_ok("attendance.markAllPresent", json!({}));
        sidecar.request_ok("attendance.save", json!({}));
    }

    let summary = sidecar.request_ok(
        "reports.attendanceSummary",
        json!({
            "courseId": fx.course_id,
            "academicYearId": fx.academic_year_id,
            "from": "2024-09-02",
            "to": "2024-09-03",
        }),
    );
    let report = &summary["report"];
    assert_eq!(report["sessionDates"], json!(["2024-09-02", "2024-09-03"]));
    assert_eq!(report["rows"][0]["studentId"], json!(fx.student_ids[0]));
    assert_eq!(report["rows"][0]["present"], json!(1));
    assert_eq!(report["rows"][0]["absent"], json!(1));
    assert_eq!(report["rows"][0]["percentage"], json!(50));
    assert_eq!(report["rows"][1]["percentage"], json!(100));
    assert_eq!(
        report["totals"],
        json!({ "present": 5, "absent": 1, "late": 0, "percentage": 83 })
    );

    sidecar.request_err(
        "reports.attendanceSummary",
        json!({
            "courseId": fx.course_id,
            "academicYearId": fx.academic_year_id,
            "from": "2024-09-04",
            "to": "2024-09-02",
        }),
        "validation_failed",
    );

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn year_of_study_filter_narrows_rows_and_totals_together() {
    let workspace = temp_dir("rollbook-reports-year-filter");
    let mut sidecar = Sidecar::spawn();
    let fx = seed(&mut sidecar, &workspace, 2);
    let senior = sidecar.request_ok(
        "students.create",
        json!({
            "name": "Senior",
            "rollNumber": "03",
            "courseId": fx.course_id,
            "yearOfStudy": "2",
            "academicYearId": fx.academic_year_id,
        }),
    );
    let senior_id = senior["student"]["id"].as_str().expect("id").to_string();

    sidecar.request_ok(
        "session.open",
        json!({
            "courseId": fx.course_id,
            "academicYearId": fx.academic_year_id,
            "date": "2024-09-02",
            "markedBy": "faculty-1",
        }),
    );
    sidecar.request_ok(
        "attendance.mark",
        json!({ "studentId": fx.student_ids[0], "status": "present" }),
    );
    sidecar.request_ok(
        "attendance.mark",
        json!({ "studentId": senior_id, "status": "absent" }),
    );
    sidecar.request_ok("attendance.save", json!({}));

    let summary = sidecar.request_ok(
        "reports.attendanceSummary",
        json!({
            "courseId": fx.course_id,
            "academicYearId": fx.academic_year_id,
            "yearOfStudy": "1",
            "from": "2024-09-01",
            "to": "2024-09-30",
        }),
    );
    let report = &summary["report"];
    assert_eq!(report["rows"].as_array().map(|r| r.len()), Some(2));
    assert_eq!(
        report["totals"],
        json!({ "present": 1, "absent": 0, "late": 0, "percentage": 100 })
    );

    sidecar.close();
    let _ = std::fs::remove_dir_all(workspace);
}
