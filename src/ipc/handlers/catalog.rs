use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    check_form, get_optional_str, get_required_date, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentFilter;
use crate::services::QueryService;
use crate::store::SqliteStore;
use crate::validation::{AcademicYearForm, CourseForm, StudentForm};
use rusqlite::Connection;
use serde_json::json;

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let form = CourseForm {
        code: get_required_str(params, "code")?,
        name: get_required_str(params, "name")?,
    };
    check_form(form.validate())?;
    let course = SqliteStore::new(conn).create_course(&form.code, &form.name)?;
    Ok(json!({ "course": course }))
}

fn courses_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let courses = SqliteStore::new(conn).list_courses()?;
    Ok(json!({ "courses": courses }))
}

fn academic_years_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let form = AcademicYearForm {
        name: get_required_str(params, "name")?,
        start_date: get_required_date(params, "startDate")?,
        end_date: get_required_date(params, "endDate")?,
    };
    check_form(form.validate())?;
    let year = SqliteStore::new(conn).create_academic_year(
        &form.name,
        form.start_date,
        form.end_date,
    )?;
    Ok(json!({ "academicYear": year }))
}

fn academic_years_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let years = SqliteStore::new(conn).list_academic_years()?;
    Ok(json!({ "academicYears": years }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let form = StudentForm {
        name: get_required_str(params, "name")?,
        roll_number: get_required_str(params, "rollNumber")?,
        course_id: get_required_str(params, "courseId")?,
        year_of_study: get_required_str(params, "yearOfStudy")?,
        academic_year_id: get_required_str(params, "academicYearId")?,
    };
    check_form(form.validate())?;
    let student = SqliteStore::new(conn).create_student(
        &form.name,
        &form.roll_number,
        &form.course_id,
        &form.year_of_study,
        &form.academic_year_id,
    )?;
    Ok(json!({ "student": student }))
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = StudentFilter {
        course_id: get_optional_str(params, "courseId"),
        academic_year_id: get_optional_str(params, "academicYearId"),
        year_of_study: get_optional_str(params, "yearOfStudy"),
    };
    let students = SqliteStore::new(conn).fetch_students(&filter)?;
    Ok(json!({ "students": students }))
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = match req.method.as_str() {
        "courses.create" => courses_create(conn, &req.params),
        "courses.list" => courses_list(conn),
        "academicYears.create" => academic_years_create(conn, &req.params),
        "academicYears.list" => academic_years_list(conn),
        "students.create" => students_create(conn, &req.params),
        "students.list" => students_list(conn, &req.params),
        other => Err(HandlerErr::new(
            "not_implemented",
            format!("unknown method: {}", other),
        )),
    };
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create"
        | "courses.list"
        | "academicYears.create"
        | "academicYears.list"
        | "students.create"
        | "students.list" => Some(dispatch(state, req)),
        _ => None,
    }
}
