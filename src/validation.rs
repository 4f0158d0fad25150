//! Typed form checks. Each `validate` returns every failing field at once so a
//! form can highlight them together; an empty list means the form is valid.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn require(errors: &mut Vec<FieldError>, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
        return false;
    }
    true
}

/// Parses `YYYY-YYYY` where the second year follows the first.
pub fn parse_academic_year_name(name: &str) -> Option<(i32, i32)> {
    let (a, b) = name.trim().split_once('-')?;
    if a.len() != 4 || b.len() != 4 {
        return None;
    }
    if !a.chars().all(|c| c.is_ascii_digit()) || !b.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let start: i32 = a.parse().ok()?;
    let end: i32 = b.parse().ok()?;
    (end == start + 1).then_some((start, end))
}

#[derive(Debug, Clone)]
pub struct AcademicYearForm {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl AcademicYearForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if require(&mut errors, "name", &self.name) {
            match parse_academic_year_name(&self.name) {
                None => errors.push(FieldError::new(
                    "name",
                    "academic year must look like 2024-2025 with consecutive years",
                )),
                Some((first, _)) if self.start_date.year() != first => {
                    errors.push(FieldError::new(
                        "startDate",
                        format!("start date must fall in {first}"),
                    ));
                }
                Some(_) => {}
            }
        }
        if self.start_date >= self.end_date {
            errors.push(FieldError::new(
                "endDate",
                "end date must be after start date",
            ));
        }
        errors
    }
}

#[derive(Debug, Clone)]
pub struct CourseForm {
    pub code: String,
    pub name: String,
}

impl CourseForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if require(&mut errors, "code", &self.code)
            && !self
                .code
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            errors.push(FieldError::new(
                "code",
                "code may contain only letters, digits and '-'",
            ));
        }
        require(&mut errors, "name", &self.name);
        errors
    }
}

#[derive(Debug, Clone)]
pub struct StudentForm {
    pub name: String,
    pub roll_number: String,
    pub course_id: String,
    pub year_of_study: String,
    pub academic_year_id: String,
}

impl StudentForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "rollNumber", &self.roll_number);
        require(&mut errors, "courseId", &self.course_id);
        require(&mut errors, "yearOfStudy", &self.year_of_study);
        require(&mut errors, "academicYearId", &self.academic_year_id);
        errors
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DateRangeForm {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRangeForm {
    pub fn validate(&self) -> Vec<FieldError> {
        if self.from > self.to {
            return vec![FieldError::new("to", "end date must not be before start date")];
        }
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceForm {
    pub student_id: String,
    pub course_id: String,
    pub academic_year_id: String,
    pub date: NaiveDate,
    pub status: String,
}

impl AttendanceForm {
    /// `today` is the caller's local date; marks for future days are refused.
    pub fn validate(&self, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require(&mut errors, "studentId", &self.student_id);
        require(&mut errors, "courseId", &self.course_id);
        require(&mut errors, "academicYearId", &self.academic_year_id);
        if self.date > today {
            errors.push(FieldError::new("date", "attendance cannot be marked for a future date"));
        }
        if require(&mut errors, "status", &self.status)
            && self
                .status
                .parse::<crate::model::AttendanceStatus>()
                .is_err()
        {
            errors.push(FieldError::new(
                "status",
                "status must be present, absent or late",
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn academic_year_name_requires_consecutive_years() {
        assert_eq!(parse_academic_year_name("2024-2025"), Some((2024, 2025)));
        assert_eq!(parse_academic_year_name(" 2024-2025 "), Some((2024, 2025)));
        assert_eq!(parse_academic_year_name("2024-2026"), None);
        assert_eq!(parse_academic_year_name("2024-25"), None);
        assert_eq!(parse_academic_year_name("24-2025"), None);
        assert_eq!(parse_academic_year_name("2024/2025"), None);
        assert_eq!(parse_academic_year_name("+024-2025"), None);
    }

    #[test]
    fn academic_year_form_reports_every_problem() {
        let ok = AcademicYearForm {
            name: "2024-2025".into(),
            start_date: date(2024, 7, 1),
            end_date: date(2025, 6, 30),
        };
        assert!(ok.validate().is_empty());

        let bad = AcademicYearForm {
            name: "2024-2026".into(),
            start_date: date(2025, 7, 1),
            end_date: date(2025, 6, 30),
        };
        assert_eq!(fields(&bad.validate()), vec!["name", "endDate"]);

        let wrong_start = AcademicYearForm {
            name: "2024-2025".into(),
            start_date: date(2023, 7, 1),
            end_date: date(2025, 6, 30),
        };
        assert_eq!(fields(&wrong_start.validate()), vec!["startDate"]);
    }

    #[test]
    fn date_range_allows_single_day() {
        let day = date(2024, 9, 2);
        assert!(DateRangeForm { from: day, to: day }.validate().is_empty());
        let reversed = DateRangeForm {
            from: date(2024, 9, 3),
            to: day,
        };
        assert_eq!(fields(&reversed.validate()), vec!["to"]);
    }

    #[test]
    fn course_code_charset() {
        let ok = CourseForm {
            code: "CS-101".into(),
            name: "Intro".into(),
        };
        assert!(ok.validate().is_empty());
        let bad = CourseForm {
            code: "CS 101".into(),
            name: " ".into(),
        };
        assert_eq!(fields(&bad.validate()), vec!["code", "name"]);
    }

    #[test]
    fn attendance_form_rejects_future_and_unknown_status() {
        let today = date(2024, 9, 2);
        let form = AttendanceForm {
            student_id: "s1".into(),
            course_id: "c1".into(),
            academic_year_id: "".into(),
            date: date(2024, 9, 3),
            status: "excused".into(),
        };
        assert_eq!(
            fields(&form.validate(today)),
            vec!["academicYearId", "date", "status"]
        );
    }

    #[test]
    fn student_form_lists_missing_fields() {
        let form = StudentForm {
            name: "Asha".into(),
            roll_number: "".into(),
            course_id: "c1".into(),
            year_of_study: "".into(),
            academic_year_id: "ay1".into(),
        };
        assert_eq!(fields(&form.validate()), vec!["rollNumber", "yearOfStudy"]);
    }
}
