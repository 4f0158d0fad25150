use crate::model::{percentage, AttendanceRecord, AttendanceStats, AttendanceStatus, Student};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceRow {
    pub student_id: String,
    pub name: String,
    pub roll_number: String,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub total: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub rows: Vec<StudentAttendanceRow>,
    pub totals: AttendanceStats,
    pub session_dates: Vec<NaiveDate>,
}

/// Per-student counts over already-fetched records. Only students in `students`
/// are counted, so the totals always equal the sum of the rows.
pub fn attendance_summary(students: &[Student], records: &[AttendanceRecord]) -> AttendanceReport {
    let roster: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let counted: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| roster.contains(r.student_id.as_str()))
        .collect();

    let mut by_student: HashMap<&str, [usize; 3]> = HashMap::new();
    let mut dates = BTreeSet::new();
    for r in counted.iter().copied() {
        let counts = by_student.entry(r.student_id.as_str()).or_default();
        match r.status {
            AttendanceStatus::Present => counts[0] += 1,
            AttendanceStatus::Absent => counts[1] += 1,
            AttendanceStatus::Late => counts[2] += 1,
        }
        dates.insert(r.date);
    }

    let mut rows: Vec<StudentAttendanceRow> = students
        .iter()
        .map(|s| {
            let [present, absent, late] = by_student.get(s.id.as_str()).copied().unwrap_or_default();
            let total = present + absent + late;
            StudentAttendanceRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                roll_number: s.roll_number.clone(),
                present,
                absent,
                late,
                total,
                percentage: percentage(present, total),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.roll_number
            .cmp(&b.roll_number)
            .then_with(|| a.name.cmp(&b.name))
    });

    AttendanceReport {
        rows,
        totals: AttendanceStats::from_statuses(counted.iter().map(|r| r.status)),
        session_dates: dates.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(id: &str, roll: &str) -> Student {
        Student {
            id: id.into(),
            name: id.to_uppercase(),
            roll_number: roll.into(),
            course_id: "c".into(),
            year_of_study: "1".into(),
            academic_year_id: "y".into(),
        }
    }

    fn rec(student_id: &str, day: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: student_id.into(),
            course_id: "c".into(),
            academic_year_id: "y".into(),
            date: NaiveDate::from_ymd_opt(2024, 9, day).expect("date"),
            status,
            marked_by: "f".into(),
            marked_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_per_student_and_overall() {
        use AttendanceStatus::*;
        let students = vec![student("b", "02"), student("a", "01"), student("c", "03")];
        let records = vec![
            rec("a", 2, Present),
            rec("a", 3, Late),
            rec("a", 4, Present),
            rec("b", 2, Absent),
            rec("b", 3, Present),
        ];
        let report = attendance_summary(&students, &records);

        let ids: Vec<&str> = report.rows.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!((report.rows[0].present, report.rows[0].late), (2, 1));
        assert_eq!(report.rows[0].percentage, 67);
        assert_eq!(report.rows[1].percentage, 50);
        assert_eq!(report.rows[2].total, 0);
        assert_eq!(report.rows[2].percentage, 0);

        assert_eq!(report.totals.present, 3);
        assert_eq!(report.totals.percentage, 60);
        assert_eq!(report.session_dates.len(), 3);
    }

    #[test]
    fn totals_cover_only_the_filtered_roster() {
        use AttendanceStatus::*;
        let mut second_year = student("b", "02");
        second_year.year_of_study = "2".into();
        let roster: Vec<Student> = [student("a", "01"), second_year]
            .into_iter()
            .filter(|s| s.year_of_study == "1")
            .collect();
        let records = vec![rec("a", 2, Present), rec("b", 2, Absent), rec("b", 5, Late)];

        let report = attendance_summary(&roster, &records);
        assert_eq!(report.rows.len(), 1);
        let row_total: usize = report.rows.iter().map(|r| r.total).sum();
        assert_eq!(report.totals.total(), row_total);
        assert_eq!(
            report.totals,
            AttendanceStats {
                present: 1,
                absent: 0,
                late: 0,
                percentage: 100
            }
        );
        assert_eq!(
            report.session_dates,
            vec![NaiveDate::from_ymd_opt(2024, 9, 2).expect("date")]
        );
    }
}
