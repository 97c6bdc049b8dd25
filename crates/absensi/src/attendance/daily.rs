//! "All subjects" daily view: one representative record per student.

use std::collections::BTreeMap;

use crate::model::AttendanceRecord;

/// Whether `candidate` should replace `current` as a student's daily record.
///
/// Sick or permission outranks present and is never replaced once chosen.
/// Between two present records the strictly later effective time wins.
fn outranks(candidate: &AttendanceRecord, current: &AttendanceRecord) -> bool {
    if current.status.is_manual() {
        return false;
    }
    if candidate.status.is_manual() {
        return true;
    }
    candidate.effective_time() > current.effective_time()
}

/// Reduce one day's records to a single record per student id.
///
/// Records are visited in the given order; ties keep the earlier record.
pub fn reduce_daily<I>(records: I) -> BTreeMap<String, AttendanceRecord>
where
    I: IntoIterator<Item = AttendanceRecord>,
{
    let mut by_student: BTreeMap<String, AttendanceRecord> = BTreeMap::new();

    for record in records {
        match by_student.get(&record.student_id) {
            Some(current) if !outranks(&record, current) => {}
            _ => {
                by_student.insert(record.student_id.clone(), record);
            }
        }
    }

    by_student
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, Timeliness};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn present(id: &str, student: &str, check_in: (u32, u32), check_out: Option<(u32, u32)>) -> AttendanceRecord {
        let at = |(h, m): (u32, u32)| Utc.with_ymd_and_hms(2024, 8, 1, h, m, 0).unwrap();
        AttendanceRecord {
            id: id.to_string(),
            student_id: student.to_string(),
            subject: format!("subject-{id}"),
            school_name: "SMA 1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            status: AttendanceStatus::Present,
            check_in: Some(at(check_in)),
            check_out: check_out.map(at),
            timeliness: Some(Timeliness::OnTime),
            semester: None,
        }
    }

    fn manual(id: &str, student: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            status,
            check_in: None,
            check_out: None,
            timeliness: None,
            ..present(id, student, (0, 0), None)
        }
    }

    #[test]
    fn test_single_record_per_student() {
        let reduced = reduce_daily(vec![
            present("a", "s1", (0, 30), None),
            present("b", "s2", (0, 40), None),
        ]);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn test_manual_outranks_present_in_either_order() {
        let reduced = reduce_daily(vec![
            present("a", "s1", (0, 30), Some((5, 0))),
            manual("b", "s1", AttendanceStatus::Sick),
        ]);
        assert_eq!(reduced["s1"].id, "b");

        let reduced = reduce_daily(vec![
            manual("b", "s1", AttendanceStatus::Permission),
            present("a", "s1", (0, 30), Some((5, 0))),
        ]);
        assert_eq!(reduced["s1"].id, "b");
    }

    #[test]
    fn test_first_manual_record_is_kept() {
        let reduced = reduce_daily(vec![
            manual("a", "s1", AttendanceStatus::Sick),
            manual("b", "s1", AttendanceStatus::Permission),
        ]);
        assert_eq!(reduced["s1"].id, "a");
    }

    #[test]
    fn test_latest_effective_time_wins_among_present() {
        // "a" checked out at 03:00; "b" only checked in at 02:00.
        let reduced = reduce_daily(vec![
            present("a", "s1", (0, 30), Some((3, 0))),
            present("b", "s1", (2, 0), None),
        ]);
        assert_eq!(reduced["s1"].id, "a");

        let reduced = reduce_daily(vec![
            present("a", "s1", (0, 30), None),
            present("b", "s1", (2, 0), None),
        ]);
        assert_eq!(reduced["s1"].id, "b");
    }

    #[test]
    fn test_tie_keeps_earlier_record() {
        let reduced = reduce_daily(vec![
            present("a", "s1", (1, 0), None),
            present("b", "s1", (1, 0), None),
        ]);
        assert_eq!(reduced["s1"].id, "a");
    }
}
