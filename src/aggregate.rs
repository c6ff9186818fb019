//! Turns a list of task records into per-day completion counters.

use crate::model::{DateKey, Metric, SummaryTable, TaskRecord, IN_BETA_STATUS, TAKEOVER_LABEL};
use tracing::{debug, warn};

/// Classifies each record and counts it into the bucket of its grouping date. Never fails: a
/// record with a missing grouping date lands in the `Invalid Date` bucket, and a record with a
/// missing comparison due date is simply never counted as done.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a TaskRecord>) -> SummaryTable {
    let mut table = SummaryTable::new();
    let mut count = 0usize;
    for record in records {
        count_record(&mut table, record);
        count += 1;
    }
    debug!("Aggregated {count} records into {} days", table.len());
    table
}

fn count_record(table: &mut SummaryTable, record: &TaskRecord) {
    let key = DateKey::from(record.grouping_date());
    if key == DateKey::Invalid {
        warn!(
            "Malformed record {}: no usable {} due date",
            record.key().unwrap_or("<no key>"),
            if record.issue_type().is_story() {
                "story"
            } else {
                "generic"
            }
        );
    }

    let bucket = table.bucket(key);

    if record.issue_type().is_story() {
        bucket.increment(Metric::TotalUs);
    } else {
        bucket.increment(Metric::TotalTasks);
    }

    // Bugs are also counted in total_tasks above.
    if record.issue_type().is_bug() && !record.has_label(TAKEOVER_LABEL) {
        bucket.increment(Metric::TotalBugs);
    }

    if let Some(resolved) = record.resolution_date() {
        let on_time = record
            .comparison_due_date()
            .is_some_and(|due| resolved <= due);
        if on_time && record.issue_type().is_story() && record.status() == Some(IN_BETA_STATUS) {
            bucket.increment(Metric::DoneUs);
        } else if on_time {
            bucket.increment(Metric::DoneTasks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DailySummary, BUG, STORY};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn key(s: &str) -> DateKey {
        DateKey::from(date(s))
    }

    #[test]
    fn test_story_and_bug_on_same_day() {
        let records = vec![
            TaskRecord::new(STORY)
                .with_story_due_date(date("2024-06-05"))
                .with_status(IN_BETA_STATUS)
                .with_resolution_date(date("2024-06-04")),
            TaskRecord::new(BUG).with_due_date(date("2024-06-05")),
        ];
        let table = aggregate(&records);
        assert_eq!(table.len(), 1);
        let (k, summary) = table.iter().next().unwrap();
        assert_eq!(k.to_string(), "Jun 5, 2024");
        assert_eq!(
            *summary,
            DailySummary {
                total_tasks: 1,
                done_tasks: 0,
                total_bugs: 1,
                total_us: 1,
                done_us: 1,
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<TaskRecord> = Vec::new();
        assert!(aggregate(&records).is_empty());
    }

    #[test]
    fn test_story_groups_by_story_due_date_only() {
        let records = vec![TaskRecord::new(STORY)
            .with_due_date(date("2024-06-03"))
            .with_story_due_date(date("2024-06-07"))];
        let table = aggregate(&records);
        assert!(table.get(&key("2024-06-03")).is_none());
        assert_eq!(table.get(&key("2024-06-07")).unwrap().total_us, 1);
    }

    #[test]
    fn test_non_story_groups_by_due_date_only() {
        let records = vec![TaskRecord::new("Task")
            .with_due_date(date("2024-06-03"))
            .with_story_due_date(date("2024-06-07"))];
        let table = aggregate(&records);
        assert!(table.get(&key("2024-06-07")).is_none());
        assert_eq!(table.get(&key("2024-06-03")).unwrap().total_tasks, 1);
    }

    #[test]
    fn test_totals_equal_record_count_per_day() {
        let records = vec![
            TaskRecord::new(STORY).with_story_due_date(date("2024-06-05")),
            TaskRecord::new(BUG).with_due_date(date("2024-06-05")),
            TaskRecord::new("Task").with_due_date(date("2024-06-05")),
            TaskRecord::new("Sub-task").with_due_date(date("2024-06-06")),
            TaskRecord::new(STORY).with_story_due_date(date("2024-06-06")),
            TaskRecord::new(STORY).with_story_due_date(date("2024-06-06")),
        ];
        let table = aggregate(&records);
        let day5 = table.get(&key("2024-06-05")).unwrap();
        let day6 = table.get(&key("2024-06-06")).unwrap();
        assert_eq!(day5.total_tasks + day5.total_us, 3);
        assert_eq!(day6.total_tasks + day6.total_us, 3);
        assert_eq!(day6.total_us, 2);
    }

    #[test]
    fn test_takeover_bug_not_counted_as_bug() {
        let records = vec![
            TaskRecord::new(BUG)
                .with_due_date(date("2024-06-05"))
                .with_label("Backend")
                .with_label(TAKEOVER_LABEL)
                .with_story_due_date(date("2024-06-05"))
                .with_resolution_date(date("2024-06-01")),
            TaskRecord::new(BUG)
                .with_due_date(date("2024-06-05"))
                .with_label("Backend"),
        ];
        let summary = *aggregate(&records).get(&key("2024-06-05")).unwrap();
        assert_eq!(summary.total_tasks, 2);
        assert_eq!(summary.total_bugs, 1);
        assert_eq!(summary.done_tasks, 1);
    }

    #[test]
    fn test_done_us_requires_story_status_and_on_time() {
        let due = date("2024-06-05");
        let records = vec![
            // Counts as done_us.
            TaskRecord::new(STORY)
                .with_story_due_date(due)
                .with_status(IN_BETA_STATUS)
                .with_resolution_date(due),
            // Wrong status: falls through to done_tasks.
            TaskRecord::new(STORY)
                .with_story_due_date(due)
                .with_status("Done")
                .with_resolution_date(date("2024-06-01")),
            // Late: nothing.
            TaskRecord::new(STORY)
                .with_story_due_date(due)
                .with_status(IN_BETA_STATUS)
                .with_resolution_date(date("2024-06-06")),
            // Unresolved: nothing.
            TaskRecord::new(STORY)
                .with_story_due_date(due)
                .with_status(IN_BETA_STATUS),
        ];
        let summary = *aggregate(&records).get(&key("2024-06-05")).unwrap();
        assert_eq!(summary.total_us, 4);
        assert_eq!(summary.done_us, 1);
        assert_eq!(summary.done_tasks, 1);
    }

    #[test]
    fn test_non_story_completion_compares_story_due_date() {
        let records = vec![
            // Resolved after the generic due date but before the story due date: done.
            TaskRecord::new("Task")
                .with_due_date(date("2024-06-05"))
                .with_story_due_date(date("2024-06-10"))
                .with_resolution_date(date("2024-06-08")),
            // Resolved before the generic due date but no story due date: not done.
            TaskRecord::new("Task")
                .with_due_date(date("2024-06-05"))
                .with_resolution_date(date("2024-06-01")),
            // In Beta status does not matter for non-stories.
            TaskRecord::new(BUG)
                .with_due_date(date("2024-06-05"))
                .with_story_due_date(date("2024-06-05"))
                .with_status(IN_BETA_STATUS)
                .with_resolution_date(date("2024-06-05")),
        ];
        let summary = *aggregate(&records).get(&key("2024-06-05")).unwrap();
        assert_eq!(summary.total_tasks, 3);
        assert_eq!(summary.done_tasks, 2);
        assert_eq!(summary.done_us, 0);
    }

    #[test]
    fn test_missing_grouping_date_goes_to_invalid_bucket() {
        let records = vec![
            TaskRecord::new(STORY).with_due_date(date("2024-06-05")),
            TaskRecord::default(),
        ];
        let table = aggregate(&records);
        assert_eq!(table.len(), 1);
        let summary = table.get(&DateKey::Invalid).unwrap();
        assert_eq!(summary.total_us, 1);
        assert_eq!(summary.total_tasks, 1);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let records = vec![
            TaskRecord::new(STORY)
                .with_story_due_date(date("2024-06-05"))
                .with_status(IN_BETA_STATUS)
                .with_resolution_date(date("2024-06-04")),
            TaskRecord::new(BUG).with_due_date(date("2024-06-07")),
            TaskRecord::new("Task").with_due_date(date("2024-06-05")),
        ];
        assert_eq!(aggregate(&records), aggregate(&records));
    }
}
