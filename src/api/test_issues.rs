//! Implements the `IssueSource` trait using seeded Jira search results, so the whole app can run
//! without a Jira instance.

use crate::api::IssueSource;
use crate::error::Res;
use crate::model::{parse_date, DateRange, JiraIssue, TaskRecord};
use anyhow::Context;
use serde_json::Value;
use tracing::trace;

/// Serves the seeded issues whose story due date or generic due date falls in the requested
/// range, the same selection the Jira JQL makes.
pub(crate) struct TestIssues {
    story_due_date_field: String,
}

impl TestIssues {
    pub(crate) fn new(story_due_date_field: impl Into<String>) -> Self {
        Self {
            story_due_date_field: story_due_date_field.into(),
        }
    }

    fn in_range(&self, issue: &JiraIssue, range: DateRange) -> bool {
        let story_due = issue
            .fields
            .other
            .get(&self.story_due_date_field)
            .and_then(Value::as_str);
        [issue.fields.duedate.as_deref(), story_due]
            .into_iter()
            .flatten()
            .filter_map(parse_date)
            .any(|date| range.contains(date))
    }
}

#[async_trait::async_trait]
impl IssueSource for TestIssues {
    async fn fetch(&mut self, range: DateRange) -> Res<Vec<TaskRecord>> {
        let issues: Vec<JiraIssue> =
            serde_json::from_str(SEED_ISSUES).context("Invalid seed issues")?;
        let records: Vec<TaskRecord> = issues
            .iter()
            .filter(|issue| self.in_range(issue, range))
            .map(|issue| TaskRecord::from_issue(issue, &self.story_due_date_field))
            .collect();
        trace!("Serving {} seeded issues", records.len());
        Ok(records)
    }
}

/// Seed issues in the shape of the Jira search response `issues` array.
const SEED_ISSUES: &str = r##"[
  {
    "key": "PROJ-101",
    "fields": {
      "issuetype": { "name": "Story" },
      "customfield_10033": "2024-06-05",
      "duedate": null,
      "resolutiondate": "2024-06-04T10:15:30.000+0000",
      "status": { "name": "User Stories (In Beta)" },
      "labels": []
    }
  },
  {
    "key": "PROJ-102",
    "fields": {
      "issuetype": { "name": "Bug" },
      "customfield_10033": null,
      "duedate": "2024-06-05",
      "resolutiondate": null,
      "status": { "name": "To Do" },
      "labels": []
    }
  },
  {
    "key": "PROJ-103",
    "fields": {
      "issuetype": { "name": "Task" },
      "customfield_10033": "2024-06-03",
      "duedate": "2024-06-03",
      "resolutiondate": "2024-06-02T16:40:00.000+0000",
      "status": { "name": "Done" },
      "labels": []
    }
  },
  {
    "key": "PROJ-104",
    "fields": {
      "issuetype": { "name": "Bug" },
      "customfield_10033": "2024-06-04",
      "duedate": "2024-06-04",
      "resolutiondate": "2024-06-04T17:00:00.000+0000",
      "status": { "name": "Done" },
      "labels": ["Takeover"]
    }
  },
  {
    "key": "PROJ-105",
    "fields": {
      "issuetype": { "name": "Story" },
      "customfield_10033": "2024-06-06",
      "duedate": null,
      "resolutiondate": "2024-06-05T09:00:00.000+0000",
      "status": { "name": "Done" },
      "labels": []
    }
  },
  {
    "key": "PROJ-106",
    "fields": {
      "issuetype": { "name": "Task" },
      "duedate": "2024-06-04",
      "resolutiondate": "2024-06-03T12:00:00.000+0000",
      "status": { "name": "Done" }
    }
  },
  {
    "key": "PROJ-200",
    "fields": {
      "issuetype": { "name": "Task" },
      "duedate": "2024-07-10",
      "resolutiondate": null,
      "status": { "name": "To Do" },
      "labels": []
    }
  }
]"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_STORY_DUE_DATE_FIELD;
    use chrono::NaiveDate;

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    fn keys(records: &[TaskRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.key()).collect()
    }

    #[tokio::test]
    async fn test_june_issues() {
        let mut issues = TestIssues::new(DEFAULT_STORY_DUE_DATE_FIELD);
        let records = issues.fetch(range((2024, 6, 1), (2024, 6, 30))).await.unwrap();
        assert_eq!(
            keys(&records),
            vec!["PROJ-101", "PROJ-102", "PROJ-103", "PROJ-104", "PROJ-105", "PROJ-106"]
        );
    }

    #[tokio::test]
    async fn test_range_matches_either_date() {
        let mut issues = TestIssues::new(DEFAULT_STORY_DUE_DATE_FIELD);
        let records = issues.fetch(range((2024, 6, 6), (2024, 6, 6))).await.unwrap();
        assert_eq!(keys(&records), vec!["PROJ-105"]);

        let records = issues.fetch(range((2024, 7, 1), (2024, 7, 31))).await.unwrap();
        assert_eq!(keys(&records), vec!["PROJ-200"]);
    }

    #[tokio::test]
    async fn test_other_story_field_is_ignored() {
        let mut issues = TestIssues::new("customfield_99999");
        let records = issues.fetch(range((2024, 6, 5), (2024, 6, 6))).await.unwrap();
        // Only the bug has a generic due date in range.
        assert_eq!(keys(&records), vec!["PROJ-102"]);
    }
}
