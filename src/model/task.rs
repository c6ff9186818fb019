use crate::model::date::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use tracing::warn;

/// The issue type name that marks a user story.
pub const STORY: &str = "Story";

/// The issue type name that marks a bug.
pub const BUG: &str = "Bug";

/// Bugs carrying this label are inherited work and are not counted in `total_bugs`.
pub const TAKEOVER_LABEL: &str = "Takeover";

/// A resolved story only counts as done when it reached this status.
pub const IN_BETA_STATUS: &str = "User Stories (In Beta)";

/// The Jira field holding the story due date unless the config says otherwise.
pub const DEFAULT_STORY_DUE_DATE_FIELD: &str = "customfield_10033";

/// The classification of an issue, taken from `fields.issuetype.name`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    Story,
    Bug,
    Other(String),
    /// The issue type was missing from the record.
    #[default]
    Unknown,
}

impl IssueType {
    pub fn is_story(&self) -> bool {
        matches!(self, IssueType::Story)
    }

    pub fn is_bug(&self) -> bool {
        matches!(self, IssueType::Bug)
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        match value.as_str() {
            STORY => IssueType::Story,
            BUG => IssueType::Bug,
            "" => IssueType::Unknown,
            _ => IssueType::Other(value),
        }
    }
}

impl From<&str> for IssueType {
    fn from(value: &str) -> Self {
        IssueType::from(value.to_string())
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.to_string()
    }
}

impl Display for IssueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueType::Story => f.write_str(STORY),
            IssueType::Bug => f.write_str(BUG),
            IssueType::Other(s) => f.write_str(s),
            IssueType::Unknown => Ok(()),
        }
    }
}

/// One task from the issue tracker, reduced to the fields the aggregator reads. Every field is
/// optional on the wire; an absent or unparseable value is `None`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub(crate) key: Option<String>,
    pub(crate) issue_type: IssueType,
    pub(crate) due_date: Option<NaiveDate>,
    pub(crate) story_due_date: Option<NaiveDate>,
    pub(crate) resolution_date: Option<NaiveDate>,
    pub(crate) status: Option<String>,
    pub(crate) labels: Vec<String>,
}

impl TaskRecord {
    pub fn new(issue_type: impl Into<IssueType>) -> Self {
        Self {
            issue_type: issue_type.into(),
            ..Default::default()
        }
    }

    pub fn with_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn with_story_due_date(mut self, date: NaiveDate) -> Self {
        self.story_due_date = Some(date);
        self
    }

    pub fn with_resolution_date(mut self, date: NaiveDate) -> Self {
        self.resolution_date = Some(date);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn issue_type(&self) -> &IssueType {
        &self.issue_type
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn story_due_date(&self) -> Option<NaiveDate> {
        self.story_due_date
    }

    pub fn resolution_date(&self) -> Option<NaiveDate> {
        self.resolution_date
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Stories are grouped by the story due date, everything else by the generic due date.
    pub fn grouping_date(&self) -> Option<NaiveDate> {
        if self.issue_type.is_story() {
            self.story_due_date
        } else {
            self.due_date
        }
    }

    /// The completion check always compares against the story due date, whatever the type.
    pub fn comparison_due_date(&self) -> Option<NaiveDate> {
        self.story_due_date
    }

    /// Builds a record from a raw Jira issue as returned by the search API. Malformed fields are
    /// logged and treated as absent.
    pub fn from_issue(issue: &JiraIssue, story_due_date_field: &str) -> Self {
        let key = issue.key.clone();
        let label = key.as_deref().unwrap_or("<no key>");
        let fields = &issue.fields;
        Self {
            issue_type: fields
                .issuetype
                .as_ref()
                .and_then(|n| n.name.clone())
                .map(IssueType::from)
                .unwrap_or_default(),
            due_date: date_field(label, "duedate", fields.duedate.as_deref()),
            story_due_date: date_field(
                label,
                story_due_date_field,
                fields.other.get(story_due_date_field).and_then(Value::as_str),
            ),
            resolution_date: date_field(
                label,
                "resolutiondate",
                fields.resolutiondate.as_deref(),
            ),
            status: fields.status.as_ref().and_then(|n| n.name.clone()),
            labels: fields.labels.clone().unwrap_or_default(),
            key,
        }
    }
}

fn date_field(issue: &str, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?;
    let parsed = parse_date(raw);
    if parsed.is_none() {
        warn!("Malformed record {issue}: unable to parse {field} '{raw}' as a date");
    }
    parsed
}

/// The shape of an issue in the Jira REST v2 search response. Only the fields we read are named;
/// custom fields land in `other`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub(crate) key: Option<String>,
    #[serde(default)]
    pub(crate) fields: JiraFields,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraFields {
    #[serde(default)]
    pub(crate) issuetype: Option<Named>,
    #[serde(default)]
    pub(crate) duedate: Option<String>,
    #[serde(default)]
    pub(crate) resolutiondate: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<Named>,
    #[serde(default)]
    pub(crate) labels: Option<Vec<String>>,
    #[serde(flatten)]
    pub(crate) other: Map<String, Value>,
}

/// Jira nests names inside objects, e.g. `"status": {"name": "Done"}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub(crate) name: Option<String>,
}

/// One page of a Jira search response.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub(crate) start_at: usize,
    #[serde(default)]
    pub(crate) max_results: usize,
    #[serde(default)]
    pub(crate) total: usize,
    #[serde(default)]
    pub(crate) issues: Vec<JiraIssue>,
}
