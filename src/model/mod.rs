//! Types that represent the core data model, such as `TaskRecord` and `SummaryTable`.
mod date;
mod mapping;
mod row_update;
mod summary;
mod task;

pub use date::{normalize_date, parse_date, DateKey, DateRange, INVALID_DATE};
pub use mapping::{Header, Mapping};
pub use row_update::{column_letters, quote_sheet_name, RowUpdate};
pub use summary::{DailySummary, Metric, SummaryTable};
pub use task::{
    IssueType, JiraIssue, SearchPage, TaskRecord, BUG, DEFAULT_STORY_DUE_DATE_FIELD,
    IN_BETA_STATUS, STORY, TAKEOVER_LABEL,
};
