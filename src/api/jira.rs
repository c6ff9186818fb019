//! Implements the `IssueSource` trait against the Jira REST v2 search API.

use crate::api::IssueSource;
use crate::config::JiraCredentials;
use crate::error::Res;
use crate::model::{DateRange, SearchPage, TaskRecord};
use anyhow::{bail, Context};
use reqwest::header::ACCEPT;
use tracing::{debug, trace};
use url::Url;

/// Jira caps `maxResults` at 100 for most instances.
const PAGE_SIZE: usize = 100;

pub(super) struct JiraIssues {
    client: reqwest::Client,
    search_url: Url,
    credentials: JiraCredentials,
    assignee_jql: String,
    story_due_date_field: String,
}

impl JiraIssues {
    pub(super) fn new(
        jira_url: &str,
        credentials: JiraCredentials,
        assignee_jql: impl Into<String>,
        story_due_date_field: impl Into<String>,
    ) -> Res<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            search_url: search_url(jira_url)?,
            credentials,
            assignee_jql: assignee_jql.into(),
            story_due_date_field: story_due_date_field.into(),
        })
    }

    async fn fetch_page(&self, jql: &str, start_at: usize) -> Res<SearchPage> {
        trace!("Fetching Jira search page starting at {start_at}");
        let response = self
            .client
            .get(self.search_url.clone())
            .basic_auth(self.credentials.email(), Some(self.credentials.api_key()))
            .header(ACCEPT, "application/json")
            .query(&[
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send the search request to {}", self.search_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Jira search failed with status {status}: {body}");
        }

        response
            .json::<SearchPage>()
            .await
            .context("Failed to parse the Jira search response")
    }
}

#[async_trait::async_trait]
impl IssueSource for JiraIssues {
    async fn fetch(&mut self, range: DateRange) -> Res<Vec<TaskRecord>> {
        let jql = search_jql(&self.assignee_jql, range);
        debug!("Searching Jira with: {jql}");

        let mut records = Vec::new();
        let mut start_at = 0;
        loop {
            let page = self.fetch_page(&jql, start_at).await?;
            let fetched = page.issues.len();
            records.extend(
                page.issues
                    .iter()
                    .map(|issue| TaskRecord::from_issue(issue, &self.story_due_date_field)),
            );
            start_at += fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        debug!("Fetched {} issues from Jira", records.len());
        Ok(records)
    }
}

/// Builds the search endpoint URL, keeping any path prefix the Jira base URL has.
fn search_url(jira_url: &str) -> Res<Url> {
    let mut base = Url::parse(jira_url).with_context(|| format!("Invalid Jira URL '{jira_url}'"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("rest/api/2/search")
        .with_context(|| format!("Unable to build the search URL from '{jira_url}'"))
}

/// Matches issues whose story due date or generic due date falls in `range`.
pub(crate) fn search_jql(assignee_jql: &str, range: DateRange) -> String {
    let start = range.start().format("%Y-%m-%d");
    let end = range.end().format("%Y-%m-%d");
    format!(
        r#"{assignee_jql} AND (("due date" >= "{start}" AND "due date" <= "{end}") OR (duedate >= "{start}" AND duedate <= "{end}"))"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url("https://example.atlassian.net").unwrap().as_str(),
            "https://example.atlassian.net/rest/api/2/search"
        );
        assert_eq!(
            search_url("https://example.com/jira").unwrap().as_str(),
            "https://example.com/jira/rest/api/2/search"
        );
        assert!(search_url("not a url").is_err());
    }

    #[test]
    fn test_search_jql() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap();
        assert_eq!(
            search_jql("assignee=currentuser()", range),
            r#"assignee=currentuser() AND (("due date" >= "2024-06-01" AND "due date" <= "2024-06-30") OR (duedate >= "2024-06-01" AND duedate <= "2024-06-30"))"#
        );
    }
}
