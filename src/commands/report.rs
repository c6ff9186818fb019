use crate::aggregate::aggregate;
use crate::api::{self, Mode};
use crate::commands::Out;
use crate::config::Config;
use crate::error::{ErrorType, IntoResult};
use crate::model::{DateRange, SummaryTable};
use crate::Result;
use anyhow::Context;
use tracing::info;

/// Handles `taskstat report`: fetches the issues in `range` and prints the per-day summary. The
/// sheet is not read or written.
pub async fn report(config: &Config, mode: Mode, range: DateRange) -> Result<Out<SummaryTable>> {
    let summary = fetch_summary(config, mode, range).await?;
    Ok(Out::new(
        format!(
            "Counted issues for {} days between {} and {}",
            summary.len(),
            range.start(),
            range.end()
        ),
        summary,
    ))
}

/// Fetches the issues in `range` and aggregates them.
pub(super) async fn fetch_summary(
    config: &Config,
    mode: Mode,
    range: DateRange,
) -> Result<SummaryTable> {
    let mut issues = api::issues(config, mode).pub_result(ErrorType::Configuration)?;
    let records = issues
        .fetch(range)
        .await
        .with_context(|| {
            format!(
                "Unable to fetch issues due between {} and {}",
                range.start(),
                range.end()
            )
        })
        .pub_result(ErrorType::IssueSource)?;
    info!("Fetched {} issues", records.len());
    Ok(aggregate(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DailySummary, DateKey};
    use crate::test::{june, june_range, TestEnv};

    #[tokio::test]
    async fn test_report_june() {
        let env = TestEnv::new().await;
        let out = report(&env.config(), Mode::Testing, june_range())
            .await
            .unwrap();
        let summary = out.structure().unwrap();
        assert_eq!(summary.len(), 4);
        assert_eq!(
            summary.get(&DateKey::from(june(5))),
            Some(&DailySummary {
                total_tasks: 1,
                done_tasks: 0,
                total_bugs: 1,
                total_us: 1,
                done_us: 1,
            })
        );
        assert_eq!(
            summary.get(&DateKey::from(june(4))),
            Some(&DailySummary {
                total_tasks: 2,
                done_tasks: 1,
                total_bugs: 0,
                total_us: 0,
                done_us: 0,
            })
        );
        assert_eq!(
            summary.get(&DateKey::from(june(6))),
            Some(&DailySummary {
                done_tasks: 1,
                total_us: 1,
                ..Default::default()
            })
        );
    }

    #[tokio::test]
    async fn test_report_without_jira_credentials() {
        let env = TestEnv::new().await;
        let err = report(&env.config(), Mode::Google, june_range())
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Configuration);
        assert!(err.to_string().contains("JIRA_API_KEY"));
    }
}
