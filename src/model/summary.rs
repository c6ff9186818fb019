use crate::model::date::DateKey;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;

/// The counters for one calendar day. All counters start at zero when the bucket is created.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total_tasks: u32,
    pub done_tasks: u32,
    pub total_bugs: u32,
    pub total_us: u32,
    pub done_us: u32,
}

/// One of the five counters of a `DailySummary`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Metric {
    TotalTasks,
    DoneTasks,
    TotalBugs,
    TotalUs,
    DoneUs,
}

impl Metric {
    /// All metrics, in the order their columns usually appear in the sheet.
    pub const ALL: [Metric; 5] = [
        Metric::TotalTasks,
        Metric::DoneTasks,
        Metric::TotalBugs,
        Metric::TotalUs,
        Metric::DoneUs,
    ];

    /// The sheet header this metric is written under.
    pub fn header(&self) -> &'static str {
        match self {
            Metric::TotalTasks => "Total Issues",
            Metric::DoneTasks => "Completed Tasks",
            Metric::TotalBugs => "Total Bugs",
            Metric::TotalUs => "Total US",
            Metric::DoneUs => "Completed US",
        }
    }
}

impl DailySummary {
    pub fn get(&self, metric: Metric) -> u32 {
        match metric {
            Metric::TotalTasks => self.total_tasks,
            Metric::DoneTasks => self.done_tasks,
            Metric::TotalBugs => self.total_bugs,
            Metric::TotalUs => self.total_us,
            Metric::DoneUs => self.done_us,
        }
    }

    pub(crate) fn increment(&mut self, metric: Metric) {
        let counter = match metric {
            Metric::TotalTasks => &mut self.total_tasks,
            Metric::DoneTasks => &mut self.done_tasks,
            Metric::TotalBugs => &mut self.total_bugs,
            Metric::TotalUs => &mut self.total_us,
            Metric::DoneUs => &mut self.done_us,
        };
        *counter += 1;
    }
}

/// Daily summaries keyed by normalized date. Serializes as a JSON object keyed by the display
/// form of the date, e.g. `{"Jun 5, 2024": {"totalTasks": 1, ...}}`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryTable(BTreeMap<DateKey, DailySummary>);

impl SummaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket for `key`, creating a zeroed one if this is the first time `key` is seen.
    pub(crate) fn bucket(&mut self, key: DateKey) -> &mut DailySummary {
        self.0.entry(key).or_default()
    }

    pub fn get(&self, key: &DateKey) -> Option<&DailySummary> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, DateKey, DailySummary> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a SummaryTable {
    type Item = (&'a DateKey, &'a DailySummary);
    type IntoIter = Iter<'a, DateKey, DailySummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(DateKey, DailySummary)> for SummaryTable {
    fn from_iter<T: IntoIterator<Item = (DateKey, DailySummary)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
