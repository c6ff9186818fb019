//! Counts Jira issues per due date and writes the daily completion statistics into the matching
//! rows of a Google sheet.

mod aggregate;
mod api;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
pub mod model;
mod reconcile;
mod utils;


pub use aggregate::aggregate;
pub use api::{Mode, TEST_MODE_ENV};
pub use backup::{Backup, SheetSnapshot};
pub use config::{Config, InitSettings, JiraCredentials};
pub use error::{Error, ErrorType, Result};
pub use reconcile::{Reconciliation, SheetReconciler, DEFAULT_DATE_HEADER};
