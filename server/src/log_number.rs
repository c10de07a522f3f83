//! # Log Numbers
//!
//! Human readable, category scoped identifiers such as `EXC-000042`.
//!
//! Uniqueness rests entirely on the counter store never handing out the same value twice for a category.
//! A number issued for a record that is never saved is simply skipped.
//!
//! Every increment is bounded by [`ISSUE_TIMEOUT`]. A timed out increment may still have landed, so it is
//! reported as [`StoreUnavailable`] and never retried.
use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::counter::{CounterStore, LogCategory, StoreUnavailable};

const LOG_NUMBER_WIDTH: usize = 6;

pub const ISSUE_TIMEOUT: Duration = Duration::from_secs(2);

pub fn format_log_number(category: LogCategory, value: u64) -> String {
    format!(
        "{}-{:0width$}",
        category.prefix(),
        value,
        width = LOG_NUMBER_WIDTH
    )
}

/// Inverse of [`format_log_number`], `None` for anything that is not `<PREFIX>-<digits>`.
pub fn parse_log_number(log_number: &str) -> Option<(LogCategory, u64)> {
    let (prefix, digits) = log_number.split_once('-')?;
    let category = LogCategory::ALL
        .into_iter()
        .find(|category| category.prefix() == prefix)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok().map(|value| (category, value))
}

#[derive(Clone)]
pub struct LogNumberIssuer {
    counters: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl LogNumberIssuer {
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self {
            counters,
            timeout: ISSUE_TIMEOUT,
        }
    }

    pub async fn issue(&self, category: LogCategory) -> Result<String, StoreUnavailable> {
        let value = match timeout(self.timeout, self.counters.increment_and_get(category)).await {
            Ok(result) => result,
            Err(_) => Err(StoreUnavailable::new(format!(
                "increment for {category} timed out, outcome unknown"
            ))),
        }
        .inspect_err(|e| warn!("Failed to issue {category} log number: {e}"))?;

        let log_number = format_log_number(category, value);
        debug!("Issued {log_number}");

        Ok(log_number)
    }
}
