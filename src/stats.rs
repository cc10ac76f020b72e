//! Run-scoped success/failure bookkeeping shared by all page tasks

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Counters for one crawl run.
///
/// Shared behind an `Arc`; every mutation is a single insert, append or
/// atomic add, so concurrent page tasks never need a wider lock.
#[derive(Debug, Default)]
pub struct RunStatistics {
    successful: Mutex<HashSet<String>>,
    failed: Mutex<Vec<(String, Vec<String>)>>,
    variants_found: AtomicUsize,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, variant_id: &str) {
        self.successful
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(variant_id.to_string());
    }

    /// Appends `variant_id` to the bucket for `message`, creating the bucket
    /// at the end of the list on first use
    pub fn record_failure(&self, message: &str, variant_id: &str) {
        let mut failed = self
            .failed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match failed.iter_mut().find(|(m, _)| m == message) {
            Some((_, ids)) => ids.push(variant_id.to_string()),
            None => failed.push((message.to_string(), vec![variant_id.to_string()])),
        }
    }

    pub fn add_variants(&self, count: usize) {
        self.variants_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn summary(&self, site: &str) -> RunSummary {
        let successful = self
            .successful
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len();
        let failures = self
            .failed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        RunSummary {
            site: site.to_string(),
            successful,
            variants_found: self.variants_found.load(Ordering::Relaxed),
            failed_total: failures.iter().map(|(_, ids)| ids.len()).sum(),
            failures,
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub site: String,
    pub successful: usize,
    pub variants_found: usize,
    pub failed_total: usize,
    /// Failed ids grouped by message, in order of each message's first occurrence
    pub failures: Vec<(String, Vec<String>)>,
}

impl RunSummary {
    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{rule}")?;
        writeln!(f, "{} SCRAPING STATISTICS", self.site.to_uppercase())?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Total unique products successfully scraped: {}", self.successful)?;
        writeln!(f, "Total color variants found: {}", self.variants_found)?;
        writeln!(f, "Total failed products: {}", self.failed_total)?;
        if !self.failures.is_empty() {
            writeln!(f, "Failed products by reason:")?;
            for (reason, ids) in &self.failures {
                writeln!(f, "{reason}:")?;
                for id in ids {
                    writeln!(f, "- {id}")?;
                }
            }
        }
        write!(f, "{rule}")
    }
}
