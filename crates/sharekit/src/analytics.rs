//! Access analytics: aggregates over the recent audit window.
//!
//! All numbers are computed from the most recent records only, never
//! from the full history. The window bounds live in [`GateConfig`].
//!
//! [`GateConfig`]: crate::gate::GateConfig

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sharekit_core::{AccessKind, AccessOutcome, AccessRecord, UserId};

/// One entry in the recent-activity slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub kind: AccessKind,
    pub outcome: AccessOutcome,
    pub user: Option<UserId>,
    pub origin_address: String,
    /// Agent string, truncated for display.
    pub origin_agent: String,
    pub cause: String,
    pub created_at: i64,
}

/// Aggregated access analytics for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAnalytics {
    /// Records considered (at most the configured window).
    pub window: usize,
    /// Successful views inside the window.
    pub total_views: u64,
    /// Distinct origin addresses among successful views.
    pub unique_origins: u64,
    /// Record counts keyed by access kind (wire name).
    pub by_kind: BTreeMap<String, u64>,
    /// Record counts keyed by outcome (wire name).
    pub by_outcome: BTreeMap<String, u64>,
    /// The most recent entries, newest first.
    pub recent: Vec<ActivityEntry>,
}

/// Compute analytics over `records` (assumed newest-first).
///
/// `recent_limit` bounds the activity slice and `agent_max_chars` bounds
/// the agent string carried in each entry.
pub fn compute(
    records: &[AccessRecord],
    recent_limit: usize,
    agent_max_chars: usize,
) -> ProfileAnalytics {
    let mut total_views = 0u64;
    let mut origins = BTreeSet::new();
    let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_outcome: BTreeMap<String, u64> = BTreeMap::new();

    for record in records {
        if record.kind == AccessKind::View && record.outcome == AccessOutcome::Success {
            total_views += 1;
            // Unique visitors are successful views only; denied attempts
            // and other kinds do not count as visits.
            if !record.meta.origin_address.is_empty() {
                origins.insert(record.meta.origin_address.as_str());
            }
        }
        *by_kind.entry(record.kind.as_str().to_string()).or_default() += 1;
        *by_outcome
            .entry(record.outcome.as_str().to_string())
            .or_default() += 1;
    }

    let recent = records
        .iter()
        .take(recent_limit)
        .map(|record| ActivityEntry {
            kind: record.kind,
            outcome: record.outcome,
            user: record.user,
            origin_address: record.meta.origin_address.clone(),
            origin_agent: truncate_chars(&record.meta.origin_agent, agent_max_chars),
            cause: record.cause.clone(),
            created_at: record.created_at,
        })
        .collect();

    ProfileAnalytics {
        window: records.len(),
        total_views,
        unique_origins: origins.len() as u64,
        by_kind,
        by_outcome,
        recent,
    }
}

/// Truncate to at most `max` characters (not bytes).
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
