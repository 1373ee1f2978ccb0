//! Concurrent multi-source loading with per-branch defaults.
//!
//! [`settle_all`] drives every named call to completion on the calling task
//! and never short-circuits. [`Aggregator`] builds the dashboard on top of it,
//! replacing each failed branch with its documented default.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use concierge_auth::Period;
use concierge_core::{ChartSeries, Outcome};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;

use crate::normalize::normalize;
use crate::source::DashboardSource;
use crate::types::{
    default_categories, default_revenue, extract_list, DashboardComposite, DashboardStats,
    RevenueSeries,
};

/// Number of recent bookings requested for the dashboard.
pub const DEFAULT_RECENT_LIMIT: u32 = 5;

const STATS: &str = "stats";
const CATEGORIES: &str = "categories";
const RECENT_BOOKINGS: &str = "recent_bookings";

fn revenue_branch(period: Period) -> String {
    format!("revenue_{period}")
}

// =============================================================================
// Settle-all
// =============================================================================

/// A named pending call.
pub struct SourceCall<'a> {
    name: String,
    future: BoxFuture<'a, Outcome<Value>>,
}

impl<'a> SourceCall<'a> {
    /// Name a pending call.
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Outcome<Value>> + Send + 'a,
    {
        Self {
            name: name.into(),
            future: future.boxed(),
        }
    }

    /// The call's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SourceCall<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCall")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Every outcome of a [`settle_all`], keyed by call name in submission order.
#[derive(Debug, Default)]
pub struct Settled {
    outcomes: Vec<(String, Outcome<Value>)>,
}

impl Settled {
    /// The outcome for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Outcome<Value>> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// Remove and return the outcome for `name`.
    pub fn take(&mut self, name: &str) -> Option<Outcome<Value>> {
        let index = self.outcomes.iter().position(|(n, _)| n == name)?;
        Some(self.outcomes.remove(index).1)
    }

    /// Names of the calls that failed.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(name, _)| name.as_str())
    }

    /// Iterate over `(name, outcome)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome<Value>)> {
        self.outcomes.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Number of settled calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns `true` if nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Wait for every call to finish, successes and failures alike.
pub async fn settle_all(calls: Vec<SourceCall<'_>>) -> Settled {
    let (names, futures): (Vec<String>, Vec<_>) =
        calls.into_iter().map(|call| (call.name, call.future)).unzip();
    let outcomes = join_all(futures).await;
    Settled {
        outcomes: names.into_iter().zip(outcomes).collect(),
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Loads the dashboard composite from a [`DashboardSource`].
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn DashboardSource>,
    recent_limit: u32,
}

impl Aggregator {
    /// Create an aggregator over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn DashboardSource>) -> Self {
        Self {
            source,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Request `limit` recent bookings instead of the default.
    #[must_use]
    pub const fn with_recent_limit(mut self, limit: u32) -> Self {
        self.recent_limit = limit;
        self
    }

    /// Load every dashboard branch concurrently.
    ///
    /// Never fails: each failed branch is logged, named in
    /// [`DashboardComposite::degraded`], and replaced by its default.
    pub async fn load_composite(&self) -> DashboardComposite {
        let source = &*self.source;
        let mut calls = vec![SourceCall::new(STATS, source.stats())];
        calls.extend(
            Period::ALL
                .iter()
                .map(|&period| SourceCall::new(revenue_branch(period), source.revenue(period))),
        );
        calls.push(SourceCall::new(CATEGORIES, source.categories()));
        calls.push(SourceCall::new(
            RECENT_BOOKINGS,
            source.recent_bookings(self.recent_limit),
        ));

        let mut settled = settle_all(calls).await;
        let mut degraded = Vec::new();

        let stats = branch(&mut settled, STATS, &mut degraded)
            .map(|raw| DashboardStats::from_payload(&raw))
            .unwrap_or_default();
        let revenue = revenue_from(&mut settled, &mut degraded);
        let categories = chart(
            branch(&mut settled, CATEGORIES, &mut degraded),
            &default_categories(),
        );
        let recent_bookings = branch(&mut settled, RECENT_BOOKINGS, &mut degraded)
            .map(|raw| extract_list(&raw))
            .unwrap_or_default();

        if degraded.is_empty() {
            tracing::debug!("Dashboard loaded");
        } else {
            tracing::info!(degraded = ?degraded, "Dashboard loaded with defaults");
        }

        DashboardComposite {
            stats,
            revenue,
            categories,
            recent_bookings,
            degraded,
            loaded_at: Utc::now(),
        }
    }

    /// Reload only the revenue charts.
    pub async fn refresh_revenue(&self) -> RevenueSeries {
        let source = &*self.source;
        let calls = Period::ALL
            .iter()
            .map(|&period| SourceCall::new(revenue_branch(period), source.revenue(period)))
            .collect();

        let mut settled = settle_all(calls).await;
        let mut degraded = Vec::new();
        revenue_from(&mut settled, &mut degraded)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("recent_limit", &self.recent_limit)
            .finish_non_exhaustive()
    }
}

fn revenue_from(settled: &mut Settled, degraded: &mut Vec<String>) -> RevenueSeries {
    let mut series = |period: Period| {
        chart(
            branch(settled, &revenue_branch(period), degraded),
            &default_revenue(period),
        )
    };
    RevenueSeries {
        week: series(Period::Week),
        month: series(Period::Month),
        quarter: series(Period::Quarter),
    }
}

fn chart(raw: Option<Value>, fallback: &ChartSeries) -> ChartSeries {
    normalize(raw.as_ref(), fallback)
}

/// Take a branch's payload, recording it as degraded on failure.
fn branch(settled: &mut Settled, name: &str, degraded: &mut Vec<String>) -> Option<Value> {
    match settled.take(name) {
        Some(Ok(raw)) => Some(raw),
        Some(Err(err)) => {
            if err.is_auth_expired() {
                tracing::debug!(branch = name, "Branch rejected after session expiry");
            } else {
                tracing::warn!(
                    branch = name,
                    kind = err.kind.as_str(),
                    error = %err,
                    "Branch failed, using default"
                );
            }
            degraded.push(name.to_string());
            None
        }
        None => {
            degraded.push(name.to_string());
            None
        }
    }
}
