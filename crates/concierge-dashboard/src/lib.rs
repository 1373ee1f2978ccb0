//! Dashboard aggregation for concierge.
//!
//! The dashboard view is assembled from several independent endpoints. This
//! crate loads them concurrently, tolerates partial failure, and normalizes
//! inconsistent upstream chart shapes into [`ChartSeries`].
//!
//! - [`normalize`]: shape classification and value coercion
//! - [`aggregator`]: settle-all fan-out with per-branch defaults
//! - [`source`]: the [`DashboardSource`] seam and its gateway implementation
//!
//! # Example
//!
//! ```
//! use concierge_core::ChartSeries;
//! use concierge_dashboard::normalize::normalize;
//! use serde_json::json;
//!
//! let raw = json!({"labels": ["Mon", "Tue"], "data": ["5", "x"]});
//! let series = normalize(Some(&raw), &ChartSeries::zeroed(["Mon"]));
//! assert_eq!(series.values(), &[5.0, 0.0]);
//! ```
//!
//! [`ChartSeries`]: concierge_core::ChartSeries

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregator;
pub mod normalize;
pub mod source;
pub mod types;

pub use aggregator::{settle_all, Aggregator, Settled, SourceCall, DEFAULT_RECENT_LIMIT};
pub use normalize::ChartPayload;
pub use source::{DashboardSource, GatewaySource};
pub use types::{DashboardComposite, DashboardStats, RevenueSeries};
