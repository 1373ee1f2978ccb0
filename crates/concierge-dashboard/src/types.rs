//! Dashboard view types and their documented defaults.

use chrono::{DateTime, Utc};
use concierge_auth::Period;
use concierge_core::ChartSeries;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalize::coerce;

/// Headline counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// All bookings ever made.
    pub total_bookings: u64,
    /// Revenue across all completed bookings.
    pub total_revenue: f64,
    /// Registered users.
    pub total_users: u64,
    /// Services on offer.
    pub total_services: u64,
    /// Bookings awaiting confirmation.
    pub pending_bookings: u64,
}

impl DashboardStats {
    /// Extract counters leniently from an upstream payload.
    ///
    /// A `data` wrapper is unwrapped; missing or malformed fields are `0`.
    #[must_use]
    pub fn from_payload(raw: &Value) -> Self {
        let fields = match raw.get("data") {
            Some(Value::Object(inner)) => Some(inner),
            _ => raw.as_object(),
        };
        let Some(fields) = fields else {
            return Self::default();
        };

        Self {
            total_bookings: count(fields, "totalBookings"),
            total_revenue: fields.get("totalRevenue").map_or(0.0, coerce),
            total_users: count(fields, "totalUsers"),
            total_services: count(fields, "totalServices"),
            pending_bookings: count(fields, "pendingBookings"),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(fields: &Map<String, Value>, key: &str) -> u64 {
    let n = fields.get(key).map_or(0.0, coerce);
    if n > 0.0 {
        n.round() as u64
    } else {
        0
    }
}

/// Revenue charts for every [`Period`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSeries {
    /// Last seven days, one point per weekday.
    #[serde(rename = "7d")]
    pub week: ChartSeries,
    /// Last thirty days, one point per week.
    #[serde(rename = "30d")]
    pub month: ChartSeries,
    /// Last ninety days, one point per month.
    #[serde(rename = "90d")]
    pub quarter: ChartSeries,
}

impl RevenueSeries {
    /// The chart for `period`.
    #[must_use]
    pub const fn get(&self, period: Period) -> &ChartSeries {
        match period {
            Period::Week => &self.week,
            Period::Month => &self.month,
            Period::Quarter => &self.quarter,
        }
    }
}

impl Default for RevenueSeries {
    fn default() -> Self {
        Self {
            week: default_revenue(Period::Week),
            month: default_revenue(Period::Month),
            quarter: default_revenue(Period::Quarter),
        }
    }
}

/// The zero-valued revenue chart used when a period cannot be loaded.
#[must_use]
pub fn default_revenue(period: Period) -> ChartSeries {
    match period {
        Period::Week => ChartSeries::zeroed(["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]),
        Period::Month => ChartSeries::zeroed((1..=4).map(|n| format!("Week {n}"))),
        Period::Quarter => ChartSeries::zeroed((1..=3).map(|n| format!("Month {n}"))),
    }
}

/// The category breakdown used when categories cannot be loaded.
#[must_use]
pub fn default_categories() -> ChartSeries {
    ChartSeries::zeroed(["Uncategorized"])
}

/// Everything the dashboard view renders, assembled from several sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardComposite {
    /// Headline counters.
    pub stats: DashboardStats,
    /// Revenue charts by period.
    pub revenue: RevenueSeries,
    /// Bookings by service category.
    pub categories: ChartSeries,
    /// Most recent bookings, passed through as received.
    pub recent_bookings: Vec<Value>,
    /// Names of the branches that failed and were replaced by defaults.
    pub degraded: Vec<String>,
    /// When the composite was assembled.
    pub loaded_at: DateTime<Utc>,
}

impl DashboardComposite {
    /// Returns `true` if every branch loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

impl Default for DashboardComposite {
    fn default() -> Self {
        Self {
            stats: DashboardStats::default(),
            revenue: RevenueSeries::default(),
            categories: default_categories(),
            recent_bookings: Vec::new(),
            degraded: Vec::new(),
            loaded_at: Utc::now(),
        }
    }
}

/// Extract a booking list from an array or a `data`/`bookings` wrapper.
#[must_use]
pub fn extract_list(raw: &Value) -> Vec<Value> {
    if let Some(items) = raw.as_array() {
        return items.clone();
    }
    ["data", "bookings"]
        .iter()
        .find_map(|key| match raw.get(key) {
            Some(Value::Array(items)) => Some(items.clone()),
            Some(inner @ Value::Object(_)) => inner.get("bookings").and_then(Value::as_array).cloned(),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_from_wrapped_payload() {
        let raw = json!({"success": true, "data": {
            "totalBookings": 42,
            "totalRevenue": "1250.50",
            "totalUsers": 7,
            "pendingBookings": "n/a"
        }});
        let stats = DashboardStats::from_payload(&raw);
        assert_eq!(stats.total_bookings, 42);
        assert!((stats.total_revenue - 1250.5).abs() < f64::EPSILON);
        assert_eq!(stats.total_users, 7);
        assert_eq!(stats.total_services, 0);
        assert_eq!(stats.pending_bookings, 0);
    }

    #[test]
    fn stats_from_garbage_are_zero() {
        assert_eq!(DashboardStats::from_payload(&json!([1, 2])), DashboardStats::default());
        assert_eq!(
            DashboardStats::from_payload(&json!({"totalBookings": -3})).total_bookings,
            0
        );
    }

    #[test]
    fn revenue_defaults() {
        let revenue = RevenueSeries::default();
        assert_eq!(revenue.week.len(), 7);
        assert_eq!(revenue.week.labels()[0], "Mon");
        assert_eq!(revenue.week.labels()[6], "Sun");
        assert_eq!(revenue.month.labels()[3], "Week 4");
        assert_eq!(revenue.get(Period::Quarter).labels(), &[
            "Month 1".to_string(),
            "Month 2".to_string(),
            "Month 3".to_string()
        ]);
        for period in Period::ALL {
            let series = revenue.get(period);
            assert_eq!(series.labels().len(), series.values().len());
            assert!(series.total().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn category_default() {
        let categories = default_categories();
        assert_eq!(categories.labels(), &["Uncategorized".to_string()]);
        assert_eq!(categories.values(), &[0.0]);
    }

    #[test]
    fn list_extraction() {
        assert_eq!(extract_list(&json!([{"_id": "a"}])).len(), 1);
        assert_eq!(extract_list(&json!({"data": [1, 2]})).len(), 2);
        assert_eq!(extract_list(&json!({"bookings": [1]})).len(), 1);
        assert_eq!(extract_list(&json!({"data": {"bookings": [1, 2, 3]}})).len(), 3);
        assert!(extract_list(&json!({"data": "none"})).is_empty());
        assert!(extract_list(&json!(null)).is_empty());
    }

    #[test]
    fn composite_serializes_camel_case() {
        let composite = DashboardComposite::default();
        let json = serde_json::to_value(&composite).unwrap();
        assert!(json.get("recentBookings").is_some());
        assert!(json.get("loadedAt").is_some());
        assert!(json["revenue"].get("30d").is_some());
        assert!(composite.is_complete());
    }
}
