//! Data sources feeding the dashboard.

use async_trait::async_trait;
use concierge_auth::{AdminApi, AuthGateway, Period};
use concierge_core::Outcome;
use serde_json::Value;

/// Trait for fetching raw dashboard payloads.
///
/// This trait abstracts the dashboard endpoints, allowing for mock
/// implementations in tests.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    /// Headline counters.
    async fn stats(&self) -> Outcome<Value>;

    /// Revenue chart for one period.
    async fn revenue(&self, period: Period) -> Outcome<Value>;

    /// Bookings by service category.
    async fn categories(&self) -> Outcome<Value>;

    /// The `limit` most recent bookings.
    async fn recent_bookings(&self, limit: u32) -> Outcome<Value>;
}

/// [`DashboardSource`] backed by the admin REST API.
#[derive(Debug, Clone)]
pub struct GatewaySource {
    api: AdminApi,
}

impl GatewaySource {
    /// Create a source over an authenticated gateway.
    #[must_use]
    pub const fn new(gateway: AuthGateway) -> Self {
        Self {
            api: AdminApi::new(gateway),
        }
    }
}

#[async_trait]
impl DashboardSource for GatewaySource {
    async fn stats(&self) -> Outcome<Value> {
        self.api.dashboard_stats().await
    }

    async fn revenue(&self, period: Period) -> Outcome<Value> {
        self.api.revenue_chart(period).await
    }

    async fn categories(&self) -> Outcome<Value> {
        self.api.booking_categories().await
    }

    async fn recent_bookings(&self, limit: u32) -> Outcome<Value> {
        self.api.recent_bookings(limit).await
    }
}
