//! Typed helpers for the admin REST endpoints.
//!
//! Each helper is a thin wrapper over [`AuthGateway::send_query`] and returns
//! the raw JSON payload; shaping the payload is the caller's concern.

use std::fmt;
use std::str::FromStr;

use concierge_core::{ApiError, Outcome};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Value};

use crate::gateway::AuthGateway;

/// Reporting period for chart endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// Last seven days (`7d`).
    Week,
    /// Last thirty days (`30d`).
    Month,
    /// Last ninety days (`90d`).
    Quarter,
}

impl Period {
    /// All periods, shortest first.
    pub const ALL: [Self; 3] = [Self::Week, Self::Month, Self::Quarter];

    /// The query-string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            other => Err(ApiError::validation(format!("unknown period: {other}"))),
        }
    }
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    /// Awaiting confirmation.
    Pending,
    /// Confirmed by staff.
    Confirmed,
    /// Service delivered.
    Completed,
    /// Cancelled by either side.
    Cancelled,
}

impl BookingStatus {
    /// The wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ApiError::validation(format!("unknown booking status: {other}"))),
        }
    }
}

/// Filters for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    /// Only bookings in this state.
    pub status: Option<BookingStatus>,
    /// Free-text search.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
}

impl BookingQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// The admin endpoint surface.
#[derive(Debug, Clone)]
pub struct AdminApi {
    gateway: AuthGateway,
}

impl AdminApi {
    /// Wrap a gateway.
    #[must_use]
    pub const fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Outcome<Value> {
        self.gateway.send_query(Method::GET, path, query, None).await
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Summary counters.
    pub async fn dashboard_stats(&self) -> Outcome<Value> {
        self.get("/dashboard/stats", &[]).await
    }

    /// Revenue chart for one period.
    pub async fn revenue_chart(&self, period: Period) -> Outcome<Value> {
        self.get(
            "/dashboard/revenue-chart",
            &[("period", period.as_str().to_string())],
        )
        .await
    }

    /// Bookings broken down by service category.
    pub async fn booking_categories(&self) -> Outcome<Value> {
        self.get("/dashboard/booking-categories", &[]).await
    }

    /// The most recent bookings.
    pub async fn recent_bookings(&self, limit: u32) -> Outcome<Value> {
        self.get("/dashboard/recent-bookings", &[("limit", limit.to_string())])
            .await
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    /// List bookings.
    pub async fn list_bookings(&self, query: &BookingQuery) -> Outcome<Value> {
        self.get("/bookings", &query.to_pairs()).await
    }

    /// Fetch one booking.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn get_booking(&self, id: &str) -> Outcome<Value> {
        let path = format!("/bookings/{}", segment(id)?);
        self.get(&path, &[]).await
    }

    /// Move a booking to a new state.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Outcome<Value> {
        let path = format!("/bookings/{}/status", segment(id)?);
        let body = json!({ "status": status.as_str() });
        self.gateway.send(Method::PUT, &path, Some(&body)).await
    }

    /// Delete a booking.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn delete_booking(&self, id: &str) -> Outcome<Value> {
        let path = format!("/bookings/{}", segment(id)?);
        self.gateway.send(Method::DELETE, &path, None).await
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// List services.
    pub async fn list_services(&self) -> Outcome<Value> {
        self.get("/services", &[]).await
    }

    /// Create a service.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `service` has no non-empty `name`.
    pub async fn create_service(&self, service: &Value) -> Outcome<Value> {
        let has_name = service
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            return Err(ApiError::validation("Service name is required"));
        }
        self.gateway.send(Method::POST, "/services", Some(service)).await
    }

    /// Update a service.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn update_service(&self, id: &str, changes: &Value) -> Outcome<Value> {
        let path = format!("/services/{}", segment(id)?);
        self.gateway.send(Method::PUT, &path, Some(changes)).await
    }

    /// Delete a service.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn delete_service(&self, id: &str) -> Outcome<Value> {
        let path = format!("/services/{}", segment(id)?);
        self.gateway.send(Method::DELETE, &path, None).await
    }

    /// Upload a service image.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty id or empty file.
    pub async fn upload_service_image(
        &self,
        id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Outcome<Value> {
        let path = format!("/services/{}/photo", segment(id)?);
        if bytes.is_empty() {
            return Err(ApiError::validation("Please upload a file"));
        }
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        self.gateway.upload(Method::PUT, &path, form).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// List users.
    pub async fn list_users(&self) -> Outcome<Value> {
        self.get("/users", &[]).await
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id.
    pub async fn delete_user(&self, id: &str) -> Outcome<Value> {
        let path = format!("/users/{}", segment(id)?);
        self.gateway.send(Method::DELETE, &path, None).await
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    /// Headline analytics.
    pub async fn analytics_overview(&self) -> Outcome<Value> {
        self.get("/analytics/overview", &[]).await
    }

    /// Revenue analytics for one period.
    pub async fn analytics_revenue(&self, period: Period) -> Outcome<Value> {
        self.get("/analytics/revenue", &[("period", period.as_str().to_string())])
            .await
    }
}

/// Validate an id used as a single path segment.
fn segment(id: &str) -> Outcome<&str> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(ApiError::validation(format!("invalid id: {id:?}")));
    }
    Ok(id)
}
