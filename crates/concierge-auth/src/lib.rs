//! Authenticated transport and session gateway for concierge.
//!
//! This crate owns everything between the UI and the network:
//!
//! - [`Transport`]: issues requests and classifies every outcome as a value
//! - [`AuthGateway`]: the only writer of the session; login, logout,
//!   validation, and the one-shot expiry protocol
//! - [`NotificationBus`]: synchronous publish/subscribe for session events
//! - [`AdminApi`]: typed helpers for the admin endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  UI / Aggregator │────▶│   AuthGateway    │────▶│  NotificationBus │
//! └──────────────────┘     └────────┬─────────┘     └──────────────────┘
//!                                   │
//!                    ┌──────────────┼──────────────┐
//!           ┌────────▼─────────┐          ┌────────▼─────────┐
//!           │    Transport     │─────────▶│   SessionStore   │
//!           │    (reqwest)     │  bearer  │   (read only)    │
//!           └────────┬─────────┘          └──────────────────┘
//!                    │ HTTPS
//!           ┌────────▼─────────┐
//!           │     REST API     │
//!           └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use concierge_auth::{AuthGateway, ClientConfig, EventKind, NotificationBus};
//! use concierge_store::MemorySessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Arc::new(NotificationBus::new());
//! bus.subscribe(EventKind::SessionExpired, |_| println!("please log in again"));
//!
//! let gateway = AuthGateway::new(
//!     ClientConfig::default(),
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::clone(&bus),
//! );
//!
//! let session = gateway.login("admin@example.com", "secret").await?;
//! println!("Signed in as {:?}", session.subject.name());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod bus;
pub mod config;
pub mod gateway;
pub mod transport;

pub use api::{AdminApi, BookingQuery, BookingStatus, Period};
pub use bus::{Event, EventKind, NotificationBus, SubscriptionId};
pub use config::{ClientConfig, ConfigError};
pub use gateway::AuthGateway;
pub use transport::{Auth, Transport};
