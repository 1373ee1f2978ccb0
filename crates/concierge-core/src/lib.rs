//! Core types for the concierge admin session layer.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Session**: the local record of an authenticated identity
//! - **Series**: the canonical `{labels, values}` chart shape
//! - **Error types**: the request outcome taxonomy
//!
//! # Example
//!
//! ```
//! use concierge_core::{ApiError, ChartSeries, ErrorKind};
//!
//! let series = ChartSeries::new(vec!["Mon".into(), "Tue".into()], vec![5.0]);
//! assert_eq!(series.values(), &[5.0, 0.0]);
//!
//! let err = ApiError::auth_expired();
//! assert_eq!(err.kind, ErrorKind::AuthExpired);
//! assert_eq!(err.to_string(), "session expired");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod series;
pub mod session;

pub use error::{ApiError, ErrorKind, Outcome};
pub use series::ChartSeries;
pub use session::{Session, UserRecord};
