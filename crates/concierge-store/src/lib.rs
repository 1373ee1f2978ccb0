//! Durable session storage for concierge.
//!
//! The session is persisted under two fixed keys, one holding the raw
//! credential and one holding the JSON-serialized subject. Both present means a
//! valid session; either absent means no session.
//!
//! # Example
//!
//! ```no_run
//! use concierge_core::{Session, UserRecord};
//! use concierge_store::{RocksSessionStore, SessionStore};
//!
//! let store = RocksSessionStore::open("/tmp/concierge-session").unwrap();
//! store.replace(&Session::new("token", UserRecord::default())).unwrap();
//! assert!(store.read().unwrap().is_some());
//!
//! store.clear().unwrap();
//! assert!(store.read().unwrap().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;

pub use error::{Result, StoreError};
pub use memory::MemorySessionStore;
pub use rocks::RocksSessionStore;

use concierge_core::Session;

/// Storage for the current session.
///
/// Implementations must treat credential and subject as one unit: `read`
/// returns either a whole session or nothing, including while a concurrent
/// `clear` is in progress.
pub trait SessionStore: Send + Sync {
    /// Load the current session, if a complete one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn read(&self) -> Result<Option<Session>>;

    /// Replace the stored session (credential and subject together).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn replace(&self, session: &Session) -> Result<()>;

    /// Remove the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn clear(&self) -> Result<()>;
}
