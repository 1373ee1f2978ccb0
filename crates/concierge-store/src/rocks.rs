//! `RocksDB` session storage.
//!
//! This module provides the `RocksSessionStore` implementation of the
//! `SessionStore` trait.

use std::path::Path;

use chrono::{DateTime, Utc};
use concierge_core::{Session, UserRecord};
use parking_lot::RwLock;
use rocksdb::{Options, WriteBatch, DB};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::SessionStore;

/// RocksDB-backed session storage.
///
/// Both keys are written and removed in a single `WriteBatch`. The lock keeps
/// the two point reads in `read` from interleaving with a batch.
pub struct RocksSessionStore {
    db: DB,
    /// `issued_locally` of the session written by this process, if any.
    issued: RwLock<Option<DateTime<Utc>>>,
    opened_at: DateTime<Utc>,
}

impl RocksSessionStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db,
            issued: RwLock::new(None),
            opened_at: Utc::now(),
        })
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.db
            .get(key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Assemble a session from the raw key values, clamping partial state.
    fn assemble(
        token: Option<String>,
        user: Option<String>,
        issued_locally: DateTime<Utc>,
    ) -> Option<Session> {
        match (token, user) {
            (Some(credential), Some(user_json)) if !credential.is_empty() => {
                let subject = serde_json::from_str::<serde_json::Value>(&user_json)
                    .ok()
                    .and_then(UserRecord::from_value);
                if subject.is_none() {
                    tracing::warn!("Stored subject is not a JSON object, treating session as absent");
                }
                subject.map(|subject| Session {
                    credential,
                    subject,
                    issued_locally,
                })
            }
            (None, None) => None,
            (token, user) => {
                tracing::warn!(
                    has_token = token.is_some(),
                    has_user = user.is_some(),
                    "Partial session in storage, treating as absent"
                );
                None
            }
        }
    }
}

impl SessionStore for RocksSessionStore {
    fn read(&self) -> Result<Option<Session>> {
        let issued = self.issued.read();
        let token = self.get_string(keys::TOKEN)?;
        let user = self.get_string(keys::USER)?;

        Ok(Self::assemble(token, user, (*issued).unwrap_or(self.opened_at)))
    }

    fn replace(&self, session: &Session) -> Result<()> {
        let user_json = serde_json::to_string(&session.subject)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put(keys::TOKEN, session.credential.as_bytes());
        batch.put(keys::USER, user_json.as_bytes());

        let mut issued = self.issued.write();
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        *issued = Some(session.issued_locally);

        tracing::debug!("Persisted session");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut batch = WriteBatch::default();
        for key in keys::all() {
            batch.delete(key);
        }

        let mut issued = self.issued.write();
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        *issued = None;

        tracing::debug!("Cleared persisted session");
        Ok(())
    }
}
