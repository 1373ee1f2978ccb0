//! Session-aware gateway over the transport.
//!
//! The gateway is the only writer of the session store. It injects the bearer
//! credential into resource calls, turns authorization failures into a single
//! expiry notification per episode, and guards every session write against
//! responses that arrive after the session they belong to was cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use concierge_core::error::INVALID_RESPONSE_FORMAT;
use concierge_core::{ApiError, ErrorKind, Outcome, Session, UserRecord};
use concierge_store::SessionStore;
use parking_lot::Mutex;
use reqwest::multipart::Form;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::bus::{Event, NotificationBus};
use crate::config::ClientConfig;
use crate::transport::{Auth, Transport};

const ME_PATH: &str = "/auth/me";
const LOGOUT_PATH: &str = "/auth/logout";
const UPDATE_DETAILS_PATH: &str = "/auth/updatedetails";
const UPDATE_PASSWORD_PATH: &str = "/auth/updatepassword";

/// Authenticated access to the REST API.
///
/// Cloning is cheap; clones share the session state, the expiry latch and the
/// bus.
#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Transport,
    store: Arc<dyn SessionStore>,
    bus: Arc<NotificationBus>,
    /// Set for the duration of one expiry episode.
    handling_expiry: AtomicBool,
    /// Held while a running episode is joined or finished.
    episode: Mutex<()>,
    /// Bumped on every clear; session writes commit only under the generation
    /// their request was issued in.
    generation: Mutex<u64>,
}

impl AuthGateway {
    /// Create a gateway from configuration.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        let transport = Transport::new(&config, Arc::clone(&store));
        Self::with_transport(config, transport, store, bus)
    }

    /// Create a gateway over an existing transport.
    ///
    /// The transport should read from the same `store`.
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        transport: Transport,
        store: Arc<dyn SessionStore>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store,
                bus,
                handling_expiry: AtomicBool::new(false),
                episode: Mutex::new(()),
                generation: Mutex::new(0),
            }),
        }
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The bus session events are published on.
    #[must_use]
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.inner.bus
    }

    /// The current session, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.read_session()
    }

    /// Returns `true` if a session is held locally.
    ///
    /// This does not prove the credential is still accepted; see
    /// [`validate_session`](Self::validate_session).
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Returns `true` while an expiry episode is in progress.
    #[must_use]
    pub fn is_handling_expiry(&self) -> bool {
        self.inner.handling_expiry.load(Ordering::Acquire)
    }

    // =========================================================================
    // Resource calls
    // =========================================================================

    /// Send an authenticated JSON request.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Outcome<Value> {
        self.send_query(method, path, &[], body).await
    }

    /// Send an authenticated JSON request with query parameters.
    pub async fn send_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Outcome<Value> {
        let credential = self.inner.transport.credential_for(&Auth::Session);
        let outcome = self
            .inner
            .transport
            .send(method, path, query, body, bearer(credential.as_deref()))
            .await;
        self.intercept(credential.as_deref(), outcome)
    }

    /// Send an authenticated multipart upload.
    pub async fn upload(&self, method: Method, path: &str, form: Form) -> Outcome<Value> {
        let credential = self.inner.transport.credential_for(&Auth::Session);
        let outcome = self
            .inner
            .transport
            .upload(method, path, form, bearer(credential.as_deref()))
            .await;
        self.intercept(credential.as_deref(), outcome)
    }

    /// Send with an explicit credential, through the expiry interceptor.
    async fn send_as(
        &self,
        credential: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Outcome<Value> {
        let outcome = self
            .inner
            .transport
            .send(method, path, &[], body, Auth::Bearer(credential.to_string()))
            .await;
        self.intercept(Some(credential), outcome)
    }

    fn intercept(&self, credential: Option<&str>, outcome: Outcome<Value>) -> Outcome<Value> {
        if let Err(err) = &outcome {
            if err.is_auth_expired() {
                self.begin_expiry(credential);
            }
        }
        outcome
    }

    // =========================================================================
    // Expiry protocol
    // =========================================================================

    /// React to an authorization failure for a request sent with `credential`.
    ///
    /// The first failure of an episode clears the session and schedules the
    /// notification. Later failures for the cleared credential are absorbed. A
    /// failure for a credential stored during the episode clears that session
    /// too, and the pending notification covers it. A failure for a credential
    /// that is no longer current is ignored.
    fn begin_expiry(&self, credential: Option<&str>) {
        loop {
            let current = self.inner.read_session().map(|s| s.credential);
            if current.as_deref() != credential {
                tracing::debug!("Ignoring authorization failure for a superseded credential");
                return;
            }

            if self
                .inner
                .handling_expiry
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.start_episode();
                return;
            }

            let _episode = self.inner.episode.lock();
            if !self.inner.handling_expiry.load(Ordering::Acquire) {
                // The episode finished between the two checks.
                continue;
            }
            match credential {
                Some(credential) => {
                    tracing::warn!("Credential rejected during expiry episode, clearing session");
                    self.inner.clear_session_if(credential);
                }
                None => {
                    tracing::debug!("Authorization failure absorbed by the running expiry episode");
                }
            }
            return;
        }
    }

    fn start_episode(&self) {
        tracing::warn!("Session expired, clearing local session");
        self.inner.clear_session();

        let inner = Arc::clone(&self.inner);
        let delay = inner.config.expiry_notice_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let notify = {
                let _episode = inner.episode.lock();
                let notify = inner.read_session().is_none();
                inner.handling_expiry.store(false, Ordering::Release);
                notify
            };
            if notify {
                inner.bus.publish(&Event::SessionExpired);
            } else {
                tracing::info!("New session established during expiry delay, notification dropped");
            }
        });
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Log in and store the resulting session.
    ///
    /// On failure any existing session is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty input, the server's message for rejected
    /// credentials, or `Transport` when the server is unreachable.
    pub async fn login(&self, identifier: &str, secret: &str) -> Outcome<Session> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(ApiError::validation("Please provide an email and password"));
        }

        let issued_at = self.inner.generation();
        let body = json!({ "email": identifier, "password": secret });
        let response = self
            .inner
            .transport
            .send(
                Method::POST,
                &self.inner.config.login_path,
                &[],
                Some(&body),
                Auth::Anonymous,
            )
            .await
            .inspect_err(|err| tracing::info!(error = %err, "Login rejected"))?;

        let (credential, subject) = parse_login_response(&response)?;
        let session = Session::new(credential, subject);

        if !self.inner.commit(issued_at, &session)? {
            tracing::info!("Session was cleared while login was in flight, discarding result");
            return Err(ApiError::new(
                ErrorKind::Server,
                "session was cleared before login completed",
            ));
        }

        tracing::info!(subject_id = ?session.subject.id(), "Logged in");
        self.inner.bus.publish(&Event::SignedIn {
            subject_id: session.subject.id().map(ToString::to_string),
        });
        Ok(session)
    }

    /// Log out locally and invalidate the credential remotely.
    ///
    /// The local session is always cleared first. The remote call runs in the
    /// background and its result is discarded. The returned handle can be
    /// awaited to let the remote call finish before shutdown.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let credential = self.current_session().map(|s| s.credential);
        self.inner.clear_session();
        tracing::info!("Logged out");
        self.inner.bus.publish(&Event::SignedOut);

        let credential = credential?;
        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let outcome = inner
                .transport
                .send(Method::POST, LOGOUT_PATH, &[], None, Auth::Bearer(credential))
                .await;
            if let Err(err) = outcome {
                tracing::debug!(error = %err, "Remote logout failed, ignoring");
            }
        }))
    }

    /// Check the stored credential against the server.
    ///
    /// On success the subject is replaced with the server's record. Any
    /// failure clears the session. Returns the validated session, or `None`.
    pub async fn validate_session(&self) -> Option<Session> {
        let session = self.current_session()?;
        let issued_at = self.inner.generation();

        match self.fetch_profile(&session.credential).await {
            Ok(subject) => {
                match self
                    .inner
                    .commit_subject(issued_at, &session.credential, subject)
                {
                    Ok(Some(updated)) => {
                        tracing::debug!("Session validated");
                        Some(updated)
                    }
                    Ok(None) => {
                        tracing::debug!("Session changed during validation, result discarded");
                        None
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to store validated session");
                        None
                    }
                }
            }
            Err(err) => {
                tracing::info!(error = %err, "Session validation failed, clearing session");
                self.inner.clear_session_if(&session.credential);
                None
            }
        }
    }

    /// Re-fetch the current user's profile and store it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no session exists, otherwise the request's
    /// own failure. Failures do not modify the session.
    pub async fn refresh_profile(&self) -> Outcome<UserRecord> {
        let session = self.require_session()?;
        let issued_at = self.inner.generation();

        let subject = self.fetch_profile(&session.credential).await?;
        self.inner
            .commit_subject(issued_at, &session.credential, subject.clone())?;
        Ok(subject)
    }

    /// Update the current user's details and store the returned record.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no session exists or `details` is not an
    /// object, otherwise the request's own failure.
    pub async fn update_details(&self, details: &Value) -> Outcome<UserRecord> {
        let session = self.require_session()?;
        if !details.is_object() {
            return Err(ApiError::validation("details must be an object"));
        }
        let issued_at = self.inner.generation();

        let response = self
            .send_as(&session.credential, Method::PUT, UPDATE_DETAILS_PATH, Some(details))
            .await?;
        let subject = extract_user(&response)
            .ok_or_else(|| ApiError::new(ErrorKind::Server, INVALID_RESPONSE_FORMAT))?;

        self.inner
            .commit_subject(issued_at, &session.credential, subject.clone())?;
        Ok(subject)
    }

    /// Change the current user's password.
    ///
    /// If the server issues a new credential it replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when no session exists or either value is empty or
    /// both are equal, otherwise the request's own failure.
    pub async fn change_secret(&self, current: &str, new: &str) -> Outcome<()> {
        let session = self.require_session()?;
        if current.is_empty() || new.is_empty() {
            return Err(ApiError::validation(
                "Please provide the current and the new password",
            ));
        }
        if current == new {
            return Err(ApiError::validation(
                "New password must differ from the current password",
            ));
        }
        let issued_at = self.inner.generation();

        let body = json!({ "currentPassword": current, "newPassword": new });
        let response = self
            .send_as(&session.credential, Method::PUT, UPDATE_PASSWORD_PATH, Some(&body))
            .await?;

        if let Some(token) = response.get("token").and_then(Value::as_str) {
            if !token.is_empty() {
                self.inner
                    .commit_credential(issued_at, &session.credential, token)?;
                tracing::info!("Credential rotated after password change");
            }
        }
        Ok(())
    }

    async fn fetch_profile(&self, credential: &str) -> Outcome<UserRecord> {
        let response = self.send_as(credential, Method::GET, ME_PATH, None).await?;
        extract_user(&response).ok_or_else(|| ApiError::new(ErrorKind::Server, INVALID_RESPONSE_FORMAT))
    }

    fn require_session(&self) -> Outcome<Session> {
        self.current_session()
            .ok_or_else(|| ApiError::validation("not signed in"))
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("transport", &self.inner.transport)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn read_session(&self) -> Option<Session> {
        match self.store.read() {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read session");
                None
            }
        }
    }

    fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    fn clear_session(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        if let Err(e) = self.store.clear() {
            tracing::error!(error = %e, "Failed to clear session");
        }
    }

    /// Clear the session only if it still holds `credential`.
    fn clear_session_if(&self, credential: &str) {
        let mut generation = self.generation.lock();
        if self
            .read_session()
            .is_some_and(|s| s.credential == credential)
        {
            *generation += 1;
            if let Err(e) = self.store.clear() {
                tracing::error!(error = %e, "Failed to clear session");
            }
        }
    }

    /// Store `session` unless a clear happened since `issued_at`.
    fn commit(&self, issued_at: u64, session: &Session) -> Outcome<bool> {
        let generation = self.generation.lock();
        if *generation != issued_at {
            return Ok(false);
        }
        self.store.replace(session)?;
        Ok(true)
    }

    /// Replace the subject of the session holding `credential`.
    fn commit_subject(
        &self,
        issued_at: u64,
        credential: &str,
        subject: UserRecord,
    ) -> Outcome<Option<Session>> {
        let generation = self.generation.lock();
        if *generation != issued_at {
            return Ok(None);
        }
        match self.store.read()? {
            Some(current) if current.credential == credential => {
                let updated = current.with_subject(subject);
                self.store.replace(&updated)?;
                Ok(Some(updated))
            }
            _ => Ok(None),
        }
    }

    /// Swap the credential of the session holding `credential`.
    fn commit_credential(&self, issued_at: u64, credential: &str, replacement: &str) -> Outcome<()> {
        let generation = self.generation.lock();
        if *generation != issued_at {
            return Ok(());
        }
        if let Some(current) = self.store.read()? {
            if current.credential == credential {
                let updated = Session {
                    credential: replacement.to_string(),
                    ..current
                };
                self.store.replace(&updated)?;
            }
        }
        Ok(())
    }
}

fn bearer(credential: Option<&str>) -> Auth {
    credential.map_or(Auth::Anonymous, |c| Auth::Bearer(c.to_string()))
}

/// Pull the user record out of a profile response.
///
/// Accepts `{ "data": {...} }`, `{ "user": {...} }` or a bare object.
fn extract_user(response: &Value) -> Option<UserRecord> {
    ["user", "data"]
        .iter()
        .find_map(|key| response.get(*key).filter(|v| v.is_object()))
        .or_else(|| response.is_object().then_some(response))
        .cloned()
        .and_then(UserRecord::from_value)
}

/// Pull the credential and user out of a login response.
fn parse_login_response(response: &Value) -> Outcome<(String, UserRecord)> {
    let data = response.get("data");
    let token = response
        .get("token")
        .or_else(|| data.and_then(|d| d.get("token")))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    let user = response
        .get("user")
        .or_else(|| data.and_then(|d| d.get("user")))
        .or(data)
        .cloned()
        .and_then(UserRecord::from_value);

    match (token, user) {
        (Some(token), Some(user)) => Ok((token.to_string(), user)),
        _ => Err(ApiError::new(ErrorKind::Server, INVALID_RESPONSE_FORMAT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use concierge_store::MemorySessionStore;
    use parking_lot::Mutex as PlMutex;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::bus::EventKind;

    struct Harness {
        gateway: AuthGateway,
        store: Arc<MemorySessionStore>,
        events: Arc<PlMutex<Vec<Event>>>,
    }

    fn harness(server: &MockServer, session: Option<Session>) -> Harness {
        let store = Arc::new(session.map_or_else(MemorySessionStore::new, MemorySessionStore::with_session));
        let bus = Arc::new(NotificationBus::new());
        let events = Arc::new(PlMutex::new(Vec::new()));
        for kind in [EventKind::SessionExpired, EventKind::SignedIn, EventKind::SignedOut] {
            let events = Arc::clone(&events);
            bus.subscribe(kind, move |event| events.lock().push(event.clone()));
        }

        let config = ClientConfig {
            base_url: server.uri(),
            expiry_notice_delay_ms: 50,
            ..ClientConfig::default()
        };
        let dyn_store: Arc<dyn SessionStore> = store.clone();
        let gateway = AuthGateway::new(config, dyn_store, bus);
        Harness {
            gateway,
            store,
            events,
        }
    }

    fn ada() -> UserRecord {
        UserRecord::from_value(json!({"_id": "u1", "name": "Ada", "role": "admin"})).unwrap()
    }

    fn ada_session() -> Session {
        Session::new("tok-1", ada())
    }

    fn expired_count(events: &PlMutex<Vec<Event>>) -> usize {
        events
            .lock()
            .iter()
            .filter(|e| **e == Event::SessionExpired)
            .count()
    }

    #[test]
    fn login_response_shapes() {
        let (token, user) =
            parse_login_response(&json!({"success": true, "token": "t", "user": {"name": "A"}}))
                .unwrap();
        assert_eq!(token, "t");
        assert_eq!(user.name(), Some("A"));

        let (token, user) =
            parse_login_response(&json!({"data": {"token": "t2", "user": {"name": "B"}}})).unwrap();
        assert_eq!(token, "t2");
        assert_eq!(user.name(), Some("B"));

        let (_, user) = parse_login_response(&json!({"token": "t3", "data": {"name": "C"}})).unwrap();
        assert_eq!(user.name(), Some("C"));

        assert!(parse_login_response(&json!({"token": "t"})).is_err());
        assert!(parse_login_response(&json!({"token": "", "user": {}})).is_err());
    }

    #[test]
    fn profile_response_shapes() {
        assert_eq!(
            extract_user(&json!({"success": true, "data": {"name": "A"}}))
                .unwrap()
                .name(),
            Some("A")
        );
        assert_eq!(
            extract_user(&json!({"user": {"name": "B"}})).unwrap().name(),
            Some("B")
        );
        assert_eq!(extract_user(&json!({"name": "C"})).unwrap().name(), Some("C"));
        assert!(extract_user(&json!([1, 2])).is_none());
    }

    #[tokio::test]
    async fn login_stores_session_and_publishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "token": "tok-new",
                "user": {"_id": "u1", "name": "Ada"}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, None);
        let session = h.gateway.login(" ada@example.com ", "pw").await.unwrap();

        assert_eq!(session.credential, "tok-new");
        let stored = h.store.read().unwrap().unwrap();
        assert_eq!(stored.credential, "tok-new");
        assert_eq!(stored.subject.name(), Some("Ada"));
        assert_eq!(
            *h.events.lock(),
            vec![Event::SignedIn {
                subject_id: Some("u1".to_string())
            }]
        );
    }

    #[tokio::test]
    async fn login_failure_keeps_existing_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(h.store.read().unwrap().unwrap().credential, "tok-1");
    }

    #[tokio::test]
    async fn login_validates_before_dispatch() {
        let server = MockServer::start().await;
        let h = harness(&server, None);

        let err = h.gateway.login("  ", "pw").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = h.gateway.login("ada@example.com", "").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_does_not_send_stored_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-2", "user": {"name": "Ada"}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        h.gateway.login("ada@example.com", "pw").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_notifies_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "token invalid"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.send(Method::GET, "/bookings", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::AuthExpired);
        assert_eq!(err.message, "session expired");
        assert!(h.store.read().unwrap().is_none());
        assert_eq!(expired_count(&h.events), 0, "notification must wait for the delay");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(expired_count(&h.events), 1);
        assert!(!h.gateway.is_handling_expiry());
    }

    #[tokio::test]
    async fn concurrent_unauthorized_calls_notify_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(20)))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let calls = (0..8).map(|i| {
            let gateway = h.gateway.clone();
            async move {
                gateway
                    .send(Method::GET, &format!("/analytics/{i}"), None)
                    .await
            }
        });
        let outcomes = futures::future::join_all(calls).await;

        assert!(outcomes.iter().all(|o| matches!(o, Err(e) if e.is_auth_expired())));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(expired_count(&h.events), 1);
    }

    #[tokio::test]
    async fn stale_unauthorized_after_episode_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(250)))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let slow = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.send(Method::GET, "/slow", None).await })
        };
        h.gateway.send(Method::GET, "/fast", None).await.unwrap_err();

        slow.await.unwrap().unwrap_err();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(expired_count(&h.events), 1);
    }

    #[tokio::test]
    async fn login_during_delay_suppresses_notification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-fresh", "user": {"name": "Ada"}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        h.gateway.send(Method::GET, "/bookings", None).await.unwrap_err();
        h.gateway.login("ada@example.com", "pw").await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(expired_count(&h.events), 0);
        assert_eq!(h.store.read().unwrap().unwrap().credential, "tok-fresh");
    }

    #[tokio::test]
    async fn rejected_session_from_login_during_delay_is_cleared() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "tok-fresh", "user": {"name": "Ada"}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        h.gateway.send(Method::GET, "/bookings", None).await.unwrap_err();
        h.gateway.login("ada@example.com", "pw").await.unwrap();

        let err = h.gateway.send(Method::GET, "/bookings", None).await.unwrap_err();
        assert!(err.is_auth_expired());
        assert!(h.store.read().unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(h.store.read().unwrap().is_none());
        assert_eq!(expired_count(&h.events), 1);
        assert!(!h.gateway.is_handling_expiry());
    }

    #[tokio::test]
    async fn login_rejected_with_unauthorized_shows_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "Invalid credentials");
        assert_eq!(h.store.read().unwrap().unwrap().credential, "tok-1");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(expired_count(&h.events), 0);
        assert!(!h.gateway.is_handling_expiry());
    }

    #[tokio::test]
    async fn logout_clears_even_when_remote_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let remote = h.gateway.logout();

        assert!(h.store.read().unwrap().is_none());
        assert_eq!(*h.events.lock(), vec![Event::SignedOut]);
        remote.unwrap().await.unwrap();
        // A failed remote logout never starts an expiry episode.
        assert!(!h.gateway.is_handling_expiry());
    }

    #[tokio::test]
    async fn logout_without_session_skips_remote_call() {
        let server = MockServer::start().await;
        let h = harness(&server, None);

        assert!(h.gateway.logout().is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn validate_session_replaces_subject_wholesale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"_id": "u1", "name": "Ada Lovelace"}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let session = h.gateway.validate_session().await.unwrap();

        assert_eq!(session.subject.name(), Some("Ada Lovelace"));
        // The stale `role` field is not merged into the fresh record.
        assert_eq!(session.subject.role(), None);
        assert_eq!(h.store.read().unwrap().unwrap(), session);
    }

    #[tokio::test]
    async fn validate_session_clears_on_any_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        assert!(h.gateway.validate_session().await.is_none());
        assert!(h.store.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn validate_session_without_session_is_offline() {
        let server = MockServer::start().await;
        let h = harness(&server, None);

        assert!(h.gateway.validate_session().await.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn response_after_logout_does_not_resurrect_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"name": "Ada"}}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let validation = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.validate_session().await })
        };
        let refresh = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.refresh_profile().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.gateway.logout();

        assert!(validation.await.unwrap().is_none());
        assert!(refresh.await.unwrap().is_ok());
        assert!(h.store.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn login_response_after_logout_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/admin/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "late", "user": {"name": "Ada"}}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let h = harness(&server, None);
        let login = {
            let gateway = h.gateway.clone();
            tokio::spawn(async move { gateway.login("ada@example.com", "pw").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.gateway.logout();

        let err = login.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "session was cleared before login completed");
        assert!(h.store.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_profile_requires_session() {
        let server = MockServer::start().await;
        let h = harness(&server, None);

        let err = h.gateway.refresh_profile().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn refresh_profile_failure_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.refresh_profile().await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "Service Unavailable");
        let stored = h.store.read().unwrap().unwrap();
        assert_eq!(stored.credential, "tok-1");
        assert_eq!(stored.subject, ada());
    }

    #[tokio::test]
    async fn update_details_replaces_subject() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/updatedetails"))
            .and(body_json(json!({"name": "Ada L."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"_id": "u1", "name": "Ada L."}
            })))
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let user = h
            .gateway
            .update_details(&json!({"name": "Ada L."}))
            .await
            .unwrap();

        assert_eq!(user.name(), Some("Ada L."));
        assert_eq!(h.store.read().unwrap().unwrap().subject, user);
    }

    #[tokio::test]
    async fn change_secret_validates_before_dispatch() {
        let server = MockServer::start().await;
        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.change_secret("same", "same").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = h.gateway.change_secret("", "new").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn change_secret_rotates_credential() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/updatepassword"))
            .and(body_json(json!({"currentPassword": "old", "newPassword": "new"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "token": "tok-2"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        h.gateway.change_secret("old", "new").await.unwrap();

        let stored = h.store.read().unwrap().unwrap();
        assert_eq!(stored.credential, "tok-2");
        assert_eq!(stored.subject, ada());
    }

    #[tokio::test]
    async fn change_secret_server_error_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/updatepassword"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Password too short"})),
            )
            .mount(&server)
            .await;

        let h = harness(&server, Some(ada_session()));
        let err = h.gateway.change_secret("old", "new").await.unwrap_err();

        assert_eq!(err.message, "Password too short");
        assert_eq!(h.store.read().unwrap().unwrap().credential, "tok-1");
    }
}
