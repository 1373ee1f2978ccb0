//! Persisted key names.

/// Key holding the raw bearer credential.
pub const TOKEN: &str = "token";

/// Key holding the JSON-serialized subject record.
pub const USER: &str = "user";

/// Both keys, in write order.
#[must_use]
pub const fn all() -> [&'static str; 2] {
    [TOKEN, USER]
}
