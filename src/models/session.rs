use crate::crypto::envelope::WrappingKey;

/// An authenticated login.
///
/// Carries a copy of the user's wrapping key so that requests do not need a
/// database round-trip. `last_active` is epoch seconds and slides forward
/// on every ping.
#[derive(Clone)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    /// The user's wrapping key.
    pub wrapping_key: WrappingKey,
    /// The timestamp of the last login or ping.
    pub last_active: i64,
}

/// The identity a request was authenticated as.
#[derive(Clone)]
pub struct AuthUser {
    /// The ID of the user.
    pub user_id: i64,
    /// The user's wrapping key.
    pub wrapping_key: WrappingKey,
}
