use tokio_postgres::Row;
use zeroize::Zeroizing;

use crate::crypto::envelope::WrappingKey;

/// Represents a user in the system.
#[derive(Clone)]
pub struct User {
    /// The unique identifier for the user.
    pub id: i64,
    /// The opaque credential hash the user logs in with.
    pub hash: String,
    /// The user's wrapping key.
    pub kek: WrappingKey,
}

impl User {
    /// Maps a `users` row.
    pub fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            hash: row.try_get("hash")?,
            kek: Zeroizing::new(row.try_get("kek")?),
        })
    }
}
