use serde::Serialize;
use tokio_postgres::Row;
use zeroize::Zeroizing;

use crate::crypto::envelope::EnvelopeKeys;

/// An entry held by the ephemeral cache.
#[derive(Clone)]
pub struct Entry {
    /// The public identifier.
    pub id: String,
    /// The content-type label.
    pub content_type: String,
    /// Whether the entry is destroyed by its first read.
    pub burn_after_reading: bool,
    /// The DEK and nonce the payload was sealed with.
    pub keys: EnvelopeKeys,
    /// The AES-GCM output.
    pub ciphertext: Vec<u8>,
}

/// A metadata row of the `data` table. The ciphertext lives in `filename`.
#[derive(Clone)]
pub struct DurableRecord {
    /// The ID of the user who owns the entry.
    pub user_id: i64,
    /// The public identifier.
    pub public_id: String,
    /// The internal filename under the data directory.
    pub filename: String,
    /// The DEK and nonce the payload was sealed with.
    pub keys: EnvelopeKeys,
    /// The content-type label.
    pub content_type: String,
    /// Expiry in epoch seconds, `None` for no expiry.
    pub expire_at: Option<i64>,
}

impl DurableRecord {
    /// Maps a `data` row.
    pub fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            user_id: row.try_get("uid")?,
            public_id: row.try_get("pid")?,
            filename: row.try_get("fname")?,
            keys: EnvelopeKeys::from_parts(row.try_get("key")?, row.try_get("nonce")?),
            content_type: row.try_get("ct")?,
            expire_at: row.try_get("expire")?,
        })
    }
}

/// A decrypted paste ready to be served.
pub struct Paste {
    /// The content-type label.
    pub content_type: String,
    /// The plaintext.
    pub data: Zeroizing<Vec<u8>>,
}

/// One line of a user's paste listing.
#[derive(Debug, Clone, Serialize)]
pub struct PasteListing {
    /// The public identifier.
    pub id: String,
    /// Expiry in epoch seconds, if any.
    pub expire: Option<i64>,
    /// The content-type label.
    pub content_type: String,
}

impl From<&Row> for PasteListing {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("pid"),
            expire: row.get("expire"),
            content_type: row.get("ct"),
        }
    }
}
