use base64::{Engine as _, engine::general_purpose};
use crate::crypto::aes::random_bytes;
use crate::error::Result;

/// Random bytes behind a public id or an internal filename.
const ID_SIZE: usize = 12;
/// The size of the session token in bytes.
const SESSION_TOKEN_SIZE: usize = 32;

fn is_extension_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')
}

/// Returns the file extension a public id carries for `content_type`.
///
/// The subtype is used as-is only when it stays URL-safe; anything else
/// becomes `bin`.
pub fn extension_for(content_type: &str) -> &str {
    if content_type == "text/plain" {
        return "txt";
    }
    match content_type.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() && subtype.chars().all(is_extension_char) => {
            subtype
        }
        _ => "bin",
    }
}

/// Generates a new public id: 24 hex characters and an extension.
pub fn generate_public_id(content_type: &str) -> Result<String> {
    let id = hex::encode(random_bytes(ID_SIZE)?);
    Ok(format!("{}.{}", id, extension_for(content_type)))
}

/// Generates the on-disk name of a durable entry, unrelated to its public id.
pub fn generate_filename() -> Result<String> {
    Ok(hex::encode(random_bytes(ID_SIZE)?))
}

/// Generates a new session token.
///
/// # Returns
///
/// A URL-safe base64-encoded session token.
pub fn generate_session_token() -> Result<String> {
    let token = random_bytes(SESSION_TOKEN_SIZE)?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(token))
}
