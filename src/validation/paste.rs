use crate::error::{AppError, Result};

/// The longest credential hash accepted at registration and login.
pub const MAX_CREDENTIAL_LEN: usize = 100;
/// The longest expiry, in days, a client may set.
pub const MAX_EXPIRY_DAYS: i64 = 3650;

/// Validates a credential hash.
///
/// # Arguments
///
/// * `credential` - The opaque credential sent by the client.
///
/// # Returns
///
/// A `Result<()>` indicating whether the credential is acceptable.
pub fn validate_credential(credential: &str) -> Result<()> {
    if credential.is_empty() {
        return Err(AppError::Validation(
            "Credential cannot be empty".to_string(),
        ));
    }

    if credential.len() > MAX_CREDENTIAL_LEN {
        return Err(AppError::Validation(format!(
            "Credential must be at most {} bytes",
            MAX_CREDENTIAL_LEN
        )));
    }

    Ok(())
}

/// Validates a payload against an entry size limit.
pub fn validate_payload(payload: &[u8], max_size: usize) -> Result<()> {
    if payload.is_empty() {
        return Err(AppError::Validation("Paste cannot be empty".to_string()));
    }

    if payload.len() > max_size {
        return Err(AppError::PayloadTooLarge(payload.len()));
    }

    Ok(())
}

/// Validates an expiry given in days.
pub fn validate_expiry_days(days: i64) -> Result<()> {
    if !(0..=MAX_EXPIRY_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "Expiry must be between 0 and {} days",
            MAX_EXPIRY_DAYS
        )));
    }

    Ok(())
}
