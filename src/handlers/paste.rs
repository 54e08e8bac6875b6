use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    Extension, Json,
};
use zeroize::Zeroizing;

use crate::{
    error::{AppError, Result},
    models::session::AuthUser,
    services::backend::NewPaste,
    state::AppState,
    validation::paste::validate_payload,
};

const TEXT_PLAIN: &str = "text/plain";
/// The only expiry an upload form can request, in days.
const UPLOAD_EXPIRY_DAYS: i64 = 30;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// The fields of an upload form.
#[derive(Default)]
struct UploadForm {
    content_type: Option<String>,
    burn: bool,
    data: Option<Vec<u8>>,
    file: Option<Vec<u8>>,
    expire: Option<String>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "content-type" => form.content_type = Some(field.text().await?),
                "bar" => form.burn = field.text().await? == "bar",
                "data" => form.data = Some(field.bytes().await?.to_vec()),
                "file" => form.file = Some(field.bytes().await?.to_vec()),
                "expire" => form.expire = Some(field.text().await?),
                other => tracing::debug!("Ignoring upload field {}", other),
            }
        }
        Ok(form)
    }

    /// Picks the payload and its content-type label.
    ///
    /// Text comes from `data`. Anything else must be an image in `file`,
    /// labelled by its sniffed type rather than the client's claim.
    fn into_payload(self) -> Result<(Vec<u8>, String)> {
        if self.content_type.as_deref() == Some(TEXT_PLAIN) {
            let data = self
                .data
                .ok_or_else(|| AppError::Validation("Missing data field".to_string()))?;
            return Ok((data, TEXT_PLAIN.to_string()));
        }

        let file = self
            .file
            .ok_or_else(|| AppError::Validation("Missing file field".to_string()))?;
        let content_type = sniff_image(&file)?;
        Ok((file, content_type))
    }
}

/// Returns the MIME type of an image, rejecting anything else.
fn sniff_image(bytes: &[u8]) -> Result<String> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(kind.mime_type().to_string())
        }
        _ => Err(AppError::Validation("Unsupported file type".to_string())),
    }
}

/// Handles paste uploads. Responds with the paste's URL.
pub async fn upload(
    State(state): State<AppState>,
    owner: Option<Extension<AuthUser>>,
    mut multipart: Multipart,
) -> Result<Response> {
    let form = UploadForm::read(&mut multipart).await?;
    let burn = form.burn;
    let durable = state.config.is_durable() && !burn;
    let requested_days = form.expire.as_deref().and_then(|days| days.trim().parse::<i64>().ok());
    let expire_at = (durable && requested_days == Some(UPLOAD_EXPIRY_DAYS))
        .then(|| chrono::Utc::now().timestamp() + UPLOAD_EXPIRY_DAYS * SECONDS_PER_DAY);

    let (data, content_type) = form.into_payload()?;
    let max_size = if durable {
        state.config.database_max_entry_size
    } else {
        state.config.max_entry_size
    };
    validate_payload(&data, max_size)?;

    let paste = NewPaste {
        data: Zeroizing::new(data),
        content_type,
        burn_after_reading: burn,
        expire_at,
    };
    let owner = owner.map(|Extension(user)| user);
    let id = state.backend.insert(paste, owner.as_ref()).await?;

    Ok((StatusCode::OK, format!("{}{}", state.config.url, id)).into_response())
}

/// Wraps a plaintext as a response body that is wiped once sent.
fn zeroizing_body(data: Zeroizing<Vec<u8>>) -> Body {
    Body::from(Bytes::from_owner(data))
}

/// Serves a paste. Burn-after-reading pastes are gone afterwards.
pub async fn fetch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let paste = state.backend.fetch(&id).await?;
    Ok((
        [(header::CONTENT_TYPE, paste.content_type)],
        zeroizing_body(paste.data),
    )
        .into_response())
}

/// Deletes a durable paste owned by the caller.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    state.backend.delete(&id, &user).await.map_err(|e| match e {
        // Don't reveal that the id exists under another owner.
        AppError::Unauthorized => AppError::NotFound,
        other => other,
    })?;
    Ok(StatusCode::OK.into_response())
}

/// Sets the expiry of a durable paste owned by the caller.
pub async fn set_expiry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, days)): Path<(String, i64)>,
) -> Result<Response> {
    state.backend.set_expiry(&id, &user, days).await?;
    Ok(StatusCode::OK.into_response())
}

/// Lists the caller's durable pastes.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let listing = state.backend.list(&user).await?;
    Ok(Json(listing).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn sniffing_accepts_images_only() {
        assert_eq!(sniff_image(PNG_HEADER).unwrap(), "image/png");
        assert!(sniff_image(b"%PDF-1.4 not an image").is_err());
        assert!(sniff_image(b"").is_err());
    }

    #[test]
    fn text_uploads_use_the_data_field() {
        let form = UploadForm {
            content_type: Some("text/plain".to_string()),
            data: Some(b"hello".to_vec()),
            file: Some(PNG_HEADER.to_vec()),
            ..Default::default()
        };
        let (data, content_type) = form.into_payload().unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(content_type, "text/plain");
    }

    #[test]
    fn image_uploads_ignore_the_claimed_type() {
        let form = UploadForm {
            content_type: Some("image/gif".to_string()),
            file: Some(PNG_HEADER.to_vec()),
            ..Default::default()
        };
        let (_, content_type) = form.into_payload().unwrap();
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn response_body_carries_the_plaintext() {
        use http_body_util::BodyExt;

        let body = zeroizing_body(Zeroizing::new(b"secret bytes".to_vec()));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"secret bytes");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let text = UploadForm {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        assert!(matches!(text.into_payload(), Err(AppError::Validation(_))));
        assert!(matches!(UploadForm::default().into_payload(), Err(AppError::Validation(_))));
    }
}
