use std::sync::Arc;

use axum::{
    Json,
    Router,
    extract::{Multipart, State},
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use tracing::warn;

use crate::{auth::AuthEmployee, error::AppError, state::AppState};

const IMAGE_FIELD: &str = "image";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(upload_handler))
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let not_uploaded = || AppError::malformed("File is not uploaded successfully.");

    let mut image = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| not_uploaded())? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or(IMAGE_FIELD).to_string();
        let bytes = field.bytes().await.map_err(|_| not_uploaded())?;
        image = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = image
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(not_uploaded)?;

    let url = state
        .storage
        .upload(bytes.to_vec(), &filename)
        .await
        .map_err(|e| {
            warn!("Image not uploaded: {e}");
            AppError::internal(e)
        })?;

    Ok(Json(json!({ "url": url })))
}
