//! # Image Uploads
//!
//! Uploaded images are forwarded to Cloudinary and only the resulting URL is kept.
//!
//! Signed uploads: every request carries a timestamp and a SHA-256 signature over the sorted request
//! parameters followed by the API secret.
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::CloudinaryConfig;

pub const UPLOAD_FOLDER: &str = "tiap-app";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the bytes and returns a publicly retrievable URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String, UploadError>;
}

pub struct CloudinaryStorage {
    client: Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadFailure>,
}

#[derive(Deserialize)]
struct UploadFailure {
    message: String,
}

impl CloudinaryStorage {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    hex::encode(Sha256::digest(format!("{joined}{api_secret}")))
}

#[async_trait]
impl ObjectStorage for CloudinaryStorage {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String, UploadError> {
        let params = [
            ("folder", UPLOAD_FOLDER.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = sign_params(&params, &self.config.api_secret);

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: UploadResponse = response.json().await?;

        match (body.secure_url, body.error) {
            (Some(url), _) if status.is_success() => {
                info!("Uploaded {filename} to {url}");
                Ok(url)
            }
            (_, Some(failure)) => {
                warn!("Cloudinary rejected {filename}: {}", failure.message);
                Err(UploadError::Rejected(failure.message))
            }
            _ => Err(UploadError::Rejected(format!("unexpected status {status}"))),
        }
    }
}
