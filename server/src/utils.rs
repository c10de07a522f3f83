use axum::body::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    documents::Document,
    error::AppError::{self, MalformedPayload},
};

pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| MalformedPayload(format!("Malformed payload: {e}")))
}

pub fn parse_object(body: &Bytes) -> Result<Document, AppError> {
    match parse_json(body)? {
        Value::Object(document) => Ok(document),
        _ => Err(AppError::malformed("Payload must be a JSON object.")),
    }
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, AppError> {
    match serde_json::to_value(value).map_err(AppError::internal)? {
        Value::Object(document) => Ok(document),
        _ => Err(AppError::internal("value did not serialize to an object")),
    }
}
