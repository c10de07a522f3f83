use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    auth::{AdminEmployee, AuthEmployee, hash_password},
    documents::{Collection, redact},
    error::AppError,
    models::{is_strong_password, is_valid_email},
    query::Filter,
    state::AppState,
    utils::parse_object,
};

use super::{find_many, find_one};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let employees = find_many(
        &state,
        Collection::Employees,
        &Filter::from_params(params),
        &[],
    )
    .await?;

    Ok(Json(employees))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(find_one(&state, Collection::Employees, &id, &[]).await?))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    AdminEmployee(admin): AdminEmployee,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mut patch = parse_object(&body)?;

    if let Some(email) = patch.get("email") {
        let email = email
            .as_str()
            .filter(|email| is_valid_email(email))
            .ok_or_else(|| AppError::malformed("Please provide a valid email address."))?
            .to_lowercase();
        patch.insert("email".to_string(), Value::String(email));
    }

    if let Some(password) = patch.get("password") {
        let password = password
            .as_str()
            .filter(|password| is_strong_password(password))
            .ok_or_else(|| {
                AppError::malformed("Password is not strong enough, choose a stronger one.")
            })?;
        let hash = hash_password(password)?;
        patch.insert("password".to_string(), Value::String(hash));
    }

    let mut updated = state
        .documents
        .update_by_id(Collection::Employees, &id, patch)
        .await?
        .ok_or(AppError::NotFound)?;
    redact(Collection::Employees, &mut updated);

    info!("Employee {id} updated by {}", admin.id);

    Ok(Json(updated))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    AdminEmployee(admin): AdminEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state
        .documents
        .delete_by_id(Collection::Employees, &id)
        .await?
    {
        return Err(AppError::NotFound);
    }

    info!("Employee {id} deleted by {}", admin.id);

    Ok(Json(json!({ "message": "Employee deleted successfully" })))
}
