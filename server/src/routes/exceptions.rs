//! Exception logs. Every new log is stamped with the next `exception` log number before it is stored.
use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    auth::{AdminEmployee, AuthEmployee},
    counter::LogCategory,
    documents::{Collection, ID_FIELD},
    error::AppError,
    populate::Populate,
    query::{Filter, parse_day},
    state::AppState,
    utils::parse_object,
};

use super::{find_many, find_one};

const LOG_NUMBER_FIELD: &str = "no";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

fn list_plans() -> Vec<Populate> {
    vec![
        Populate::path("order", Collection::Orders),
        Populate::path("sku", Collection::Skus),
        Populate::path("taskCollection", Collection::TaskCollections),
        Populate::path("task", Collection::Tasks)
            .with(Populate::path("location", Collection::Locations)),
        Populate::path("location", Collection::Locations),
        Populate::path("rootcause", Collection::RootCauses),
    ]
}

fn single_plans() -> Vec<Populate> {
    vec![
        Populate::path("order", Collection::Orders),
        Populate::path("sku", Collection::Skus),
        Populate::path("taskCollection", Collection::TaskCollections),
        Populate::path("task", Collection::Tasks),
        Populate::path("location", Collection::Locations),
        Populate::path("rootcause", Collection::RootCauses),
    ]
}

fn list_filter(mut params: BTreeMap<String, String>) -> Result<Filter, AppError> {
    let created_at = params.remove("createdAt");
    let mut filter = Filter::from_params(params);

    if let Some(created_at) = created_at {
        let day = parse_day(&created_at).ok_or_else(|| {
            AppError::malformed(format!("Invalid createdAt date: {created_at}"))
        })?;
        filter = filter.same_day("createdAt", day);
    }

    Ok(filter)
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filter = list_filter(params)?;
    let exceptions = find_many(&state, Collection::Exceptions, &filter, &list_plans()).await?;

    Ok(Json(exceptions))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    AdminEmployee(admin): AdminEmployee,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mut exception = parse_object(&body)?;
    exception.remove(ID_FIELD);
    exception
        .entry("createdBy")
        .or_insert_with(|| Value::String(admin.id.clone()));

    // A failed issuance aborts the create, nothing is stored without a log number.
    let log_number = state.issuer.issue(LogCategory::Exception).await?;
    exception.insert(
        LOG_NUMBER_FIELD.to_string(),
        Value::String(log_number.clone()),
    );

    state
        .documents
        .insert(Collection::Exceptions, exception)
        .await?;

    info!("Exception log {log_number} created by {}", admin.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New exception log created successfully.",
            "no": log_number,
        })),
    ))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exception = find_one(&state, Collection::Exceptions, &id, &single_plans()).await?;

    Ok(Json(exception))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    _: AdminEmployee,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mut patch = parse_object(&body)?;
    patch.remove(LOG_NUMBER_FIELD);

    let updated = state
        .documents
        .update_by_id(Collection::Exceptions, &id, patch)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(json!({
        "updatedExceptionLog": updated,
        "message": "Exception log updated successfully.",
    })))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    _: AdminEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state
        .documents
        .delete_by_id(Collection::Exceptions, &id)
        .await?
    {
        return Err(AppError::NotFound);
    }

    Ok(Json(json!({ "message": "Exception deleted successfully" })))
}
