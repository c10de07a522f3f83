use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;

use crate::{
    documents::{Collection, Document, redact},
    error::AppError,
    populate::{Populate, populate, populate_all},
    query::Filter,
    state::AppState,
};

mod auth;
mod employees;
mod exceptions;
mod locations;
mod orders;
mod root_causes;
mod skus;
mod task_collections;
mod tasks;
mod upload;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .nest("/auth", auth::router())
        .nest("/employees", employees::router())
        .nest(
            "/exceptions",
            exceptions::router().merge(root_causes::router()),
        )
        .nest("/skus", skus::router())
        .nest("/locations", locations::router())
        .nest("/tasks", tasks::router())
        .nest("/task-collections", task_collections::router())
        .nest("/orders", orders::router())
        .nest("/upload", upload::router())
        .fallback(not_found_handler)
        .with_state(state)
}

async fn index_handler() -> impl IntoResponse {
    Json(json!({ "message": "Server received a request." }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "errorMessage": "There is no point you can access by this URL." })),
    )
}

async fn find_many(
    state: &AppState,
    collection: Collection,
    filter: &Filter,
    plans: &[Populate],
) -> Result<Vec<Document>, AppError> {
    let mut documents = state.documents.find(collection, filter).await?;
    populate_all(state.documents.as_ref(), &mut documents, plans).await?;

    for document in documents.iter_mut() {
        redact(collection, document);
    }

    Ok(documents)
}

async fn find_one(
    state: &AppState,
    collection: Collection,
    id: &str,
    plans: &[Populate],
) -> Result<Document, AppError> {
    let mut document = state
        .documents
        .find_by_id(collection, id)
        .await?
        .ok_or(AppError::NotFound)?;

    populate(state.documents.as_ref(), &mut document, plans).await?;
    redact(collection, &mut document);

    Ok(document)
}
