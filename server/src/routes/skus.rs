use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};

use crate::{
    auth::AuthEmployee, documents::Collection, error::AppError, query::Filter, state::AppState,
};

use super::{find_many, find_one};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler))
        .route("/:id", get(get_handler))
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let skus = find_many(&state, Collection::Skus, &Filter::from_params(params), &[]).await?;

    Ok(Json(skus))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(find_one(&state, Collection::Skus, &id, &[]).await?))
}
