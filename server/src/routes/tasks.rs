use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};

use crate::{
    auth::AuthEmployee, documents::Collection, error::AppError, populate::Populate, query::Filter,
    state::AppState,
};

use super::{find_many, find_one};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler))
        .route("/:id", get(get_handler))
}

fn plans() -> Vec<Populate> {
    vec![
        Populate::path("location", Collection::Locations)
            .with(Populate::path("storedItems.sku", Collection::Skus)),
        Populate::path("taskCollection", Collection::TaskCollections)
            .with(Populate::path("order", Collection::Orders))
            .with(Populate::path("employee", Collection::Employees)),
        Populate::path("sku", Collection::Skus),
    ]
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = find_many(&state, Collection::Tasks, &Filter::from_params(params), &plans()).await?;

    Ok(Json(tasks))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(find_one(&state, Collection::Tasks, &id, &plans()).await?))
}
