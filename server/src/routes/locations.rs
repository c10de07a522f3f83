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
    vec![Populate::path("storedItems.sku", Collection::Skus)]
}

/// `skuId` looks up the locations storing that SKU and ignores every other parameter.
fn list_filter(mut params: BTreeMap<String, String>) -> Filter {
    match params.remove("skuId") {
        Some(sku) => Filter::new().equals("storedItems.sku", sku),
        None => Filter::from_params(params),
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let locations = find_many(&state, Collection::Locations, &list_filter(params), &plans()).await?;

    Ok(Json(locations))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        find_one(&state, Collection::Locations, &id, &plans()).await?,
    ))
}
