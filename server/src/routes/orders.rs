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
    let orders = find_many(&state, Collection::Orders, &Filter::from_params(params), &[]).await?;

    Ok(Json(orders))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(find_one(&state, Collection::Orders, &id, &[]).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{documents::Collection, routes::testing::Harness};

    #[tokio::test]
    async fn test_list_and_get() {
        let harness = Harness::new();
        harness
            .seed(Collection::Orders, json!({ "_id": "o1", "status": "open" }))
            .await;
        harness
            .seed(Collection::Orders, json!({ "_id": "o2", "status": "shipped" }))
            .await;
        let token = harness.token(false);

        let (_, body) = harness
            .send(Method::GET, "/orders?status=open", Some(&token), None)
            .await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["_id"], "o1");

        let (status, _) = harness
            .send(Method::GET, "/orders/o3", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
