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

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let plans = [
        Populate::path("order", Collection::Orders),
        Populate::path("employee", Collection::Employees),
    ];
    let collections = find_many(
        &state,
        Collection::TaskCollections,
        &Filter::from_params(params),
        &plans,
    )
    .await?;

    Ok(Json(collections))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let plans = [Populate::path("order", Collection::Orders)];

    Ok(Json(
        find_one(&state, Collection::TaskCollections, &id, &plans).await?,
    ))
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
            .seed(Collection::Orders, json!({ "_id": "o1", "customer": "ACME" }))
            .await;
        harness
            .seed(
                Collection::Employees,
                json!({ "_id": "e1", "name": "Ada", "password": "hash" }),
            )
            .await;
        harness
            .seed(
                Collection::TaskCollections,
                json!({ "_id": "tc1", "order": "o1", "employee": "e1" }),
            )
            .await;
        let token = harness.token(false);

        let (status, body) = harness
            .send(Method::GET, "/task-collections?order=o1", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["order"]["customer"], "ACME");
        assert_eq!(body[0]["employee"]["name"], "Ada");
        assert!(body[0]["employee"].get("password").is_none());

        let (status, body) = harness
            .send(Method::GET, "/task-collections/tc1", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["customer"], "ACME");
        assert_eq!(body["employee"], "e1");
    }
}
