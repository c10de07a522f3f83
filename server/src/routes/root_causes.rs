//! Root causes of exception logs. Titles are unique, reserved atomically in the document store before the
//! root cause itself is written.
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
use tracing::warn;

use crate::{
    auth::{AdminEmployee, AuthEmployee},
    documents::{Collection, Document, ID_FIELD, document_id, new_id},
    error::AppError,
    models::{ExceptionType, NewRootCause, TaskType},
    query::Filter,
    state::AppState,
    utils::{parse_json, parse_object, to_document},
};

use super::{find_many, find_one};

const TITLE_FIELD: &str = "title";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/root-causes", get(list_handler).post(create_handler))
        .route(
            "/root-causes/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

/// Fails unless `title` is free or already held by root cause `id`.
async fn reserve_title(state: &AppState, title: &str, id: &str) -> Result<(), AppError> {
    let taken = state
        .documents
        .find(Collection::RootCauses, &Filter::new().equals(TITLE_FIELD, title))
        .await?
        .iter()
        .any(|existing| document_id(existing) != Some(id));

    if taken
        || !state
            .documents
            .claim_unique(Collection::RootCauses, TITLE_FIELD, title, id)
            .await?
    {
        return Err(AppError::malformed("Root cause title already exists."));
    }

    Ok(())
}

async fn release_title(state: &AppState, title: &str) {
    if let Err(e) = state
        .documents
        .release_unique(Collection::RootCauses, TITLE_FIELD, title)
        .await
    {
        warn!("Root cause title {title} left reserved: {e}");
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let root_causes = find_many(
        &state,
        Collection::RootCauses,
        &Filter::from_params(params),
        &[],
    )
    .await?;

    Ok(Json(root_causes))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    AdminEmployee(admin): AdminEmployee,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let root_cause: NewRootCause = parse_json(&body)?;
    if root_cause.title.trim().is_empty() {
        return Err(AppError::malformed("Please fill all mandatory fields."));
    }

    let id = new_id();
    reserve_title(&state, &root_cause.title, &id).await?;

    let mut document = to_document(&root_cause)?;
    document.insert(ID_FIELD.to_string(), Value::String(id));
    document.insert("createdBy".to_string(), Value::String(admin.id));

    let created = match state
        .documents
        .insert(Collection::RootCauses, document)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            release_title(&state, &root_cause.title).await;
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "rootCause": created,
            "message": "New root cause created successfully.",
        })),
    ))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    _: AuthEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(find_one(&state, Collection::RootCauses, &id, &[]).await?))
}

fn title_of(document: &Document) -> Option<String> {
    document
        .get(TITLE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    _: AdminEmployee,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let patch = parse_object(&body)?;

    if let Some(task) = patch.get("task") {
        serde_json::from_value::<TaskType>(task.clone())
            .map_err(|_| AppError::malformed(format!("Invalid task type: {task}")))?;
    }
    if let Some(kind) = patch.get("type") {
        serde_json::from_value::<ExceptionType>(kind.clone())
            .map_err(|_| AppError::malformed(format!("Invalid exception type: {kind}")))?;
    }

    let previous = state
        .documents
        .find_by_id(Collection::RootCauses, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous_title = title_of(&previous);

    let new_title = match patch.get(TITLE_FIELD) {
        Some(title) => {
            let title = title
                .as_str()
                .filter(|title| !title.trim().is_empty())
                .ok_or_else(|| {
                    AppError::malformed("Root cause title must be a non-empty string.")
                })?;
            reserve_title(&state, title, &id).await?;
            Some(title.to_string())
        }
        None => None,
    };

    let renamed = new_title.filter(|title| previous_title.as_ref() != Some(title));

    let updated = match state
        .documents
        .update_by_id(Collection::RootCauses, &id, patch)
        .await
    {
        Ok(Some(updated)) => updated,
        failed => {
            if let Some(title) = &renamed {
                release_title(&state, title).await;
            }
            return Err(failed.err().map_or(AppError::NotFound, AppError::from));
        }
    };

    if let (Some(_), Some(previous)) = (&renamed, &previous_title) {
        release_title(&state, previous).await;
    }

    Ok(Json(json!({
        "updatedRootCause": updated,
        "message": "Root cause updated successfully.",
    })))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    _: AdminEmployee,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let existing = state
        .documents
        .find_by_id(Collection::RootCauses, &id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !state
        .documents
        .delete_by_id(Collection::RootCauses, &id)
        .await?
    {
        return Err(AppError::NotFound);
    }

    if let Some(title) = title_of(&existing) {
        release_title(&state, &title).await;
    }

    Ok(Json(json!({ "message": "Root cause deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    use crate::{documents::Collection, routes::testing::Harness};

    #[tokio::test]
    async fn test_create_and_list() {
        let harness = Harness::new();
        let token = harness.token(true);

        let (status, body) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(json!({ "task": "cycle-count", "type": "shortage", "title": "Miscount" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["rootCause"]["createdBy"], "e-admin");

        let (status, body) = harness
            .send(
                Method::GET,
                "/exceptions/root-causes?task=cycle-count",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["title"], "Miscount");
    }

    #[tokio::test]
    async fn test_rejects_unknown_type_and_duplicate_title() {
        let harness = Harness::new();
        let token = harness.token(true);
        harness
            .seed(
                Collection::RootCauses,
                json!({ "_id": "r1", "task": "picking", "type": "damage", "title": "Dropped" }),
            )
            .await;

        let (status, _) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(json!({ "task": "picking", "type": "theft", "title": "Gone" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(json!({ "task": "putaway", "type": "damage", "title": "Dropped" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "Root cause title already exists.");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let harness = Harness::new();
        let token = harness.token(true);
        harness
            .seed(
                Collection::RootCauses,
                json!({ "_id": "r1", "task": "picking", "type": "damage", "title": "Dropped" }),
            )
            .await;

        let (status, body) = harness
            .send(
                Method::PUT,
                "/exceptions/root-causes/r1",
                Some(&token),
                Some(json!({ "title": "Dropped", "type": "other" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updatedRootCause"]["type"], "other");

        let (status, _) = harness
            .send(
                Method::PUT,
                "/exceptions/root-causes/r1",
                Some(&token),
                Some(json!({ "task": "flying" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .send(Method::DELETE, "/exceptions/root-causes/r1", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(harness.stored(Collection::RootCauses).await.is_empty());
    }

    #[tokio::test]
    async fn test_root_causes_do_not_shadow_exception_ids() {
        let harness = Harness::new();
        harness
            .seed(Collection::Exceptions, json!({ "_id": "x1", "no": "EXC-000001" }))
            .await;

        let (status, body) = harness
            .send(Method::GET, "/exceptions/x1", Some(&harness.token(false)), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["no"], "EXC-000001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_keep_titles_unique() {
        let harness = Harness::new();
        let token = harness.token(true);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let request = Request::builder()
                    .method(Method::POST)
                    .uri("/exceptions/root-causes")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "task": "picking", "type": "damage", "title": "Dropped" })
                            .to_string(),
                    ))
                    .unwrap();
                tokio::spawn(harness.router.clone().oneshot(request))
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let status = handle.await.unwrap().unwrap().status();
            if status == StatusCode::CREATED {
                created += 1;
            } else {
                assert_eq!(status, StatusCode::BAD_REQUEST);
            }
        }

        assert_eq!(created, 1);
        assert_eq!(harness.stored(Collection::RootCauses).await.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_and_delete_free_the_title() {
        let harness = Harness::new();
        let token = harness.token(true);
        let create = |title: &str| json!({ "task": "picking", "type": "damage", "title": title });

        let (status, body) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(create("Dropped")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["rootCause"]["_id"].as_str().unwrap().to_string();

        let (status, _) = harness
            .send(
                Method::PUT,
                &format!("/exceptions/root-causes/{id}"),
                Some(&token),
                Some(json!({ "title": "Fell" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(create("Dropped")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let other = body["rootCause"]["_id"].as_str().unwrap().to_string();

        let (status, _) = harness
            .send(
                Method::PUT,
                &format!("/exceptions/root-causes/{other}"),
                Some(&token),
                Some(json!({ "title": "Fell" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .send(
                Method::DELETE,
                &format!("/exceptions/root-causes/{id}"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = harness
            .send(
                Method::POST,
                "/exceptions/root-causes",
                Some(&token),
                Some(create("Fell")),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}
