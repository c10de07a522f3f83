use std::sync::Arc;

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    auth::{AuthEmployee, hash_password, verify_password},
    documents::{Collection, document_id},
    error::AppError,
    models::{LoginRequest, SignupRequest},
    query::Filter,
    state::AppState,
    utils::{parse_json, to_document},
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_handler))
        .route("/signup", post(signup_handler))
        .route("/login", post(login_handler))
        .route("/verify", get(verify_handler))
}

async fn health_handler() -> impl IntoResponse {
    "all is good."
}

async fn signup_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let mut employee = parse_json::<SignupRequest>(&body)?.validate()?;

    let existing = state
        .documents
        .find(
            Collection::Employees,
            &Filter::new().equals("email", employee.email.as_str()),
        )
        .await?;
    if !existing.is_empty() {
        info!("Signup rejected, {} already registered", employee.email);
        return Err(AppError::malformed(
            "Email already exist! Use an another address.",
        ));
    }

    employee.password = hash_password(&employee.password)?;
    state
        .documents
        .insert(Collection::Employees, to_document(&employee)?)
        .await?;

    info!("New employee signed up: {}", employee.name);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "New user signed up!" })),
    ))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let LoginRequest { email, password } = parse_json(&body)?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::malformed("Please provide email and password."));
    };

    let rejected = || AppError::unauthorized("Unable to authenticate the employee.");

    let employee = state
        .documents
        .find(
            Collection::Employees,
            &Filter::new().equals("email", email.trim().to_lowercase()),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(rejected)?;

    let text = |field: &str| employee.get(field).and_then(Value::as_str).unwrap_or_default();

    if !verify_password(&password, text("password")) {
        return Err(rejected());
    }

    let id = document_id(&employee).ok_or_else(rejected)?;
    let is_admin = employee
        .get("isAdmin")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let claims = state
        .tokens
        .claims(id, text("name"), text("email"), is_admin);
    let token = state.tokens.sign(&claims).map_err(AppError::internal)?;

    info!("Employee {id} logged in");

    Ok(Json(json!({ "authToken": token })))
}

async fn verify_handler(AuthEmployee(claims): AuthEmployee) -> impl IntoResponse {
    Json(claims)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{documents::Collection, routes::testing::Harness};

    fn signup_body() -> serde_json::Value {
        json!({
            "name": "Ada",
            "department": "Outbound",
            "title": "Picker",
            "email": "ada@wms.io",
            "password": "Secret123",
            "isAdmin": true
        })
    }

    #[tokio::test]
    async fn test_signup_login_verify() {
        let harness = Harness::new();

        let (status, _) = harness
            .send(Method::POST, "/auth/signup", None, Some(signup_body()))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let stored = harness.stored(Collection::Employees).await;
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0]["password"], "Secret123");

        let (status, body) = harness
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "ada@wms.io", "password": "Secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["authToken"].as_str().unwrap().to_string();

        let (status, body) = harness
            .send(Method::GET, "/auth/verify", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ada");
        assert_eq!(body["isAdmin"], true);
        assert_eq!(body["_id"], stored[0]["_id"]);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let harness = Harness::new();
        harness
            .send(Method::POST, "/auth/signup", None, Some(signup_body()))
            .await;

        let (status, body) = harness
            .send(Method::POST, "/auth/signup", None, Some(signup_body()))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["errorMessage"],
            "Email already exist! Use an another address."
        );
    }

    #[tokio::test]
    async fn test_signup_requires_fields() {
        let harness = Harness::new();

        let (status, body) = harness
            .send(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": "ada@wms.io", "password": "Secret123" })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "Please fill all mandatory fields.");
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let harness = Harness::new();
        harness
            .send(Method::POST, "/auth/signup", None, Some(signup_body()))
            .await;

        let (status, _) = harness
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "ada@wms.io", "password": "Secret124" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = harness
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "nobody@wms.io", "password": "Secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
