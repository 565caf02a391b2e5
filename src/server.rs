use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::domain::{ServerConfig, UDError};
use crate::record::{ValidationError, placeholder_avatar};

pub const USERS_ROUTE: &str = "/api/users";

/// A user record as sent over the wire. `status` is lower-cased but not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub status: String,
    pub avatar: String,
}

struct AppState {
    fixture: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to read user data: {0}")]
    Read(#[from] std::io::Error),
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Error: {self}");
        let body = json!({
            "error": "Invalid data format",
            "message": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// null, false, 0, NaN and "" all count as missing
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_id(value: &Value) -> Result<i64, ValidationError> {
    let id = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    id.ok_or_else(|| ValidationError::InvalidId(stringify(value)))
}

fn validate_user(user: &Value) -> Result<UserPayload, ValidationError> {
    for field in ["id", "name", "email", "mobile", "status"] {
        if !truthy(user.get(field)) {
            return Err(ValidationError::MissingField(field));
        }
    }
    let id = coerce_id(&user["id"])?;
    let avatar = if truthy(user.get("avatar")) {
        stringify(&user["avatar"])
    } else {
        placeholder_avatar(id)
    };
    Ok(UserPayload {
        id,
        name: stringify(&user["name"]),
        email: stringify(&user["email"]),
        mobile: stringify(&user["mobile"]),
        status: stringify(&user["status"]).to_lowercase(),
        avatar,
    })
}

/// Checks the fixture payload and shapes it for transport. Fails on the first bad record.
pub fn validate_payload(payload: &Value) -> Result<Vec<UserPayload>, ValidationError> {
    let Value::Array(users) = payload else {
        return Err(ValidationError::NotAnArray);
    };
    users.iter().map(validate_user).collect()
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserPayload>>, ApiError> {
    let data = tokio::fs::read_to_string(&state.fixture).await?;
    let payload: Value = serde_json::from_str(&data)?;
    let users = validate_payload(&payload)?;
    debug!("Serving {} users from {}", users.len(), state.fixture.display());
    Ok(Json(users))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, UDError> {
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| UDError::Config(format!("invalid origin {o:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

pub fn router(config: &ServerConfig) -> Result<Router, UDError> {
    let state = Arc::new(AppState {
        fixture: config.fixture.clone(),
    });
    Ok(Router::new()
        .route(USERS_ROUTE, get(list_users))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}

pub async fn serve(config: ServerConfig) -> Result<(), UDError> {
    let app = router(&config)?;
    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    info!("Server running on http://{addr}");
    info!("API endpoint: http://{addr}{USERS_ROUTE}");
    info!("Serving fixture {}", config.fixture.display());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values_count_as_missing() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(false))));
        assert!(truthy(Some(&json!("0"))));
        assert!(truthy(Some(&json!(7))));
    }

    #[test]
    fn payload_is_shaped_for_transport() {
        let payload = json!([
            {"id": "5", "name": "X", "email": "x@y.com", "mobile": 123, "status": "INACTIVE"},
            {"id": 6, "name": "Y", "email": "y@y.com", "mobile": "456", "status": "Active", "avatar": "a.png"}
        ]);
        let users = validate_payload(&payload).unwrap();
        assert_eq!(
            users[0],
            UserPayload {
                id: 5,
                name: "X".into(),
                email: "x@y.com".into(),
                mobile: "123".into(),
                status: "inactive".into(),
                avatar: "https://i.pravatar.cc/150?img=5".into(),
            }
        );
        assert_eq!(users[1].avatar, "a.png");
        assert_eq!(users[1].status, "active");
    }

    #[test]
    fn status_is_lowercased_but_not_checked() {
        let payload = json!([{"id": 1, "name": "X", "email": "e", "mobile": "m", "status": "Pending"}]);
        assert_eq!(validate_payload(&payload).unwrap()[0].status, "pending");
    }

    #[test]
    fn non_array_is_rejected() {
        assert_eq!(
            validate_payload(&json!({"id": 1})).unwrap_err(),
            ValidationError::NotAnArray
        );
    }

    #[test]
    fn first_missing_field_fails_the_batch() {
        let payload = json!([
            {"id": 1, "name": "X", "email": "e", "mobile": "m", "status": "active"},
            {"id": 2, "name": "", "email": "e", "mobile": "m", "status": "active"}
        ]);
        assert_eq!(
            validate_payload(&payload).unwrap_err(),
            ValidationError::MissingField("name")
        );
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        let payload = json!([{"id": "abc", "name": "X", "email": "e", "mobile": "m", "status": "active"}]);
        assert_eq!(
            validate_payload(&payload).unwrap_err(),
            ValidationError::InvalidId("abc".into())
        );
    }

    #[test]
    fn bad_origin_is_a_config_error() {
        let config = ServerConfig::default().with_allowed_origins(vec!["bad\norigin".into()]);
        assert!(matches!(router(&config), Err(UDError::Config(_))));
    }
}
