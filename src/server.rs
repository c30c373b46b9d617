use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};

use crate::data::{Berth, Schedule, Ship, SolveStatus, Time};
use crate::error::PlanningFailure;
use crate::planner::{Planner, PlanningOptions};

pub const ADDRESS_VAR: &str = "BERTH_PLANNER_ADDR";
const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// Horizon used when a request does not name one.
pub const DEFAULT_HORIZON: Time = 150;

/// Body of a planning request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningInput {
    pub ships: Vec<Ship>,
    pub berths: Vec<Berth>,
    #[serde(default = "default_horizon")]
    pub horizon: Time,
    #[serde(default)]
    pub options: PlanningOptions,
}

fn default_horizon() -> Time {
    DEFAULT_HORIZON
}

pub struct ServerConfig {
    pub address: SocketAddr,
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self { address }
    }

    /// Reads the listen address from `BERTH_PLANNER_ADDR`, falling back to localhost:8080.
    pub fn from_env() -> Result<Self, AddrParseError> {
        let address = std::env::var(ADDRESS_VAR).unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
        Ok(Self::new(address.parse()?))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: Option<SolveStatus>,
    reason: String,
}

#[derive(Debug)]
struct ApiError {
    code: StatusCode,
    body: ErrorBody,
}

impl From<PlanningFailure> for ApiError {
    fn from(failure: PlanningFailure) -> Self {
        let code = match failure {
            PlanningFailure::Unresolved { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PlanningFailure::InternalConsistencyViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            code,
            body: ErrorBody {
                status: failure.status(),
                reason: failure.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code, Json(self.body)).into_response()
    }
}

async fn plan_handler(Json(input): Json<PlanningInput>) -> Result<Json<Schedule>, ApiError> {
    let PlanningInput {
        ships,
        berths,
        horizon,
        options,
    } = input;

    // the solver blocks; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        Planner::new()
            .with_options(options)
            .plan(&ships, &berths, horizon)
    })
    .await
    .map_err(|e| {
        error!("Planning task failed: {}", e);
        ApiError {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                status: None,
                reason: format!("planning task failed: {e}"),
            },
        }
    })?;

    Ok(Json(outcome?))
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/berths/plan", post(plan_handler))
        .route("/v1/health", get(health_handler))
}

pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(config.address).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[test]
    fn input_defaults_horizon_and_options() {
        let input: PlanningInput = serde_json::from_value(json!({
            "ships": [{"id": 1, "length": 100.0, "draft": 10.0, "processingDuration": 5, "shipClass": 1}],
            "berths": [{"id": 7, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1, 2]}]
        }))
        .unwrap();
        assert_eq!(input.horizon, DEFAULT_HORIZON);
        assert_eq!(input.options, PlanningOptions::default());
        assert_eq!(input.ships[0].processing_duration, 5);
        assert!(input.berths[0].supported_classes.contains(&2));
    }

    async fn post_plan(payload: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/berths/plan")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        let code = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (code, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn plans_a_feasible_instance() {
        let (code, body) = post_plan(json!({
            "ships": [{"id": 1, "length": 100.0, "draft": 10.0, "processingDuration": 5, "shipClass": 1}],
            "berths": [{"id": 3, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1]}],
            "horizon": 150
        }))
        .await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "OPTIMAL");
        let berthing = &body["berthings"]["1"];
        assert_eq!(berthing["berthId"], 3);
        let arrival = berthing["arrival"].as_u64().unwrap();
        assert_eq!(berthing["departure"].as_u64().unwrap(), arrival + 5);
    }

    #[tokio::test]
    async fn reports_infeasible_instances() {
        let (code, body) = post_plan(json!({
            "ships": [{"id": 1, "length": 100.0, "draft": 10.0, "processingDuration": 5, "shipClass": 2}],
            "berths": [{"id": 3, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1]}]
        }))
        .await;

        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "INFEASIBLE");
    }

    #[tokio::test]
    async fn reports_empty_instances_without_status() {
        let (code, body) = post_plan(json!({
            "ships": [],
            "berths": [{"id": 3, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1]}]
        }))
        .await;

        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["status"].is_null());
        assert!(body["reason"].as_str().unwrap().starts_with("Empty instance"));
    }

    #[tokio::test]
    async fn honours_the_utilization_policy() {
        let (code, body) = post_plan(json!({
            "ships": [{"id": 1, "length": 100.0, "draft": 10.0, "processingDuration": 5, "shipClass": 1}],
            "berths": [
                {"id": 3, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1]},
                {"id": 4, "lengthCapacity": 120.0, "draftCapacity": 12.0, "supportedClasses": [1]}
            ],
            "options": {"berthUtilization": "optional"}
        }))
        .await;

        assert_eq!(code, StatusCode::OK);
        assert!(body["berthings"]["1"].is_object());
    }

    #[tokio::test]
    async fn health_check_answers() {
        let request = Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn consistency_violations_map_to_server_errors() {
        let err = ApiError::from(PlanningFailure::InternalConsistencyViolation("x".into()));
        assert_eq!(err.code, StatusCode::INTERNAL_SERVER_ERROR);
        let err = ApiError::from(PlanningFailure::Unresolved {
            reason: "budget".into(),
        });
        assert_eq!(err.code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body.status, Some(SolveStatus::Unknown));
    }
}
