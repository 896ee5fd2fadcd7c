//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network construction and short-circuit evaluation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use crate::{fault::FaultTarget, solver::FaultKind};

#[cfg(feature = "rest-api")]
pub use rest::{router, ApiState};

#[cfg(feature = "rest-api")]
mod rest {
    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::Arc;

    use crate::{
        builder::BuildOutcome,
        diagnostics::Diagnostics,
        errors::SimulationError,
        fault::{FaultEvaluator, FaultReport},
        model::NetworkSummary,
    };

    use super::{FaultKind, FaultRequest};

    pub struct ApiState {
        pub outcome: BuildOutcome,
        pub evaluator: FaultEvaluator,
    }

    pub fn router(state: ApiState) -> Router {
        Router::new()
            .route("/api/network/summary", get(summary))
            .route("/api/network/diagnostics", get(diagnostics))
            .route("/api/fault/evaluate", post(evaluate))
            .with_state(Arc::new(state))
    }

    async fn summary(State(state): State<Arc<ApiState>>) -> Json<NetworkSummary> {
        Json(state.outcome.network.summary())
    }

    async fn diagnostics(State(state): State<Arc<ApiState>>) -> Json<Diagnostics> {
        Json(state.outcome.diagnostics.clone())
    }

    async fn evaluate(
        State(state): State<Arc<ApiState>>,
        Json(payload): Json<FaultRequest>,
    ) -> Result<Json<FaultReport>, (StatusCode, Json<SimulationError>)> {
        let kind = payload.kind.unwrap_or(FaultKind::SinglePhaseToGround);
        state
            .evaluator
            .evaluate_kind(&state.outcome.network, &payload.target, kind)
            .map(Json)
            .map_err(|err| (map_err(&err), Json(err)))
    }

    fn map_err(err: &SimulationError) -> StatusCode {
        match err {
            SimulationError::TargetNotFound | SimulationError::TargetNotInNetwork { .. } => {
                StatusCode::NOT_FOUND
            }
            SimulationError::NoTargetSelected => StatusCode::BAD_REQUEST,
            SimulationError::NoResult { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FaultRequest {
    pub target: FaultTarget,
    #[serde(default)]
    pub kind: Option<FaultKind>,
}
