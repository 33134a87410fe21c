use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bson::oid::ObjectId;
use chrono::NaiveDate;
use eyre::Result;
use ledger::{process::Processor, Ledger};
use log::error;
use model::day::Day;
use serde::{Deserialize, Serialize};

/// HTTP trigger surface for the externally scheduled runs. Every route is
/// guarded by the shared-secret `X-Api-Key` header; this is machine-to-machine
/// auth, not a user session.
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Ledger>,
    processor: Arc<Processor>,
    api_key: Arc<str>,
    actor: ObjectId,
}

impl AppState {
    pub fn new(ledger: Ledger, api_key: String, actor: ObjectId) -> AppState {
        AppState {
            processor: Arc::new(Processor::new(ledger.clone())),
            ledger: Arc::new(ledger),
            api_key: api_key.into(),
            actor,
        }
    }
}

pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cron/generate-week", post(generate_week))
        .route("/cron/daily-operations", post(daily_operations))
        .route("/cron/auto-unfreeze", post(auto_unfreeze))
        .route("/cron/runs", get(runs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .with_state(state)
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    if provided != Some(state.api_key.as_ref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("Invalid or missing API key")),
        )
            .into_response();
    }
    next.run(request).await
}

async fn generate_week(State(state): State<AppState>) -> Response {
    let mut session = match state.ledger.db.start_session(state.actor).await {
        Ok(session) => session,
        Err(err) => return internal_error(err),
    };
    match state.processor.generation.run(&mut session).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn daily_operations(State(state): State<AppState>) -> Response {
    let mut session = match state.ledger.db.start_session(state.actor).await {
        Ok(session) => session,
        Err(err) => return internal_error(err),
    };
    match state.processor.daily.run(&mut session).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn auto_unfreeze(State(state): State<AppState>) -> Response {
    let mut session = match state.ledger.db.start_session(state.actor).await {
        Ok(session) => session,
        Err(err) => return internal_error(err),
    };
    match state.processor.freeze.run(&mut session).await {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => internal_error(err),
    }
}

#[derive(Debug, Deserialize)]
struct RunsRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn runs(State(state): State<AppState>, Query(range): Query<RunsRange>) -> Response {
    let mut session = match state.ledger.db.start_session(state.actor).await {
        Ok(session) => session,
        Err(err) => return internal_error(err),
    };
    let from = range.from.map(|date| Day::new(date).start());
    let to = range.to.map(|date| Day::new(date).end());
    match state.ledger.history.find_range(&mut session, from, to).await {
        Ok(runs) => (StatusCode::OK, Json(runs)).into_response(),
        Err(err) => internal_error(err),
    }
}

fn internal_error(err: eyre::Error) -> Response {
    error!("Request failed: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: format!("{}", err),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ErrorBody {
    fn new(message: &str) -> ErrorBody {
        ErrorBody {
            error: message.to_string(),
        }
    }
}
