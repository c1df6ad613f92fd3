use crate::db::{Database, MirroredDb, SupabaseDb};
use crate::files;
use crate::models::{self, SubmissionKind, SubmissionPayload};
use crate::ratelimit::{Decision, RateLimiter};
use crate::sheets::{GoogleSheets, NoopSheets, SheetMirror};
use crate::storage::{MirroredStore, ObjectStore, SupabaseStorage};
use crate::validate;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const DEFAULT_PORT: u16 = 8787;
// A 5 MiB proof inflates to ~6.7 MiB of base64 plus the rest of the form.
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: MirroredDb,
    pub store: MirroredStore,
    pub sheets: Arc<dyn SheetMirror>,
    pub limiter: Arc<RateLimiter>,
}

pub async fn run_server() -> Result<()> {
    let primary_db: Arc<dyn Database> = Arc::new(SupabaseDb::from_env()?);
    let secondary_db: Option<Arc<dyn Database>> = match SupabaseDb::secondary_from_env() {
        Some(db) => {
            info!("Secondary database mirror enabled");
            Some(Arc::new(db))
        }
        None => None,
    };

    let primary_store: Arc<dyn ObjectStore> = Arc::new(SupabaseStorage::from_env()?);
    let secondary_store: Option<Arc<dyn ObjectStore>> =
        SupabaseStorage::secondary_from_env().map(|s| Arc::new(s) as Arc<dyn ObjectStore>);

    let sheets: Arc<dyn SheetMirror> = match GoogleSheets::from_env() {
        Some(sheets) => {
            info!("Spreadsheet mirror enabled");
            Arc::new(sheets)
        }
        None => {
            info!("Spreadsheet mirror disabled (credentials not configured)");
            Arc::new(NoopSheets)
        }
    };

    let state = AppState {
        db: MirroredDb::new(primary_db, secondary_db),
        store: MirroredStore::new(primary_store, secondary_store),
        sheets,
        limiter: Arc::new(RateLimiter::new()),
    };

    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Same wildcard-origin policy the forms rely on; the layer also answers
    // the OPTIONS preflight before the handler runs.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/submit", post(handle_submission))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// One handler for both submission variants, branching on the payload's
/// `type` tag. Check order: rate limit, JSON parse, honeypot, field
/// validation, optional file, primary persist, best-effort mirrors.
async fn handle_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let ip = extract_ip(&headers);

    if let Decision::Reject { retry_after_secs } = state.limiter.check(&ip).await {
        warn!("Rate limit exceeded for {}", ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many submissions. Please try again later.",
                "retryAfter": retry_after_secs,
            })),
        );
    }

    let payload: SubmissionPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!("Rejecting request: invalid JSON body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request body" })),
            );
        }
    };

    let kind = SubmissionKind::from_payload(&payload);

    // Bots fill the hidden field. Answer exactly like a success so automated
    // abuse gets no signal, and create nothing.
    if validate::is_honeypot(&payload) {
        info!("Honeypot triggered from {}, returning fake success", ip);
        return success_response(kind);
    }

    if let Err(message) = validate::validate(&payload, kind) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })));
    }

    // Upload must succeed before any row references the object name.
    let mut proof_name: Option<String> = None;
    if let Some(encoded) = payload
        .payment_proof_base64
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        let proof = match files::process_proof(
            encoded,
            payload.payment_proof_filename.as_deref(),
            payload.payment_proof_type.as_deref(),
        ) {
            Ok(proof) => proof,
            Err(message) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })));
            }
        };
        if let Err(e) = state
            .store
            .store(&proof.name, &proof.bytes, &proof.content_type)
            .await
        {
            error!("Payment proof upload failed: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to upload payment proof. Please try again." })),
            );
        }
        proof_name = Some(proof.name);
    }

    let row = models::record_row(kind, &payload, proof_name.as_deref());
    if let Err(e) = state.db.persist(kind.table(), &row).await {
        error!("Database insert failed: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to submit. Please try again." })),
        );
    }

    let sheet_row = models::sheet_row(kind, &payload, &Utc::now().to_rfc3339());
    if let Err(e) = state.sheets.append_row(kind.sheet_range(), sheet_row).await {
        warn!("Sheet append failed (ignored): {:#}", e);
    }

    success_response(kind)
}

fn success_response(kind: SubmissionKind) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": kind.success_message() })),
    )
}

fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
