//! api-server — Local development HTTP API for the URL Shortener workspace.
//!
//! Exposes the same contract as the Lambda entrypoint:
//! - `POST /` with `{"url": "..."}` creates (or idempotently re-creates) a mapping.
//! - `GET /:code` redirects with `302 Found` and bumps the click counter.
//! - Any other method on those routes answers `405`.
//!
//! Storage: in-memory (default), SQLite (file) when the `sqlite` feature is
//! enabled, or DynamoDB when the `dynamo` feature is enabled.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # with Dynamo adapter enabled (requires env vars)
//! STORAGE_PROVIDER=dynamo TABLE_NAME=mappings \
//!   cargo run -p api-server --features dynamo
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryStore;
use domain::code::Sha256CodeDeriver;
use domain::service::MappingGateway;
use domain::{CoreError, Mapping, MappingStore, PutOutcome, ShortCode, SystemClock};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local store abstraction supporting memory, sqlite, or dynamo (feature-gated).
enum AnyStore {
    Memory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteStore),
    #[cfg(feature = "dynamo")]
    Dynamo(aws_dynamo::DynamoStore),
}

impl MappingStore for AnyStore {
    fn put_if_absent(&self, mapping: &Mapping) -> Result<PutOutcome, CoreError> {
        match self {
            AnyStore::Memory(s) => s.put_if_absent(mapping),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.put_if_absent(mapping),
            #[cfg(feature = "dynamo")]
            AnyStore::Dynamo(s) => s.put_if_absent(mapping),
        }
    }

    fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError> {
        match self {
            AnyStore::Memory(s) => s.get(code),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.get(code),
            #[cfg(feature = "dynamo")]
            AnyStore::Dynamo(s) => s.get(code),
        }
    }

    fn increment_counter(
        &self,
        code: &ShortCode,
        field: &str,
        delta: u64,
        default: u64,
    ) -> Result<(), CoreError> {
        match self {
            AnyStore::Memory(s) => s.increment_counter(code, field, delta, default),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.increment_counter(code, field, delta, default),
            #[cfg(feature = "dynamo")]
            AnyStore::Dynamo(s) => s.increment_counter(code, field, delta, default),
        }
    }
}

type Gateway = MappingGateway<AnyStore, Sha256CodeDeriver, SystemClock>;

#[derive(Clone)]
struct AppState {
    svc: Arc<Gateway>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let store = match build_store(&cfg) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "store init failed");
            std::process::exit(1);
        }
    };
    let state = AppState {
        svc: Arc::new(MappingGateway::new(
            store,
            Sha256CodeDeriver::new(cfg.code_prefix_bytes),
            SystemClock,
        )),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(%addr, storage = ?cfg.storage_provider, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            post(create_link)
                .get(missing_code)
                .fallback(method_not_allowed),
        )
        .route("/:code", get(resolve_code).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a store instance based on config and feature flags.
fn build_store(cfg: &config::Config) -> Result<AnyStore, CoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let store = match &cfg.db_path {
                Some(path) => sqlite_adapter::SqliteStore::new(path)?,
                None => sqlite_adapter::SqliteStore::from_env()?,
            };
            Ok(AnyStore::Sqlite(store))
        }
        #[cfg(feature = "dynamo")]
        config::StorageProvider::Dynamo => {
            let table = cfg
                .table_name
                .clone()
                .ok_or_else(|| CoreError::Storage("missing TABLE_NAME".into()))?;
            Ok(AnyStore::Dynamo(aws_dynamo::DynamoStore::new(table)?))
        }
        config::StorageProvider::Memory => Ok(AnyStore::Memory(InMemoryStore::new())),
        #[allow(unreachable_patterns)]
        ref other => {
            warn!(
                provider = ?other,
                db_path = ?cfg.db_path,
                table = ?cfg.table_name,
                "storage provider not compiled in; falling back to memory"
            );
            Ok(AnyStore::Memory(InMemoryStore::new()))
        }
    }
}

fn json_reply((status, body): (u16, serde_json::Value)) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

async fn create_link(State(state): State<AppState>, body: Bytes) -> Response {
    let url = match http_common::parse_create_body(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!(err = %e, "rejected create request");
            return json_reply(http_common::error_reply(&e));
        }
    };

    match state.svc.create_mapping(&url) {
        Ok(outcome) => json_reply((200, http_common::create_body(&outcome))),
        Err(e) => {
            error!(err = %e, "create failed");
            json_reply(http_common::error_reply(&e))
        }
    }
}

async fn resolve_code(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.svc.resolve(&code) {
        Ok(target) => (StatusCode::FOUND, [(header::LOCATION, target.location)]).into_response(),
        Err(e @ CoreError::Storage(_)) => {
            error!(code = %code, err = %e, "resolve error");
            json_reply(http_common::error_reply(&e))
        }
        Err(e) => {
            warn!(code = %code, err = %e, "resolve rejected");
            json_reply(http_common::error_reply(&e))
        }
    }
}

async fn missing_code() -> Response {
    json_reply(http_common::error_reply(&CoreError::MissingCode))
}

async fn method_not_allowed() -> Response {
    json_reply(http_common::method_not_allowed_reply())
}

async fn not_found() -> Response {
    json_reply(http_common::error_reply(&CoreError::NotFound))
}
