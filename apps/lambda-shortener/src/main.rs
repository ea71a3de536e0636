//! lambda-shortener — AWS Lambda entrypoint for creating and resolving short codes.
//!
//! Purpose
//! - Handle API Gateway HTTP API (v2) events.
//! - `POST` with a JSON body `{"url": "..."}` creates (or idempotently re-creates)
//!   the mapping and returns `{short_code, target_url}`.
//! - `GET /{code}` resolves the code, bumps its click counter, and returns
//!   `302 Found` with a `Location` header.
//! - Any other method gets `405`.
//!
//! Notes
//! - This crate depends only on the `domain` gateway, the `aws-dynamo` store,
//!   and `http-common` for response shapes.
//! - The DynamoDB table is read from `TABLE_NAME`.
//! - It initializes minimal `tracing` logging compatible with Lambda CloudWatch.

use aws_dynamo::DynamoStore;
use domain::code::Sha256CodeDeriver;
use domain::service::MappingGateway;
use domain::{Clock, CodeDeriver, MappingStore, SystemClock};
use http_common::lambda::{body_bytes, redirect, reply};
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Gateway = MappingGateway<DynamoStore, Sha256CodeDeriver, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    // Build store from env; if it fails, crash early to surface misconfiguration.
    let store = DynamoStore::from_env().map_err(|e| format!("dynamo init error: {e}"))?;
    info!(table = %store.table(), "dynamo store ready");
    let svc: Arc<Gateway> = Arc::new(MappingGateway::new(
        store,
        Sha256CodeDeriver::default(),
        SystemClock,
    ));

    let handler = service_fn(move |req: Request| {
        let svc = Arc::clone(&svc);
        async move {
            match handle_request(&svc, req).await {
                Ok(r) => Ok(r),
                Err(e) => {
                    error!(err = %e, "unhandled error");
                    reply(http_common::server_error_reply(&e.to_string()))
                }
            }
        }
    });
    run(handler).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
        .init();
}

async fn handle_request<S, D, C>(
    svc: &MappingGateway<S, D, C>,
    req: Request,
) -> Result<Response<Body>, Error>
where
    S: MappingStore,
    D: CodeDeriver,
    C: Clock,
{
    match req.method().as_str() {
        "POST" => create(svc, &req),
        "GET" => resolve(svc, &req),
        other => {
            warn!(method = %other, path = %req.uri().path(), "method not allowed");
            reply(http_common::method_not_allowed_reply())
        }
    }
}

fn create<S, D, C>(svc: &MappingGateway<S, D, C>, req: &Request) -> Result<Response<Body>, Error>
where
    S: MappingStore,
    D: CodeDeriver,
    C: Clock,
{
    let url = match http_common::parse_create_body(body_bytes(req.body())) {
        Ok(u) => u,
        Err(e) => {
            warn!(err = %e, "rejected create request");
            return reply(http_common::error_reply(&e));
        }
    };

    match svc.create_mapping(&url) {
        Ok(outcome) => reply((200, http_common::create_body(&outcome))),
        Err(e) => {
            error!(err = %e, "create failed");
            reply(http_common::error_reply(&e))
        }
    }
}

fn resolve<S, D, C>(svc: &MappingGateway<S, D, C>, req: &Request) -> Result<Response<Body>, Error>
where
    S: MappingStore,
    D: CodeDeriver,
    C: Clock,
{
    let params = req.path_parameters();
    let code = params
        .first("code")
        .or_else(|| http_common::code_from_path(req.uri().path()))
        .unwrap_or("");

    match svc.resolve(code) {
        Ok(target) => redirect(target.location),
        Err(e @ domain::CoreError::Storage(_)) => {
            error!(code = %code, err = %e, "resolve error");
            reply(http_common::error_reply(&e))
        }
        Err(e) => {
            warn!(code = %code, err = %e, "resolve rejected");
            reply(http_common::error_reply(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::adapters::memory_repo::InMemoryStore;
    use domain::{CoreError, Mapping, PutOutcome, ShortCode};
    use lambda_http::http;

    type TestGateway = MappingGateway<InMemoryStore, Sha256CodeDeriver, SystemClock>;

    fn gateway() -> TestGateway {
        MappingGateway::new(InMemoryStore::new(), Sha256CodeDeriver::default(), SystemClock)
    }

    fn request(method: &str, path: &str, body: &str) -> Request {
        let body = if body.is_empty() {
            Body::Empty
        } else {
            Body::Text(body.to_string())
        };
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(body)
            .unwrap()
    }

    fn json_body(resp: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(body_bytes(resp.body())).unwrap()
    }

    fn content_type(resp: &Response<Body>) -> &str {
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[tokio::test]
    async fn create_then_redirect() {
        let svc = gateway();

        let resp = handle_request(&svc, request("POST", "/", r#"{"url":"https://example.com"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(content_type(&resp), "application/json");
        let body = json_body(&resp);
        assert_eq!(body["short_code"], "EAaArVRs");
        assert_eq!(body["target_url"], "https://example.com");

        let resp = handle_request(&svc, request("GET", "/dev/EAaArVRs", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.headers().get("location").unwrap(), "https://example.com");
        assert!(body_bytes(resp.body()).is_empty());

        let code = ShortCode::new("EAaArVRs").unwrap();
        assert_eq!(svc.get(&code).unwrap().unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_success() {
        let svc = gateway();
        let req = || request("POST", "/", r#"{"url":"https://same.example"}"#);
        let first = handle_request(&svc, req()).await.unwrap();
        let second = handle_request(&svc, req()).await.unwrap();
        assert_eq!(first.status(), 200);
        assert_eq!(second.status(), 200);
        assert_eq!(json_body(&first), json_body(&second));
        assert_eq!(svc.store().len().unwrap(), 1);
    }

    #[tokio::test]
    async fn create_without_url_is_bad_request() {
        let svc = gateway();
        for body in ["{}", "", r#"{"url":5}"#, "{not json"] {
            let resp = handle_request(&svc, request("POST", "/", body)).await.unwrap();
            assert_eq!(resp.status(), 400, "body {body:?}");
            assert_eq!(content_type(&resp), "application/json");
            assert_eq!(
                json_body(&resp),
                serde_json::json!({"error": "Missing or invalid 'url'."})
            );
        }
        assert!(svc.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn resolve_unknown_is_not_found() {
        let svc = gateway();
        let resp = handle_request(&svc, request("GET", "/zzzzzz", "")).await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(json_body(&resp), serde_json::json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn resolve_without_code_is_bad_request() {
        let svc = gateway();
        let resp = handle_request(&svc, request("GET", "/", "")).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(
            json_body(&resp),
            serde_json::json!({"error": "Missing short code."})
        );
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let svc = gateway();
        for method in ["PUT", "DELETE", "PATCH", "OPTIONS"] {
            let resp = handle_request(&svc, request(method, "/abc", "")).await.unwrap();
            assert_eq!(resp.status(), 405);
            assert_eq!(content_type(&resp), "application/json");
            assert_eq!(
                json_body(&resp),
                serde_json::json!({"error": "Method not allowed"})
            );
        }
    }

    struct DownStore;
    impl MappingStore for DownStore {
        fn put_if_absent(&self, _: &Mapping) -> Result<PutOutcome, CoreError> {
            Err(CoreError::Storage("dynamo error: timeout".into()))
        }
        fn get(&self, _: &ShortCode) -> Result<Option<Mapping>, CoreError> {
            Err(CoreError::Storage("dynamo error: timeout".into()))
        }
        fn increment_counter(&self, _: &ShortCode, _: &str, _: u64, _: u64) -> Result<(), CoreError> {
            Err(CoreError::Storage("dynamo error: timeout".into()))
        }
    }

    #[tokio::test]
    async fn storage_failures_are_server_errors() {
        let svc = MappingGateway::new(DownStore, Sha256CodeDeriver::default(), SystemClock);

        let resp = handle_request(&svc, request("POST", "/", r#"{"url":"https://e"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(
            json_body(&resp),
            serde_json::json!({"error": "Storage error", "detail": "dynamo error: timeout"})
        );

        let resp = handle_request(&svc, request("GET", "/EAaArVRs", "")).await.unwrap();
        assert_eq!(resp.status(), 500);
    }
}
