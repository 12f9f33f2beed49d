//! In-process test harness.
//!
//! Drives the real router with `oneshot` against in-memory stores. No socket
//! is bound and no global metrics recorder is installed.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::types::ActorId;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use scope_service::config::Config;
use scope_service::middleware::CALLER_HEADER;
use scope_service::repositories::{InMemoryStore, Stores};
use scope_service::routes::{build_routes, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Router plus the store behind it.
pub struct TestApp {
    router: Router,
    store: InMemoryStore,
}

impl TestApp {
    /// App with default configuration.
    pub fn new(store: InMemoryStore) -> Self {
        Self::with_vars(store, HashMap::new())
    }

    /// App with configuration overrides, e.g. `HIERARCHY_MAX_DEPTH`.
    pub fn with_vars(store: InMemoryStore, mut vars: HashMap<String, String>) -> Self {
        vars.entry("DATABASE_URL".to_string())
            .or_insert_with(|| "postgresql://test/test".to_string());
        let config = Config::from_vars(&vars).expect("test config should be valid");

        let state = Arc::new(AppState::new(Stores::in_memory(store.clone()), config));
        let handle = PrometheusBuilder::new().build_recorder().handle();

        Self {
            router: build_routes(state, handle),
            store,
        }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Send a request and return the status plus the JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: Option<ActorId>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, json))
    }

    pub async fn get(
        &self,
        uri: &str,
        caller: Option<ActorId>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, caller, None).await
    }
}
