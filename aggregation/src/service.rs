use crate::errors::AggregationError;
use crate::metrics_defs::{AGGREGATION_DURATION, REQUESTS_INFLIGHT};
use crate::orchestrator::Orchestrator;
use crate::types::AggregationRequest;
use hyper::body::Incoming;
use hyper::header::{ALLOW, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use serde_json::json;
use shared::http::{ResponseBody, make_error_response, make_json_response};
use shared::{gauge, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub const AGGREGATION_PATH: &str = "/aggregation";

/// Serves `GET /aggregation`.
pub struct AggregationService {
    orchestrator: Arc<Orchestrator>,
}

impl AggregationService {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

impl Service<Request<Incoming>> for AggregationService {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let orchestrator = self.orchestrator.clone();
        let method = req.method().clone();
        let uri = req.uri().clone();

        Box::pin(async move { Ok(handle(&orchestrator, &method, &uri).await) })
    }
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

async fn handle(orchestrator: &Orchestrator, method: &Method, uri: &Uri) -> Response<ResponseBody> {
    if uri.path() != AGGREGATION_PATH {
        return make_error_response(StatusCode::NOT_FOUND);
    }
    if method != Method::GET {
        let mut response = make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    let _inflight = InflightGuard::new();
    let started = Instant::now();
    let request = AggregationRequest::from_query(uri.query());

    let response = match orchestrator.aggregate(&request).await {
        Ok(aggregation) => make_json_response(StatusCode::OK, &aggregation),
        Err(e @ AggregationError::NoCategories) => {
            tracing::debug!(error = %e, "Rejected aggregation request");
            make_json_response(StatusCode::BAD_REQUEST, &json!({"error": e.to_string()}))
        }
        Err(e) => {
            tracing::error!(error = %e, "Aggregation failed");
            make_json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": e.to_string()}),
            )
        }
    };

    histogram!(AGGREGATION_DURATION, "status" => response.status().as_str().to_owned())
        .record(started.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, ExecutorConfig, ExecutorsConfig, Listener, UpstreamConfig, WaitPolicyConfig,
    };
    use crate::testutils::start_upstream_server;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;
    use serde_json::Value;

    async fn orchestrator() -> Orchestrator {
        let executor = ExecutorConfig {
            max_batch_size: 1,
            flush_timeout_secs: Some(1),
        };
        let config = Config {
            listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            upstream: UpstreamConfig {
                url: start_upstream_server().await,
                http_timeout_secs: 1,
            },
            executors: ExecutorsConfig {
                pricing: executor.clone(),
                shipments: executor.clone(),
                tracking: executor,
            },
            wait_policy: WaitPolicyConfig::Bounded {
                poll_interval_ms: 50,
                max_iterations: 4,
            },
        };
        Orchestrator::from_config(&config).unwrap()
    }

    async fn body_json(response: Response<ResponseBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_aggregation() {
        let orchestrator = orchestrator().await;
        let uri: Uri = "/aggregation?pricing=NL,CN&track=109347263,missing-1&shipments=1"
            .parse()
            .unwrap();

        let response = handle(&orchestrator, &Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            body_json(response).await,
            json!({
                "pricing": {"NL": 3.0, "CN": 3.0},
                "tracking": {"109347263": "NEW", "missing-1": null},
                "shipments": {"1": ["box", "pallet"]},
            })
        );
    }

    #[tokio::test]
    async fn test_missing_categories_are_null() {
        let orchestrator = orchestrator().await;
        let uri: Uri = "/aggregation?track=1".parse().unwrap();

        let response = handle(&orchestrator, &Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"pricing": null, "tracking": {"1": "NEW"}, "shipments": null})
        );
    }

    #[tokio::test]
    async fn test_failed_upstream_leaves_keys_unresolved() {
        let orchestrator = orchestrator().await;
        let uri: Uri = "/aggregation?pricing=fail".parse().unwrap();

        let response = handle(&orchestrator, &Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["pricing"], json!({"fail": null}));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let orchestrator = orchestrator().await;

        let uri: Uri = "/aggregation?pricing=,&other=1".parse().unwrap();
        let response = handle(&orchestrator, &Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "At least one of pricing, shipments or track must be provided"})
        );

        let uri: Uri = "/aggregation?pricing=NL".parse().unwrap();
        let response = handle(&orchestrator, &Method::POST, &uri).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");

        let uri: Uri = "/other?pricing=NL".parse().unwrap();
        let response = handle(&orchestrator, &Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
