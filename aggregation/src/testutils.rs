use batcher::split_keys;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::{Map, Value, json};
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Fake lookup service.
///
/// - `/pricing` prices every key at 1.5 per character
/// - `/shipments` answers `["box", "pallet"]` for every key
/// - `/track` answers `"NEW"` for every key
///
/// Keys starting with `missing` are left out of the response. The keys
/// `fail`, `garbage` and `slow` produce a 500, an invalid body and a two
/// second delay respectively.
async fn upstream_handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let params = req
        .uri()
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(name, _)| name == "q")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default();
    let keys = split_keys(&params);

    if keys.iter().any(|k| k == "fail") {
        let mut response = Response::new(Full::new(Bytes::from_static(b"boom")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }
    if keys.iter().any(|k| k == "garbage") {
        return Ok(Response::new(Full::new(Bytes::from_static(b"not json"))));
    }
    if keys.iter().any(|k| k == "slow") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let value_for = |key: &str| -> Option<Value> {
        match req.uri().path() {
            "/pricing" => Some(json!(key.len() as f64 * 1.5)),
            "/shipments" => Some(json!(["box", "pallet"])),
            "/track" => Some(json!("NEW")),
            _ => None,
        }
    };

    let mut body = Map::new();
    for key in keys.iter().filter(|k| !k.starts_with("missing")) {
        if let Some(value) = value_for(key) {
            body.insert(key.clone(), value);
        }
    }

    let bytes = serde_json::to_vec(&body).unwrap();
    Ok(Response::new(Full::new(Bytes::from(bytes))))
}

pub async fn start_upstream_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service_fn(upstream_handler))
                    .await;
            });
        }
    });

    Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()
}
