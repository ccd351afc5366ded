use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
#[cfg(feature = "tls")]
use hyper_tls::HttpsConnector;
use tokio::time::{timeout, Instant};

use crate::error::NetworkError;
use crate::models::dsl_model::RunConfig;
use crate::models::response::{Outcome, Response};

#[cfg(feature = "tls")]
pub type HttpsClient = Client<HttpsConnector<HttpConnector>>;
#[cfg(not(feature = "tls"))]
pub type HttpsClient = Client<HttpConnector>;

/// One pooled client shared by every virtual user of a run.
pub fn build_client() -> HttpsClient {
    #[cfg(feature = "tls")]
    let connector = HttpsConnector::new();
    #[cfg(not(feature = "tls"))]
    let connector = HttpConnector::new();

    Client::builder().build::<_, Body>(connector)
}

fn build_request(config: &RunConfig) -> Result<Request<Body>, NetworkError> {
    let mut req_builder = Request::builder()
        .method(Method::GET)
        .uri(config.uri.clone());

    for (name, value) in &config.headers {
        req_builder = req_builder.header(name, value);
    }

    req_builder
        .body(Body::empty())
        .map_err(|e| NetworkError::Other(e.to_string()))
}

/// Issues a single GET against the configured target, bounded by the run's
/// timeout.
///
/// Latency is wall time from handing the request to the pool until the last
/// body byte arrives. It includes DNS, connect and TLS when the pool has no
/// idle connection, so the first iteration of each user is usually slower.
pub async fn send_request(client: &HttpsClient, config: &RunConfig) -> Outcome {
    let request = build_request(config)?;

    let start = Instant::now();
    let exchange = async {
        let resp = client.request(request).await?;
        let status = resp.status();
        hyper::body::to_bytes(resp.into_body()).await?;
        Ok::<_, hyper::Error>(status)
    };

    match timeout(config.timeout, exchange).await {
        Ok(Ok(status)) => Ok(Response {
            status: status.as_u16(),
            latency: start.elapsed(),
        }),
        Ok(Err(e)) => Err(NetworkError::from(e)),
        Err(_) => Err(NetworkError::Timeout),
    }
}
