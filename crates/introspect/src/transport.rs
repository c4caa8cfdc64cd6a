//! GraphQL-over-HTTP transport.
//!
//! A single exchange POSTs `{query, operationName}` as JSON. Servers that
//! reject POST with `405 Method Not Allowed` get one retry as a GET carrying
//! the query as a URL parameter.

use std::future::Future;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::{GraphQLResponse, Result, TransportError};

/// Executes one GraphQL operation against an endpoint.
///
/// `Ok(None)` means the server answered without data (`404` or a `null`
/// body). An error means the exchange itself failed.
pub trait Transport {
    fn send(
        &self,
        endpoint: &str,
        query: &str,
        operation_name: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<GraphQLResponse>>> + Send;
}

/// [`Transport`] backed by a `reqwest` client.
///
/// The client carries headers such as `User-Agent` and `Authorization`, so
/// callers configure authentication when building it.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn exchange(
        &self,
        endpoint: &str,
        query: &str,
        operation_name: &str,
    ) -> Result<Option<GraphQLResponse>> {
        let body = serde_json::json!({
            "query": query,
            "operationName": operation_name,
        });

        tracing::debug!(method = "POST", url = endpoint, "Sending GraphQL request");
        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        log_response("POST", endpoint, &response);

        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            tracing::info!(url = endpoint, "POST is not allowed, switching to GET");
            let url = get_url(endpoint, query)?;

            tracing::debug!(method = "GET", url = endpoint, "Sending GraphQL request");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            log_response("GET", endpoint, &response);

            return read_response(response).await;
        }

        read_response(response).await
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        query: &str,
        operation_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<GraphQLResponse>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.exchange(endpoint, query, operation_name) => result,
        }
    }
}

/// Builds the GET fallback URL, keeping any query parameters the endpoint
/// already has.
fn get_url(endpoint: &str, query: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(endpoint).map_err(|e| TransportError::InvalidUrl {
        url: endpoint.to_string(),
        message: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("query", query);
    Ok(url)
}

fn log_response(method: &str, endpoint: &str, response: &reqwest::Response) {
    tracing::info!(
        method,
        url = endpoint,
        status = response.status().as_u16(),
        "{method} request to {endpoint}: {}",
        response.status()
    );
    tracing::debug!(headers = ?response.headers(), "Response headers");
}

async fn read_response(response: reqwest::Response) -> Result<Option<GraphQLResponse>> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    let body = response
        .text()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), body = %body, "Non-success response status");
    }

    serde_json::from_str::<Option<GraphQLResponse>>(&body).map_err(|e| TransportError::Parse {
        status: status.as_u16(),
        message: e.to_string(),
    })
}
