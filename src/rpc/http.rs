//! JSON-over-HTTP client for the record service.

use crate::error::{ApiError, RpcError};
use crate::fault::{codes, Fault};
use crate::rpc::{ItemOutcome, OrganizationRequest, OrganizationResponse, OrganizationService};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecuteMultipleRequest {
    requests: Vec<OrganizationRequest>,
    settings: ExecuteMultipleSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecuteMultipleSettings {
    continue_on_error: bool,
    return_responses: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecuteMultipleResponse {
    #[serde(default)]
    responses: Vec<ExecuteMultipleResponseItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecuteMultipleResponseItem {
    request_index: usize,
    #[serde(default)]
    response: Option<OrganizationResponse>,
    #[serde(default)]
    fault: Option<Fault>,
}

fn map_http_error(error: reqwest::Error) -> RpcError {
    if error.is_timeout() {
        RpcError::Timeout(error.to_string())
    } else if error.is_decode() {
        RpcError::InvalidResponse(error.to_string())
    } else {
        RpcError::Transport(error.to_string())
    }
}

/// Turn a non-success HTTP status into an error, preferring a structured fault body.
async fn map_status_error(response: Response) -> RpcError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if let Ok(fault) = serde_json::from_str::<Fault>(&body) {
        if fault.code != 0 || !fault.message.is_empty() {
            return RpcError::Fault(fault);
        }
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => RpcError::Fault(Fault::new(
            codes::REQUEST_LIMIT_EXCEEDED,
            format!("Rate limit exceeded: {}", body),
        )),
        // A bare 404 names a missing route, not a missing record.
        StatusCode::NOT_FOUND => RpcError::Transport(format!("{}: {}", status, body)),
        s if s.is_server_error() => RpcError::Transport(format!("{}: {}", s, body)),
        s => RpcError::Fault(Fault::new(0, format!("{}: {}", s, body))),
    }
}

/// Lay keyed items out by position. Ordinals the service did not answer
/// become [`ItemOutcome::Missing`].
fn relay_positional(
    len: usize,
    items: Vec<ExecuteMultipleResponseItem>,
) -> Result<Vec<ItemOutcome>, RpcError> {
    let mut slots: Vec<Option<ItemOutcome>> = vec![None; len];
    for item in items {
        let Some(slot) = slots.get_mut(item.request_index) else {
            return Err(RpcError::InvalidResponse(format!(
                "response index {} outside batch of {}",
                item.request_index, len
            )));
        };
        *slot = Some(match (item.fault, item.response) {
            (Some(fault), _) => ItemOutcome::Fault(fault),
            (None, Some(response)) => ItemOutcome::Success(response),
            (None, None) => ItemOutcome::Success(OrganizationResponse::default()),
        });
    }
    Ok(slots
        .into_iter()
        .map(|slot| slot.unwrap_or(ItemOutcome::Missing))
        .collect())
}

/// Record service reached over HTTP with JSON bodies.
pub struct HttpOrganizationService {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpOrganizationService {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, RpcError> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut builder = self.client.post(&url).json(body);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            return Err(map_status_error(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl OrganizationService for HttpOrganizationService {
    async fn execute(&self, request: OrganizationRequest) -> Result<OrganizationResponse, RpcError> {
        debug!(request = %request.request_name, "Executing single request");
        let response = self.post("Execute", &request).await?;
        response.json().await.map_err(map_http_error)
    }

    async fn execute_multiple(
        &self,
        requests: Vec<OrganizationRequest>,
    ) -> Result<Vec<ItemOutcome>, RpcError> {
        let len = requests.len();
        debug!(count = len, "Executing composite request");
        let body = ExecuteMultipleRequest {
            requests,
            settings: ExecuteMultipleSettings {
                continue_on_error: true,
                return_responses: true,
            },
        };
        let response = self.post("ExecuteMultiple", &body).await?;
        let parsed: ExecuteMultipleResponse = response.json().await.map_err(map_http_error)?;
        relay_positional(len, parsed.responses)
    }
}
