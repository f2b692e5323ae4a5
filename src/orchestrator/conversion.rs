//! Video-hosting conversion provider (Cobalt-compatible API)
//!
//! Turns a watch URL into a short-lived audio tunnel URL in the requested
//! format. Requests are one-shot and serialized: the provider rate-limits
//! aggressively, so only one request is in flight at a time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::Quality;
use crate::transport::{HttpTransport, RetryPolicy, TransportError};

/// Conversion failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with an explicit error
    #[error("Provider error {code}{}", describe_context(.service, .limit))]
    Provider {
        code: String,
        service: Option<String>,
        limit: Option<u64>,
    },

    #[error("Unexpected provider status: {0}")]
    UnexpectedStatus(String),

    #[error("Provider returned no URL")]
    EmptyUrl,

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

fn describe_context(service: &Option<String>, limit: &Option<u64>) -> String {
    match (service, limit) {
        (Some(service), Some(limit)) => format!(" (service: {service}, limit: {limit})"),
        (Some(service), None) => format!(" (service: {service})"),
        (None, Some(limit)) => format!(" (limit: {limit})"),
        (None, None) => String::new(),
    }
}

/// A usable audio URL from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub url: String,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversionRequest<'a> {
    url: &'a str,
    audio_format: &'static str,
    audio_bitrate: String,
    download_mode: &'static str,
    filename_style: &'static str,
}

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    error: Option<ProviderErrorDto>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDto {
    code: String,
    #[serde(default)]
    context: Option<ProviderErrorContext>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorContext {
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
}

/// Conversion provider client
pub struct ConversionClient {
    transport: Arc<HttpTransport>,
    endpoint: String,
    in_flight: Mutex<()>,
}

impl ConversionClient {
    pub fn new(transport: Arc<HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            in_flight: Mutex::new(()),
        }
    }

    /// Request an audio tunnel for `watch_url` at `quality`
    #[tracing::instrument(skip(self))]
    pub async fn request_tunnel(
        &self,
        watch_url: &str,
        quality: Quality,
    ) -> Result<Tunnel, ConversionError> {
        let _serialized = self.in_flight.lock().await;

        let body = ConversionRequest {
            url: watch_url,
            audio_format: quality.format(),
            audio_bitrate: quality.bitrate().to_string(),
            download_mode: "audio",
            filename_style: "basic",
        };

        let request = self
            .transport
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.transport.request_timeout())
            .json(&body)
            .build()
            .map_err(TransportError::from)?;

        tracing::debug!(format = quality.format(), bitrate = quality.bitrate(), "Requesting conversion");

        let response = match self.transport.send(request, RetryPolicy::none()).await {
            Ok(response) => response,
            // Error statuses usually still carry a structured error body
            Err(TransportError::Status { status, url, body }) => {
                return Err(match serde_json::from_str::<ConversionResponse>(&body) {
                    Ok(parsed) if parsed.error.is_some() => to_tunnel(parsed)
                        .err()
                        .unwrap_or(ConversionError::UnexpectedStatus(status.to_string())),
                    _ => ConversionError::Transport(TransportError::Status { status, url, body }),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let parsed: ConversionResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::Parse(e.to_string()))?;

        let tunnel = to_tunnel(parsed)?;
        tracing::info!("Conversion provider returned a tunnel");
        Ok(tunnel)
    }
}

fn to_tunnel(response: ConversionResponse) -> Result<Tunnel, ConversionError> {
    match response.status.as_str() {
        "tunnel" | "redirect" => {
            let url = response
                .url
                .filter(|u| !u.is_empty())
                .ok_or(ConversionError::EmptyUrl)?;
            Ok(Tunnel {
                url,
                filename: response.filename,
            })
        }
        "error" => {
            let error = response.error.ok_or_else(|| ConversionError::Provider {
                code: "unknown".to_string(),
                service: None,
                limit: None,
            })?;
            let (service, limit) = error
                .context
                .map(|c| (c.service, c.limit))
                .unwrap_or((None, None));
            Err(ConversionError::Provider {
                code: error.code,
                service,
                limit,
            })
        }
        other => Err(ConversionError::UnexpectedStatus(other.to_string())),
    }
}
