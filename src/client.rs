use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::chat::Settings;
use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{CompletionRequest, CompletionResponse};

/// Base address used when no endpoint is configured.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const ORGANIZATION_HEADER: &str = "openai-organization";

/// The remote completion call, as seen by the chat session.
///
/// Given the transcript and sampling parameters, return zero or more
/// candidate replies.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request candidate replies for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    organization: Option<String>,
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl OpenAi {
    /// Create a new client against the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, None, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// The key is taken as given; resolving it from the environment is the
    /// job of [`Settings::load`].
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: Option<String>,
        organization: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::authentication("API key is empty"));
        }

        let base_url = normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            organization: organization.filter(|org| !org.trim().is_empty()),
            client,
            base_url,
            timeout,
            logger: None,
        })
    }

    /// Create a client from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_options(
            settings.key.clone(),
            Some(settings.endpoint.clone()),
            settings.org_id.clone(),
            Some(settings.timeout()),
        )
    }

    /// Attach a logger that sees every request and response.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The normalized base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            Error::validation(
                "API key contains characters not allowed in a header",
                Some("key".to_string()),
            )
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        if let Some(organization) = &self.organization {
            let value = HeaderValue::from_str(organization).map_err(|_| {
                Error::validation(
                    "organization id contains characters not allowed in a header",
                    Some("org_id".to_string()),
                )
            })?;
            headers.insert(ORGANIZATION_HEADER, value);
        }
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
            param: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| e.error_type.clone());
        let error_message = detail
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| error_body.clone());
        let error_param = detail.as_ref().and_then(|e| e.param.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message, request_id),
        }
    }

    /// Send a completion request and wait for the full response.
    pub async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::debug!(error = %err, "completion request failed");
        }
        result
    }

    async fn send_inner(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = self.base_url.join("chat/completions")?;
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }

        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let response = response.json::<CompletionResponse>().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Response timed out: {e}"),
                    Some(self.timeout.as_secs_f64()),
                )
            } else {
                Error::serialization(
                    format!("Failed to parse response: {e}"),
                    Some(Box::new(e)),
                )
            }
        })?;
        if let Some(logger) = &self.logger {
            logger.log_response(&response);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAi {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.send(request).await
    }
}

impl fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAi")
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Parse `endpoint` and make sure relative joins land beneath it.
pub(crate) fn normalize_base_url(endpoint: &str) -> Result<Url> {
    let mut endpoint = endpoint.trim().to_string();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    let url = Url::parse(&endpoint)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::validation(
            format!("endpoint must use http or https, not {scheme}"),
            Some("endpoint".to_string()),
        )),
    }
}
