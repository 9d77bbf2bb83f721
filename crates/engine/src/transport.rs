use crate::config::RestConfig;
use crate::error::TransportError;
use crate::request::{Method, RestRequest};
use log::debug;
use once_cell::sync::OnceCell;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// Raw answer from the store; status checks happen in the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one planned request. Implementations block the caller.
pub trait Transport {
    fn send(&self, request: &RestRequest) -> Result<RestResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &RestRequest) -> Result<RestResponse, TransportError> {
        (**self).send(request)
    }
}

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn runtime() -> Result<&'static Runtime, TransportError> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(|e| TransportError::Runtime(e.to_string()))
    })
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Blocking HTTP transport over an async `reqwest` client.
///
/// Must not be called from inside another tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &RestConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RestRequest) -> Result<RestResponse, TransportError> {
        let url = format!("{}/rest/v1/{}", self.base_url, request.table);
        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .query(&request.query);
        if request.method.wants_representation() {
            builder = builder.header("Prefer", "return=representation");
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        runtime()?.block_on(async {
            let response = builder.send().await.map_err(|e| self.classify(&url, e))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| self.classify(&url, e))?;
            debug!(
                "[db] {} {} -> {} ({} bytes, {} ms)",
                request.method,
                request.table,
                status,
                body.len(),
                started.elapsed().as_millis()
            );
            Ok(RestResponse { status, body })
        })
    }
}
