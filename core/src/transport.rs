//! Executes `HttpRequest` values against the network.
//!
//! `Transport` is the only place the client does I/O. `UreqTransport` is the
//! blocking production implementation; tests substitute scripted stubs.

use std::time::Duration;

use ureq::Agent;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Largest response body `UreqTransport` will buffer. Report PDFs for a
/// year of movements can exceed `ureq`'s 10 MiB default.
pub const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Performs one HTTP round-trip.
///
/// Implementations return non-success statuses as ordinary responses and
/// reserve `Err` for failures that produced no response at all.
pub trait Transport {
    fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// Status codes are returned as data and redirects are not followed, so the
/// cookies set by the login response itself stay visible.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let endpoint = request.url.clone();
        let has_content_type = request.header("content-type").is_some();
        let transport_err = |e: ureq::Error| ApiError::Transport {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        };

        let mut response = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                for (name, value) in &request.query {
                    builder = builder.query(name, value);
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                for (name, value) in &request.query {
                    builder = builder.query(name, value);
                }
                match request.body {
                    Some(RequestBody::Json(body)) if has_content_type => {
                        builder.send(body.as_bytes())
                    }
                    Some(RequestBody::Json(body)) => builder
                        .content_type("application/json")
                        .send(body.as_bytes()),
                    Some(RequestBody::Form(fields)) => builder
                        .send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
                    None => builder.send_empty(),
                }
            }
        }
        .map_err(transport_err)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(transport_err)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
