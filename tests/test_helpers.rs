#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::{Arc, Mutex};
use tether::descriptor::{EndpointDescriptor, HttpMethod};
use tether::engine::classifier;
use tether::engine::metadata::build_base_url;
use tether::engine::request::HttpRequest;
use tether::engine::session::EndpointSession;
use tether::engine::transport::{ResponseEnvelope, Transport};
use tether::error::Error;
use tether::invocation::{Argument, InvocationContext};
use wiremock::MockServer;

/// An endpoint descriptor pointing at a running mock server.
#[must_use]
pub fn endpoint_for(server: &MockServer, name: &str) -> EndpointDescriptor {
    let address = server.address();
    EndpointDescriptor::new(name, address.ip().to_string()).with_port(address.port().to_string())
}

/// Classifies and binds `args` the way the dispatcher does, returning the
/// context and the entity values for the builder chain.
pub fn context_for(
    endpoint: &EndpointDescriptor,
    operation: &str,
    args: Vec<Argument>,
) -> Result<(InvocationContext, Vec<Argument>), Error> {
    let op = Arc::clone(
        endpoint
            .operation(operation)
            .expect("operation is declared"),
    );
    let plan = classifier::classify(endpoint, &op)?;
    let bound = classifier::bind(endpoint, &op, &plan, args)?;
    let ctx = InvocationContext {
        endpoint: Arc::new(endpoint.clone()),
        operation: op,
        base_url: build_base_url(endpoint)?,
        bindings: bound.bindings,
        callback: bound.callback,
    };
    Ok((ctx, bound.entities))
}

/// What a [`RecordingTransport`] saw of one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub stateful: bool,
}

/// A transport that records requests and answers with a fixed response.
pub struct RecordingTransport {
    pub requests: Mutex<Vec<RecordedRequest>>,
    status: u16,
    headers: HeaderMap,
    body: Option<&'static str>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new(status: u16, body: Option<&'static str>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(name, value.parse().unwrap());
        self
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(
        &self,
        request: HttpRequest,
        _session: &EndpointSession,
        stateful: bool,
    ) -> Result<ResponseEnvelope, Error> {
        let body = request
            .body
            .as_ref()
            .and_then(|body| body.in_memory())
            .map(<[u8]>::to_vec);
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body,
            stateful,
        });
        Ok(ResponseEnvelope {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.map(|text| bytes::Bytes::from_static(text.as_bytes())),
        })
    }
}
