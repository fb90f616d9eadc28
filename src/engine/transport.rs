//! Sends built requests over the wire.

use crate::descriptor::HttpMethod;
use crate::engine::request::HttpRequest;
use crate::engine::session::EndpointSession;
use crate::error::Error;
use crate::logging;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::cookie::CookieStore;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use std::time::Instant;

/// A received response with its body fully read.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: HeaderMap,
    /// `None` for statuses and methods that never carry a body.
    pub body: Option<Bytes>,
}

impl ResponseEnvelope {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Whether a response to `method` with `status` can carry a body.
#[must_use]
pub const fn has_body(method: HttpMethod, status: u16) -> bool {
    !matches!(method, HttpMethod::Head) && !matches!(status, 204 | 205 | 304)
}

/// Executes one request against an endpoint session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or its response read.
    async fn execute(
        &self,
        request: HttpRequest,
        session: &EndpointSession,
        stateful: bool,
    ) -> Result<ResponseEnvelope, Error>;
}

/// The default transport, backed by the session's `reqwest` client.
///
/// Cookies are only exchanged with the session jar for stateful calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransport;

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: HttpRequest,
        session: &EndpointSession,
        stateful: bool,
    ) -> Result<ResponseEnvelope, Error> {
        let HttpRequest {
            method,
            url,
            mut headers,
            body,
        } = request;

        if stateful {
            if let Some(cookie) = session.cookies().cookies(&url) {
                headers.append(COOKIE, cookie);
            }
        }

        logging::log_request(method.as_str(), url.as_str(), &headers, body.as_ref());

        let mut builder = session
            .client()
            .request(method.to_reqwest(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body.into_body());
        }

        let _permit = session.acquire().await?;
        let start = Instant::now();
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if stateful {
            let mut set_cookies = headers.get_all(SET_COOKIE).iter();
            session.cookies().set_cookies(&mut set_cookies, &url);
        }

        let body = if has_body(method, status) {
            Some(
                response
                    .bytes()
                    .await
                    .map_err(|e| Error::ResponseReadError {
                        reason: e.to_string(),
                    })?,
            )
        } else {
            None
        };

        logging::log_response(
            status,
            start.elapsed().as_millis(),
            &headers,
            body.as_deref(),
        );

        Ok(ResponseEnvelope {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodiless_statuses_and_head() {
        assert!(has_body(HttpMethod::Get, 200));
        assert!(has_body(HttpMethod::Post, 404));
        assert!(!has_body(HttpMethod::Get, 204));
        assert!(!has_body(HttpMethod::Put, 205));
        assert!(!has_body(HttpMethod::Get, 304));
        assert!(!has_body(HttpMethod::Head, 200));
    }
}
