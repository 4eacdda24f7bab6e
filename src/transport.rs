//! HTTP transport used by the client.
//!
//! The client only needs "POST this JSON body to that action and give me the
//! status and body back". [`HttpTransport`] does that with wreq against the
//! fixed service URL; tests plug in their own [`Transport`].

use std::future::Future;

use wreq::{Client, header};

use crate::error::Result;
use crate::types::Action;

pub const BASE_URL: &str = "https://api.imgpress.io/v1/";

/// Status and undecoded body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub trait Transport: Send + Sync {
    /// Send `body` (already serialized JSON) to `action`.
    ///
    /// Any response that arrives, whatever its status, is `Ok`. `Err` is for
    /// failures where no response exists (DNS, connect, TLS, ...).
    fn post(&self, action: Action, body: String)
    -> impl Future<Output = Result<RawResponse>> + Send;
}

/// wreq-backed transport against [`BASE_URL`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub(crate) fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder().gzip(true).brotli(true).zstd(true).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, action: Action) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, action)
        } else {
            format!("{}/{}", self.base_url, action)
        }
    }
}

impl Transport for HttpTransport {
    async fn post(&self, action: Action, body: String) -> Result<RawResponse> {
        let response = self
            .http_client
            .post(self.url(action))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::*;
    use crate::error::Error;

    type Reply = std::result::Result<RawResponse, String>;

    /// In-memory transport that records every request body
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        replies: Arc<Mutex<HashMap<Action, Reply>>>,
        requests: Arc<Mutex<Vec<(Action, Value)>>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(self, action: Action, status: u16, body: Value) -> Self {
            self.set_response(action, status, body);
            self
        }

        pub(crate) fn respond_raw(self, action: Action, status: u16, body: &str) -> Self {
            self.set_response_raw(action, status, body);
            self
        }

        pub(crate) fn fail(self, action: Action, message: &str) -> Self {
            self.set_failure(action, message);
            self
        }

        pub(crate) fn set_response(&self, action: Action, status: u16, body: Value) {
            self.set_response_raw(action, status, &body.to_string());
        }

        pub(crate) fn set_response_raw(&self, action: Action, status: u16, body: &str) {
            self.replies
                .lock()
                .unwrap()
                .insert(action, Ok(RawResponse::new(status, body)));
        }

        pub(crate) fn set_failure(&self, action: Action, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .insert(action, Err(message.to_string()));
        }

        pub(crate) fn requests(&self) -> Vec<(Action, Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        async fn post(&self, action: Action, body: String) -> Result<RawResponse> {
            let body: Value = serde_json::from_str(&body).unwrap();
            self.requests.lock().unwrap().push((action, body));

            let reply = self.replies.lock().unwrap().get(&action).cloned();
            match reply {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(Error::Transport(message)),
                None => Err(Error::Transport(format!("no reply configured for {}", action))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_url_joining() {
        let transport = HttpTransport::with_base_url("https://example.com/v1").unwrap();
        assert_eq!(
            transport.url(Action::Deflate),
            "https://example.com/v1/deflate"
        );

        let transport = HttpTransport::new().unwrap();
        assert_eq!(
            transport.url(Action::Account),
            "https://api.imgpress.io/v1/account"
        );
    }

    #[tokio::test]
    async fn test_post_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/limit"))
            .and(header_matcher("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({"auth": {"api_key": "k"}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"success":true,"limit":10}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::with_base_url(format!("{}/v1/", server.uri())).unwrap();
        let response = transport
            .post(
                Action::Limit,
                r#"{"auth":{"api_key":"k","api_secret":"s"}}"#.to_string(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"success":true,"limit":10}"#);
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/deflate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let transport = HttpTransport::with_base_url(format!("{}/v1/", server.uri())).unwrap();
        let response = transport
            .post(Action::Deflate, "{}".to_string())
            .await
            .unwrap();

        assert_eq!(response, RawResponse::new(503, "maintenance"));
    }
}
