use std::env;
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Number, Value};

use crate::callback;
use crate::credential::Credentials;
use crate::error::{Error, Result};
use crate::options::{ALLOWED_OPTIONS, Options, check_deferred, merge_options};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::types::{Action, ImageSource, LastError, selectors};

pub const CALLBACK_URL_ENV: &str = "IMGPRESS_CALLBACK_URL";
pub const WAIT_ENV: &str = "IMGPRESS_WAIT";

/// Configuration for Client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    /// Options applied to every compression request, overridden per call
    pub defaults: Options,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            defaults: Options::default(),
        }
    }

    /// Credentials plus optional defaults from the environment.
    ///
    /// `IMGPRESS_CALLBACK_URL` sets a default callback and switches the
    /// default to `wait = false`; `IMGPRESS_WAIT` overrides that explicitly.
    pub fn from_env() -> Result<Self> {
        let mut defaults = Options::new();

        if let Ok(url) = env::var(CALLBACK_URL_ENV)
            && !url.trim().is_empty()
        {
            defaults = defaults.callback(url.trim()).wait(false);
        }

        if let Ok(wait) = env::var(WAIT_ENV) {
            let wait = parse_bool(&wait).ok_or_else(|| {
                Error::Config(format!("{} must be true or false, got {:?}", WAIT_ENV, wait))
            })?;
            defaults = defaults.wait(wait);
        }

        Ok(Self {
            credentials: Credentials::from_env()?,
            defaults,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// ImgPress API client.
///
/// Every method sends exactly one request and waits for it. The soft methods
/// (`account`, `compress`, `limit`, `supported`) return `None` on failure and
/// keep the failure for [`Client::last_error`]; the `try_*` variants return it
/// directly.
///
/// The last error is shared by everyone holding the client. When one client
/// serves concurrent callers, the value read after a failure may belong to
/// another caller's request.
pub struct Client<T: Transport = HttpTransport> {
    transport: T,
    credentials: Credentials,
    defaults: Options,
    last_error: Mutex<Option<LastError>>,
}

impl Client<HttpTransport> {
    pub async fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(Credentials::new(api_key, api_secret))).await
    }

    pub async fn with_defaults(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        defaults: Options,
    ) -> Result<Self> {
        Self::with_config(ClientConfig {
            credentials: Credentials::new(api_key, api_secret),
            defaults,
        })
        .await
    }

    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new()?).await
    }
}

impl<T: Transport> Client<T> {
    /// Build a client on top of `transport` and verify the credentials.
    ///
    /// Fails with [`Error::Authentication`] unless the `account` call
    /// succeeds and returns account data.
    pub async fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let client = Self {
            transport,
            credentials: config.credentials,
            defaults: config.defaults,
            last_error: Mutex::new(None),
        };

        if let Err(e) = client.try_account().await {
            tracing::warn!(error = %e, "account check failed");
            return Err(Error::Authentication(e.to_string()));
        }

        tracing::debug!("client authenticated");
        Ok(client)
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Account details, or `None` if the request failed.
    pub async fn account(&self) -> Option<Value> {
        let result = self.try_account().await;
        self.soften(result)
    }

    pub async fn try_account(&self) -> Result<Value> {
        let response = self.send(Action::Account, Map::new()).await?;
        take_field(response, "account")
    }

    /// Submit one image, or several when given a sequence.
    ///
    /// Returns `Err` only for configuration problems, detected before anything
    /// is sent. Request failures give `Ok(None)` and are kept for
    /// [`Client::last_error`].
    pub async fn compress(
        &self,
        image: impl Into<ImageSource>,
        compression_type: &str,
        options: Options,
    ) -> Result<Option<Value>> {
        match self.try_compress(image, compression_type, options).await {
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                self.record(&e);
                Ok(None)
            }
        }
    }

    /// [`Client::compress`] for a batch of images.
    pub async fn compress_multiple<I, S>(
        &self,
        images: I,
        compression_type: &str,
        options: Options,
    ) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let images = ImageSource::Multiple(images.into_iter().map(Into::into).collect());
        self.compress(images, compression_type, options).await
    }

    pub async fn try_compress(
        &self,
        image: impl Into<ImageSource>,
        compression_type: &str,
        options: Options,
    ) -> Result<Value> {
        let data = self.compression_request(image.into(), compression_type, &options)?;
        self.send(Action::Deflate, data).await
    }

    /// Merge options and check the wait/callback contract.
    fn compression_request(
        &self,
        image: ImageSource,
        compression_type: &str,
        options: &Options,
    ) -> Result<Map<String, Value>> {
        let mut data = merge_options(self.defaults.as_map(), options.as_map(), &ALLOWED_OPTIONS);
        check_deferred(&data)?;

        data.insert(image.field().to_string(), image.to_value());
        data.insert(
            "type".to_string(),
            Value::String(compression_type.to_string()),
        );
        Ok(data)
    }

    /// Current usage limit as sent by the service, or `None` if the request
    /// failed. Negative and fractional values are passed through.
    pub async fn limit(&self) -> Option<Number> {
        let result = self.try_limit().await;
        self.soften(result)
    }

    pub async fn try_limit(&self) -> Result<Number> {
        let response = self.send(Action::Limit, Map::new()).await?;
        match take_field(response, "limit")? {
            Value::Number(limit) => Ok(limit),
            value => Err(Error::InvalidField {
                field: "limit",
                value,
            }),
        }
    }

    /// Supported formats.
    ///
    /// `"extensions"` selects the extension list, `"mime"` the MIME type
    /// list; any other selector returns the whole response.
    pub async fn supported(&self, selector: Option<&str>) -> Option<Value> {
        let result = self.try_supported(selector).await;
        self.soften(result)
    }

    pub async fn try_supported(&self, selector: Option<&str>) -> Result<Value> {
        let response = self.send(Action::Supported, Map::new()).await?;
        match selector {
            Some(selectors::EXTENSIONS) => take_field(response, "extensions"),
            Some(selectors::MIME) => take_field(response, "types"),
            _ => Ok(response),
        }
    }

    /// Decode the body of a webhook delivery for a `wait = false` job.
    pub fn callback_response(&self, raw_body: impl AsRef<[u8]>) -> Result<Value> {
        callback::decode_callback(raw_body)
    }

    /// Most recent request failure, if any.
    pub fn last_error(&self) -> Option<LastError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, error: &Error) {
        tracing::warn!(error = %error, "request failed");
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(error.to_last_error());
    }

    fn soften<V>(&self, result: Result<V>) -> Option<V> {
        result.map_err(|e| self.record(&e)).ok()
    }

    /// Send `{auth, ...data}` to `action` and decode the reply
    async fn send(&self, action: Action, data: Map<String, Value>) -> Result<Value> {
        let mut body = Map::new();
        body.insert("auth".to_string(), serde_json::to_value(&self.credentials)?);
        body.extend(data);

        tracing::debug!(%action, "sending request");
        let raw = self
            .transport
            .post(action, serde_json::to_string(&body)?)
            .await?;
        tracing::debug!(%action, status = raw.status, "response received");

        decode_response(raw)
    }
}

/// Turn a raw exchange into the decoded body of a successful response
fn decode_response(raw: RawResponse) -> Result<Value> {
    if raw.status != 200 {
        let body = serde_json::from_str::<Value>(&raw.body).ok();
        let message = if raw.body.trim().is_empty() {
            format!("HTTP {}", raw.status)
        } else {
            raw.body
        };
        return Err(Error::Status {
            status: raw.status,
            body,
            message,
        });
    }

    let response: Value = serde_json::from_str(&raw.body)?;
    if response.get("success") == Some(&Value::Bool(true)) {
        Ok(response)
    } else {
        Err(Error::Api { body: response })
    }
}

fn take_field(mut response: Value, field: &'static str) -> Result<Value> {
    match response.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(Error::MissingField(field)),
        Some(value) => Ok(value),
    }
}
