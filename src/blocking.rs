//! Blocking facade over [`crate::Client`].
//!
//! Each blocking client owns a current-thread tokio runtime and drives the
//! async client on it. Do not use it from inside an async context: blocking on
//! a runtime from within another one panics.

use serde_json::{Number, Value};
use tokio::runtime::{Builder, Runtime};

use crate::client::{Client as AsyncClient, ClientConfig};
use crate::credential::Credentials;
use crate::error::Result;
use crate::options::Options;
use crate::transport::{HttpTransport, Transport};
use crate::types::{ImageSource, LastError};

pub struct Client<T: Transport = HttpTransport> {
    inner: AsyncClient<T>,
    runtime: Runtime,
}

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

impl Client<HttpTransport> {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(Credentials::new(api_key, api_secret)))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(AsyncClient::with_config(config))?;
        Ok(Self { inner, runtime })
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(AsyncClient::with_transport(config, transport))?;
        Ok(Self { inner, runtime })
    }

    pub fn account(&self) -> Option<Value> {
        self.runtime.block_on(self.inner.account())
    }

    pub fn try_account(&self) -> Result<Value> {
        self.runtime.block_on(self.inner.try_account())
    }

    pub fn compress(
        &self,
        image: impl Into<ImageSource>,
        compression_type: &str,
        options: Options,
    ) -> Result<Option<Value>> {
        self.runtime
            .block_on(self.inner.compress(image, compression_type, options))
    }

    pub fn compress_multiple<I, S>(
        &self,
        images: I,
        compression_type: &str,
        options: Options,
    ) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime
            .block_on(self.inner.compress_multiple(images, compression_type, options))
    }

    pub fn try_compress(
        &self,
        image: impl Into<ImageSource>,
        compression_type: &str,
        options: Options,
    ) -> Result<Value> {
        self.runtime
            .block_on(self.inner.try_compress(image, compression_type, options))
    }

    pub fn limit(&self) -> Option<Number> {
        self.runtime.block_on(self.inner.limit())
    }

    pub fn try_limit(&self) -> Result<Number> {
        self.runtime.block_on(self.inner.try_limit())
    }

    pub fn supported(&self, selector: Option<&str>) -> Option<Value> {
        self.runtime.block_on(self.inner.supported(selector))
    }

    pub fn try_supported(&self, selector: Option<&str>) -> Result<Value> {
        self.runtime.block_on(self.inner.try_supported(selector))
    }

    pub fn callback_response(&self, raw_body: impl AsRef<[u8]>) -> Result<Value> {
        self.inner.callback_response(raw_body)
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.inner.last_error()
    }
}
