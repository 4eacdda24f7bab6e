//! API credential types.
//!
//! Credentials are sent as the `auth` object of every request body.

use std::env;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

pub const API_KEY_ENV: &str = "IMGPRESS_API_KEY";
pub const API_SECRET_ENV: &str = "IMGPRESS_API_SECRET";

/// API key/secret pair.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read credentials from `IMGPRESS_API_KEY` and `IMGPRESS_API_SECRET`.
    pub fn from_env() -> Result<Self> {
        let api_key = read_env(API_KEY_ENV)?;
        let api_secret = read_env(API_SECRET_ENV)?;
        Ok(Self::new(api_key, api_secret))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

// The secret stays out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

fn read_env(name: &'static str) -> Result<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_as_auth_object() {
        let creds = Credentials::new("k", "s");
        assert_eq!(
            serde_json::to_value(&creds).unwrap(),
            json!({"api_key": "k", "api_secret": "s"})
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credentials::new("key-1", "very-secret"));
        assert!(rendered.contains("key-1"));
        assert!(!rendered.contains("very-secret"));
    }
}
