//! Per-request options and the allow-list merge applied before sending.
//!
//! Options are kept as a JSON map so that values coming from configuration
//! files or inbound requests can be passed straight through. Only the keys in
//! [`ALLOWED_OPTIONS`] ever reach the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Option keys the service understands
pub const ALLOWED_OPTIONS: [&str; 4] = ["id", "wait", "callback", "custom"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-side identifier echoed back with the result
    pub fn id(self, id: impl Into<String>) -> Self {
        self.set("id", Value::String(id.into()))
    }

    /// `true` blocks until the result is in the response, `false` delivers it
    /// to `callback` later
    pub fn wait(self, wait: bool) -> Self {
        self.set("wait", Value::Bool(wait))
    }

    pub fn callback(self, url: impl Into<String>) -> Self {
        self.set("callback", Value::String(url.into()))
    }

    /// Opaque payload returned with callback deliveries
    pub fn custom(self, custom: Value) -> Self {
        self.set("custom", custom)
    }

    /// Set an arbitrary key. Keys outside [`ALLOWED_OPTIONS`] are dropped when
    /// the options are merged for a request.
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Merge `overrides` over `defaults`, keeping only `allowed` keys.
pub fn merge_options(
    defaults: &Map<String, Value>,
    overrides: &Map<String, Value>,
    allowed: &[&str],
) -> Map<String, Value> {
    defaults
        .iter()
        .chain(overrides.iter())
        .filter(|(key, _)| allowed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Check the wait/callback contract on merged options.
///
/// `wait` must be a boolean when present. A deferred job (`wait = false`)
/// needs a non-blank string `callback`; any other callback value counts as
/// missing.
pub(crate) fn check_deferred(merged: &Map<String, Value>) -> Result<()> {
    let deferred = match merged.get("wait") {
        Some(Value::Bool(wait)) => !wait,
        Some(Value::Null) | None => false,
        Some(other) => {
            return Err(Error::Config(format!(
                "wait must be a boolean, got {}",
                other
            )));
        }
    };

    let has_callback = matches!(
        merged.get("callback"),
        Some(Value::String(url)) if !url.trim().is_empty()
    );

    if deferred && !has_callback {
        return Err(Error::MissingCallback);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_override_wins_and_unknown_keys_dropped() {
        let defaults = Options::new()
            .id("default-id")
            .wait(true)
            .set("quality", json!(80));
        let overrides = Options::new().id("call-id").set("resize", json!({"width": 100}));

        let merged = merge_options(defaults.as_map(), overrides.as_map(), &ALLOWED_OPTIONS);

        assert_eq!(merged.get("id"), Some(&json!("call-id")));
        assert_eq!(merged.get("wait"), Some(&json!(true)));
        assert!(!merged.contains_key("quality"));
        assert!(!merged.contains_key("resize"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_empty_inputs() {
        let merged = merge_options(&Map::new(), &Map::new(), &ALLOWED_OPTIONS);
        assert!(merged.is_empty());
    }

    fn missing_callback(options: Options) -> bool {
        matches!(
            check_deferred(options.as_map()),
            Err(Error::MissingCallback)
        )
    }

    #[test]
    fn test_deferred_needs_callback() {
        assert!(missing_callback(Options::new().wait(false)));
        assert!(missing_callback(Options::new().wait(false).callback("  ")));

        let ok = Options::new().wait(false).callback("https://example.com/hook");
        assert!(check_deferred(ok.as_map()).is_ok());

        // wait absent or true never needs a callback
        assert!(check_deferred(Options::new().as_map()).is_ok());
        assert!(check_deferred(Options::new().wait(true).as_map()).is_ok());
    }

    #[test]
    fn test_non_string_callback_counts_as_missing() {
        for callback in [json!(false), json!(0), json!([]), json!({}), json!(null)] {
            let options = Options::new().wait(false).set("callback", callback);
            assert!(missing_callback(options));
        }
    }

    #[test]
    fn test_non_boolean_wait_rejected() {
        for wait in [json!(0), json!("false"), json!([])] {
            let options = Options::new()
                .set("wait", wait)
                .callback("https://example.com/hook");
            assert!(matches!(
                check_deferred(options.as_map()),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn test_deserialize_from_json() {
        let options: Options =
            serde_json::from_value(json!({"wait": false, "callback": "https://x/cb"})).unwrap();
        assert_eq!(options.get("wait"), Some(&json!(false)));
        assert!(!options.is_empty());
    }
}
