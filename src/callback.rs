//! Decoding of webhook deliveries.
//!
//! Jobs submitted with `wait = false` are delivered later as a JSON POST to the
//! job's callback URL. Hosting that route is up to the application; these
//! helpers only decode what it received.

use serde_json::Value;

use crate::error::Result;

/// Decode a webhook body as JSON.
pub fn decode_callback(raw_body: impl AsRef<[u8]>) -> Result<Value> {
    Ok(serde_json::from_slice(raw_body.as_ref())?)
}

/// The `id` given when the job was submitted, if it was echoed back
pub fn callback_id(payload: &Value) -> Option<&str> {
    payload.get("id").and_then(Value::as_str)
}

/// The opaque `custom` data given when the job was submitted
pub fn callback_custom(payload: &Value) -> Option<&Value> {
    payload.get("custom").filter(|custom| !custom.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn test_decode_callback() {
        let payload =
            decode_callback(r#"{"success":true,"id":"job-9","custom":{"user":3}}"#).unwrap();
        assert_eq!(callback_id(&payload), Some("job-9"));
        assert_eq!(callback_custom(&payload), Some(&json!({"user": 3})));
    }

    #[test]
    fn test_decode_callback_without_correlation() {
        let payload = decode_callback(br#"{"success":false,"custom":null}"#).unwrap();
        assert_eq!(callback_id(&payload), None);
        assert_eq!(callback_custom(&payload), None);
    }

    #[test]
    fn test_decode_callback_invalid_json() {
        assert!(matches!(decode_callback("not json"), Err(Error::Json(_))));
    }
}
