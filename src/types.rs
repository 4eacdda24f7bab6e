use serde_json::Value;
use std::fmt;

/// Endpoint actions exposed by the service, relative to the base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Account,
    Deflate,
    Limit,
    Supported,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Deflate => "deflate",
            Self::Limit => "limit",
            Self::Supported => "supported",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image reference(s) submitted for compression.
///
/// A single reference is sent as `image`, a sequence as `images`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Single(String),
    Multiple(Vec<String>),
}

impl ImageSource {
    /// Field name used in the request body
    pub fn field(&self) -> &'static str {
        match self {
            Self::Single(_) => "image",
            Self::Multiple(_) => "images",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Single(image) => Value::String(image.clone()),
            Self::Multiple(images) => {
                Value::Array(images.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for ImageSource {
    fn from(image: &str) -> Self {
        Self::Single(image.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(image: String) -> Self {
        Self::Single(image)
    }
}

impl From<Vec<String>> for ImageSource {
    fn from(images: Vec<String>) -> Self {
        Self::Multiple(images)
    }
}

impl From<Vec<&str>> for ImageSource {
    fn from(images: Vec<&str>) -> Self {
        Self::Multiple(images.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for ImageSource {
    fn from(images: &[String]) -> Self {
        Self::Multiple(images.to_vec())
    }
}

/// Most recent failure recorded by a client
#[derive(Debug, Clone, PartialEq)]
pub enum LastError {
    /// Decoded JSON error body returned by the service
    Body(Value),
    /// Message of an error that carried no decodable body
    Message(String),
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(body) => write!(f, "{}", body),
            Self::Message(message) => f.write_str(message),
        }
    }
}

/// Compression modes. The client passes the mode through verbatim, the
/// service decides what is valid.
pub mod compression_types {
    pub const LOSSY: &str = "lossy";
    pub const LOSSLESS: &str = "lossless";
}

/// Selectors understood by `supported`
pub mod selectors {
    pub const EXTENSIONS: &str = "extensions";
    pub const MIME: &str = "mime";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_source_fields() {
        let single = ImageSource::from("https://example.com/a.png");
        assert_eq!(single.field(), "image");
        assert_eq!(single.to_value(), json!("https://example.com/a.png"));

        let multiple = ImageSource::from(vec!["a.png", "b.jpg"]);
        assert_eq!(multiple.field(), "images");
        assert_eq!(multiple.to_value(), json!(["a.png", "b.jpg"]));
    }

    #[test]
    fn test_action_paths() {
        assert_eq!(Action::Account.to_string(), "account");
        assert_eq!(Action::Deflate.to_string(), "deflate");
        assert_eq!(Action::Limit.to_string(), "limit");
        assert_eq!(Action::Supported.to_string(), "supported");
    }
}
