pub mod blocking;
pub mod callback;
pub mod client;
pub mod credential;
pub mod error;
pub mod options;
pub mod transport;
pub mod types;

pub use callback::decode_callback;
pub use client::{Client, ClientConfig};
pub use credential::Credentials;
pub use error::{Error, Result};
pub use options::{ALLOWED_OPTIONS, Options, merge_options};
pub use transport::{BASE_URL, HttpTransport, RawResponse, Transport};
pub use types::{Action, ImageSource, LastError, compression_types, selectors};
