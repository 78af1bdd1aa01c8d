mod api_key;

pub use api_key::{ApiKey, DEFAULT_API_KEY_HEADER};
