pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{normalize_whitespace, preview, safe_truncate_chars};
pub use url_utils::{extract_note_id, is_valid_url, join_endpoint, resolve_href};
