pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{safe_truncate_chars, truncate_with_ellipsis};
pub use url_utils::{canonicalize, is_same_site, normalized_host, parse_http_url};
