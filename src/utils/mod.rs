pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{
    canonical_media_url, file_stem_of, host_of, is_valid_url, normalize_page_url,
    registrable_domain, resolve_url, same_registrable_domain,
};
