//! Site handlers: the plugin contract, the registry that resolves a URL to a
//! handler, the trust policy, and the generic fallback.

pub mod generic;
pub mod js_scripts;
pub mod registry;
pub mod traits;
pub mod trust;

pub use generic::{GenericHandler, page_meta_from_html, parse_srcset};
pub use registry::HandlerRegistry;
pub use traits::{
    DEFAULT_LOAD_MORE_SELECTORS, DEFAULT_PRIORITY, DEFAULT_SIZE_SUBSTITUTIONS, Pagination,
    SiteHandler, Strategy,
};
pub use trust::{TrustPolicy, default_is_cdn_host};
