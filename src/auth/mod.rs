//! Per-site authentication: credential loading, cookie handling, login and
//! session persistence.

pub mod authenticator;
pub mod cookies;
pub mod credentials;
pub mod session_store;

pub use authenticator::{
    AuthMethod, AuthResult, DEFAULT_LOGIN_FORM_SELECTORS, DEFAULT_SUCCESS_SELECTORS,
    ProbeOutcome, SessionAuthenticator,
};
pub use cookies::{CookieEntry, SameSite, load_cookie_file, parse_cookie_json, to_netscape, write_netscape_file};
pub use credentials::{
    Credential, CredentialStore, FormSelectors, LoginCredentials, LoginStep, StepAction,
};
pub use session_store::{SessionStore, StoredSession};
