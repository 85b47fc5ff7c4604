//! Construction-time settings for the client.
//!
//! # Design
//! `ClientConfig` is a plain builder: `new` takes the only required value,
//! the contract id, and `with_*` methods override defaults. Everything the
//! library needs arrives here explicitly; reading credentials or contract
//! ids from the environment is left to the caller (see the `unipolmove`
//! binary). A page cap of zero is unrepresentable.

use std::num::NonZeroU32;
use std::time::Duration;

use uuid::Uuid;

use crate::session::SessionState;
use crate::types::ApiKeys;

pub const DEFAULT_BASE_URL: &str = "https://www.unipolmove.it";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:144.0) Gecko/20100101 Firefox/144.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_PAGES: NonZeroU32 = match NonZeroU32::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Construction-time settings for [`UnipolMoveClient`](crate::UnipolMoveClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Contract identifier used in every API path, e.g. `P000000000`.
    pub contract_id: String,
    pub base_url: String,
    /// Path of the login form; the service does not document it.
    pub login_path: String,
    /// Value of `X-UNIPOL-SESSIONID`.
    pub session_id: String,
    /// Cookies from an earlier login, to skip `login()`.
    pub session: Option<SessionState>,
    /// Gateway keys; fetched from the environment document when absent.
    pub api_keys: Option<ApiKeys>,
    pub user_agent: String,
    pub timeout: Duration,
    /// Upper bound on full pages accepted by `fetch_all_movements`. One
    /// extra request is allowed to observe the terminating short page.
    pub max_pages: NonZeroU32,
}

impl ClientConfig {
    pub fn new(contract_id: impl Into<String>) -> Self {
        Self {
            contract_id: contract_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            session_id: Uuid::new_v4().to_string(),
            session: None,
            api_keys: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_session_cookies(
        mut self,
        mrh_session: impl Into<String>,
        last_mrh_session: impl Into<String>,
    ) -> Self {
        self.session = Some(SessionState::new(mrh_session, last_mrh_session));
        self
    }

    pub fn with_api_keys(mut self, keys: ApiKeys) -> Self {
        self.api_keys = Some(keys);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: NonZeroU32) -> Self {
        self.max_pages = max_pages;
        self
    }
}
