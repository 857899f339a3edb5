use std::time::Duration;

use crate::{debounce::SEARCH_DEBOUNCE, pagination::PaginationConfig};

/// The state database used when none is given.
pub const DEFAULT_STATE_DB: &str = "tally_state.db";

/// How long to wait for the Transactions API before giving up on a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings shared by the session and the HTTP client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the Transactions API, e.g. `http://localhost:8080/api`.
    pub api_url: String,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Path to the SQLite file the query state is kept in.
    pub state_db: String,
    /// Request timeout for the Transactions API.
    pub request_timeout: Duration,
    /// Quiescence window for search input.
    pub search_debounce: Duration,
    /// Page defaults and the width of the page indicator.
    pub pagination: PaginationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_owned(),
            api_token: None,
            state_db: DEFAULT_STATE_DB.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            search_debounce: SEARCH_DEBOUNCE,
            pagination: PaginationConfig::default(),
        }
    }
}

impl AppConfig {
    /// The number of transactions requested per page.
    pub fn page_size(&self) -> u64 {
        self.pagination.default_page_size
    }
}
