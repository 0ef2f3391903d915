/// Where the BugWise API lives when nothing else is specified.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Settings shared by every request made through an
/// [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Prepended verbatim to every endpoint, so it shouldn't have a trailing
    /// slash.
    pub base_url: String,
    pub user_agent: String,
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Config {
            base_url: base_url.into(),
            ..Config::default()
        }
    }

    /// The full URL for an endpoint.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: String::from(DEFAULT_BASE_URL),
            user_agent: String::from(crate::DEFAULT_USER_AGENT),
        }
    }
}
