//! Constants for the download module (timeouts, identification, retry caps).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large documentation files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum Retry-After header value honored (5 minutes) to keep runs bounded.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/ctanmirror";

/// Default User-Agent for catalog and mirror requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("ctanmirror/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_identifies_tool_and_version() {
        let ua = default_user_agent();
        assert!(ua.starts_with("ctanmirror/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(PROJECT_UA_URL));
    }
}
