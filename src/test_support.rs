//! Helpers shared by in-crate tests that need a local mock server.

pub(crate) mod socket_guard {
    use std::net::TcpListener;

    use wiremock::MockServer;

    /// Starts a mock server, or returns `None` when localhost sockets are unavailable.
    ///
    /// Set `CTANMIRROR_REQUIRE_SOCKET_TESTS=1` to panic instead of skipping.
    pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
        if TcpListener::bind("127.0.0.1:0").is_ok() {
            return Some(MockServer::start().await);
        }
        let required = std::env::var("CTANMIRROR_REQUIRE_SOCKET_TESTS")
            .is_ok_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        assert!(!required, "[socket-bound-test] cannot bind localhost socket");
        eprintln!("[socket-bound-test] cannot bind localhost socket; skipping test");
        None
    }
}
