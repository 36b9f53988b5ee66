use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

static BACKEND_HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build HTTP client")
});

/// Shared client; per-request timeouts are set by each backend.
pub fn get_http_client() -> &'static Client {
    &BACKEND_HTTP_CLIENT
}
