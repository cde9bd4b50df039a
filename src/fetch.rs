//! Content fetcher: a single blocking GET with a bounded timeout.
//!
//! There is no retry. Transport failures, timeouts, malformed URLs and
//! non-2xx statuses all surface as [`Error::Request`].

use crate::{Error, FetchConfig, Result};
use log::debug;
use reqwest::blocking::Client;
use std::time::Duration;

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Fetch the raw markup behind `url`.
    pub fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Request(format!("Invalid URL {}: {}", url, e)))?;

        debug!("GET {} (timeout {}ms)", parsed, self.config.timeout_ms);
        let resp = self
            .client
            .get(parsed)
            .header("User-Agent", self.config.user_agent.clone())
            .send()
            .map_err(|e| Error::Request(format!("Failed to fetch {}: {}", url, e)))?;

        let resp = resp
            .error_for_status()
            .map_err(|e| Error::Request(e.to_string()))?;

        let body = resp
            .text()
            .map_err(|e| Error::Request(format!("Failed to read response body: {}", e)))?;
        debug!("fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_once(status: u16, body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();

        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn fetch_returns_body() {
        let url = serve_once(200, "<html><body>Hello world</body></html>");
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let body = fetcher.fetch(&url).expect("fetch should succeed");
        assert!(body.contains("Hello world"));
    }

    #[test]
    fn non_success_status_is_request_error() {
        let url = serve_once(404, "Not Found");
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, Error::Request(_)), "got {:?}", err);
    }

    #[test]
    fn malformed_url_is_request_error() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }

    #[test]
    fn timeout_is_request_error() {
        // Accept the connection but never answer
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                std::thread::sleep(Duration::from_millis(1500));
                let _ = request.respond(tiny_http::Response::from_string("late"));
            }
        });

        let config = FetchConfig {
            timeout_ms: 200,
            ..Default::default()
        };
        let fetcher = Fetcher::new(config).unwrap();
        let err = fetcher.fetch(&format!("http://{}", addr)).unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
