//! CDP browser-level client.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::Connection;
use super::error::CdpError;
use super::protocol::{BrowserVersion, PageInfo};
use super::session::PageSession;

/// CDP client for one browser instance.
///
/// Connects to Chrome's browser endpoint and opens page sessions that share
/// its WebSocket.
pub struct CdpClient {
    /// HTTP endpoint for page discovery.
    http_endpoint: String,
    /// Browser identification string, e.g. `HeadlessChrome/126.0`.
    browser: String,
    http: reqwest::Client,
    conn: Arc<Connection>,
}

impl CdpClient {
    /// Connect to Chrome at the given HTTP endpoint (e.g. `http://127.0.0.1:40123`).
    ///
    /// `command_timeout` bounds every CDP call made through this client and
    /// its pages.
    pub async fn connect(endpoint: &str, command_timeout: Duration) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(command_timeout)
            .build()?;

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);

        let version: BrowserVersion = http
            .get(&version_url)
            .send()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;

        let conn = Connection::open(&version.web_socket_debugger_url, command_timeout).await?;
        debug!("Connected to browser: {}", version.browser);

        Ok(Self {
            http_endpoint,
            browser: version.browser,
            http,
            conn: Arc::new(conn),
        })
    }

    /// Browser identification string.
    pub fn browser(&self) -> &str {
        &self.browser
    }

    /// Cancelled when the browser connection drops.
    pub fn closed_token(&self) -> CancellationToken {
        self.conn.closed()
    }

    /// Create a new page and attach a session to it.
    pub async fn new_page(&self) -> Result<PageSession, CdpError> {
        // Chrome requires PUT method for /json/new
        let create_url = format!("{}/json/new", self.http_endpoint);
        let page_info: PageInfo = self.http.put(&create_url).send().await?.json().await?;
        debug!("Created new page: {} - {}", page_info.id, page_info.url);

        let result = self
            .conn
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": page_info.id,
                    "flatten": true
                })),
                None,
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let session = PageSession::new(page_info.id, session_id, self.conn.clone());
        session.enable_domains().await?;
        Ok(session)
    }

    /// Ask the browser to exit.
    pub async fn close_browser(&self) -> Result<(), CdpError> {
        match self.conn.call("Browser.close", None, None).await {
            // The browser may drop the socket before answering.
            Ok(_) | Err(CdpError::SessionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
