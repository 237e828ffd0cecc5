//! [`PageFetcher`] over a CDP page session.

use std::time::Duration;

use async_trait::async_trait;
use ratewatch_protocols::{FetchError, PageFetcher};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cdp::{CdpClient, PageSession};

/// Page fetcher backed by one browser and one page.
pub struct CdpPageFetcher {
    client: CdpClient,
    page: PageSession,
}

impl CdpPageFetcher {
    pub fn new(client: CdpClient, page: PageSession) -> Self {
        Self { client, page }
    }

    /// Cancelled when the browser connection drops.
    pub fn closed_token(&self) -> CancellationToken {
        self.client.closed_token()
    }
}

#[async_trait]
impl PageFetcher for CdpPageFetcher {
    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        Ok(self.page.navigate(url).await?)
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), FetchError> {
        Ok(self.page.wait_visible(selector, timeout).await?)
    }

    async fn read_text(&self, selector: &str) -> Result<String, FetchError> {
        Ok(self.page.inner_text(selector).await?)
    }

    async fn close(&self) -> Result<(), FetchError> {
        debug!(
            "Closing {} (page {})",
            self.client.browser(),
            self.page.target_id()
        );
        Ok(self.client.close_browser().await?)
    }
}
