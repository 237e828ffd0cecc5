//! CDP page session for interacting with a single page.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::debug;

use super::connection::Connection;
use super::error::CdpError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A session attached to a single page/target.
pub struct PageSession {
    target_id: String,
    session_id: String,
    conn: Arc<Connection>,
}

impl PageSession {
    pub(crate) fn new(target_id: String, session_id: String, conn: Arc<Connection>) -> Self {
        Self {
            target_id,
            session_id,
            conn,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.conn.call(method, params, Some(&self.session_id)).await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Navigate to URL and wait for the document to load.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText") {
            return Err(CdpError::NavigationFailed(
                error.as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Wait for page load.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let deadline = Instant::now() + LOAD_TIMEOUT;

        loop {
            let result = self.evaluate("document.readyState").await?;
            if matches!(result.as_str(), Some("complete" | "interactive")) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Evaluate JavaScript and return the result by value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    /// Poll until `selector` matches a rendered, visible element.
    pub async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), CdpError> {
        let expression = visibility_script(selector)?;
        let deadline = Instant::now() + timeout;

        loop {
            if self.evaluate(&expression).await?.as_bool() == Some(true) {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(CdpError::ElementNotFound(format!(
                    "{} not visible after {:?}",
                    selector, timeout
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Rendered text of the first element matching `selector`.
    pub async fn inner_text(&self, selector: &str) -> Result<String, CdpError> {
        let expression = text_script(selector)?;
        match self.evaluate(&expression).await? {
            Value::String(text) => Ok(text),
            _ => Err(CdpError::ElementNotFound(selector.to_string())),
        }
    }
}

pub(crate) fn visibility_script(selector: &str) -> Result<String, CdpError> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (!el) return false; \
         const style = window.getComputedStyle(el); \
         if (style.visibility === 'hidden' || style.display === 'none') return false; \
         const rect = el.getBoundingClientRect(); \
         return rect.width > 0 && rect.height > 0; }})()"
    ))
}

pub(crate) fn text_script(selector: &str) -> Result<String, CdpError> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        "(() => {{ const el = document.querySelector({selector}); \
         return el ? el.innerText : null; }})()"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_quoted() {
        let script = visibility_script("#rateStr").unwrap();
        assert!(script.contains(r##"document.querySelector("#rateStr")"##));
    }

    #[test]
    fn test_selector_quotes_are_escaped() {
        let script = text_script(r#"div[data-x="a"]"#).unwrap();
        assert!(script.contains(r#"querySelector("div[data-x=\"a\"]")"#));
        assert!(script.contains("innerText"));
    }
}
