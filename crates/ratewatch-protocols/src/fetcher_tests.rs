use super::*;

struct StaticFetcher;

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn navigate(&self, _url: &str) -> Result<(), FetchError> {
        Ok(())
    }

    async fn wait_visible(&self, _selector: &str, _timeout: Duration) -> Result<(), FetchError> {
        Ok(())
    }

    async fn read_text(&self, _selector: &str) -> Result<String, FetchError> {
        Ok("SGD 1.00 = MYR 3.1000".to_string())
    }
}

struct NoopHelper(u32);

#[async_trait]
impl HelperProcess for NoopHelper {
    fn pid(&self) -> Option<u32> {
        Some(self.0)
    }

    async fn terminate(&mut self, _grace: Duration) -> bool {
        true
    }

    fn kill(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

#[test]
fn test_launched_session_new() {
    let session = LaunchedSession::new(Arc::new(StaticFetcher));
    assert!(session.helpers.is_empty());
    assert!(!session.terminated.is_cancelled());
}

#[test]
fn test_launched_session_with_helpers() {
    let session = LaunchedSession::new(Arc::new(StaticFetcher))
        .with_helper(Box::new(NoopHelper(10)))
        .with_helper(Box::new(NoopHelper(11)));

    let pids: Vec<_> = session.helpers.iter().filter_map(|h| h.pid()).collect();
    assert_eq!(pids, vec![10, 11]);
}

#[test]
fn test_launched_session_shares_terminated_token() {
    let token = CancellationToken::new();
    let session = LaunchedSession::new(Arc::new(StaticFetcher)).with_terminated(token.clone());

    token.cancel();
    assert!(session.terminated.is_cancelled());
}

#[tokio::test]
async fn test_default_close_is_noop() {
    let fetcher = StaticFetcher;
    assert!(fetcher.close().await.is_ok());
    assert_eq!(
        fetcher.read_text("#rateStr").await.unwrap(),
        "SGD 1.00 = MYR 3.1000"
    );
}
