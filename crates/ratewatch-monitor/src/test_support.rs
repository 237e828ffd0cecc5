//! Hand-written collaborator fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ratewatch_protocols::{
    ConnectionEvent, FetchError, GroupInfo, HelperProcess, LaunchedSession, MessagingClient,
    MessagingError, NotifyTarget, PageFetcher, SessionLauncher,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Shared behaviour of every fetcher a [`FakeLauncher`] produces.
#[derive(Default)]
pub struct FetchScript {
    /// Navigations that fail before the first success, across sessions.
    pub navigate_failures: AtomicU32,
    pub navigate_calls: AtomicU32,
    pub close_calls: AtomicU32,
    /// Navigation never completes.
    pub hang: AtomicBool,
    labels: Mutex<VecDeque<String>>,
    default_label: Mutex<String>,
}

impl FetchScript {
    pub fn new(label: &str) -> Arc<Self> {
        let script = Self::default();
        *script.default_label.lock() = label.to_string();
        Arc::new(script)
    }

    pub fn failing_first(self: Arc<Self>, failures: u32) -> Arc<Self> {
        self.navigate_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn hanging(self: Arc<Self>) -> Arc<Self> {
        self.hang.store(true, Ordering::SeqCst);
        self
    }

    /// Queue labels returned before falling back to the default.
    pub fn push_labels(&self, labels: &[&str]) {
        self.labels
            .lock()
            .extend(labels.iter().map(|l| l.to_string()));
    }

    fn next_label(&self) -> String {
        self.labels
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_label.lock().clone())
    }
}

pub struct FakeFetcher {
    script: Arc<FetchScript>,
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        self.script.navigate_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let remaining = self.script.navigate_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.script
                .navigate_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError::Navigation(format!("{url}: unreachable")));
        }
        Ok(())
    }

    async fn wait_visible(&self, _selector: &str, _timeout: Duration) -> Result<(), FetchError> {
        Ok(())
    }

    async fn read_text(&self, _selector: &str) -> Result<String, FetchError> {
        Ok(self.script.next_label())
    }

    async fn close(&self) -> Result<(), FetchError> {
        self.script.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct HelperLog {
    pub terminated: AtomicU32,
    pub killed: AtomicU32,
}

pub struct FakeHelper {
    pid: u32,
    exits_on_terminate: bool,
    log: Arc<HelperLog>,
}

impl FakeHelper {
    pub fn new(pid: u32, exits_on_terminate: bool, log: Arc<HelperLog>) -> Self {
        Self {
            pid,
            exits_on_terminate,
            log,
        }
    }
}

#[async_trait]
impl HelperProcess for FakeHelper {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn terminate(&mut self, _grace: Duration) -> bool {
        self.log.terminated.fetch_add(1, Ordering::SeqCst);
        self.exits_on_terminate
    }

    fn kill(&mut self) -> Result<(), FetchError> {
        self.log.killed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeLauncher {
    pub script: Arc<FetchScript>,
    pub helpers: Arc<HelperLog>,
    pub launches: AtomicU32,
    pub launch_failures: AtomicU32,
    /// Terminated tokens of launched sessions, in launch order.
    pub terminated: Mutex<Vec<CancellationToken>>,
    helpers_exit: bool,
}

impl FakeLauncher {
    pub fn new(script: Arc<FetchScript>) -> Self {
        Self {
            script,
            helpers: Arc::new(HelperLog::default()),
            launches: AtomicU32::new(0),
            launch_failures: AtomicU32::new(0),
            terminated: Mutex::new(Vec::new()),
            helpers_exit: true,
        }
    }

    /// Helpers ignore the cooperative terminate and must be killed.
    pub fn with_stubborn_helpers(mut self) -> Self {
        self.helpers_exit = false;
        self
    }

    pub fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Simulate the latest session dying on its own.
    pub fn kill_latest_session(&self) {
        if let Some(token) = self.terminated.lock().last() {
            token.cancel();
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<LaunchedSession, FetchError> {
        // Real launches suspend; concurrent callers must be able to interleave.
        tokio::task::yield_now().await;
        let remaining = self.launch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.launch_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError::LaunchFailed("no browser".to_string()));
        }
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        let terminated = CancellationToken::new();
        self.terminated.lock().push(terminated.clone());
        let fetcher = Arc::new(FakeFetcher {
            script: self.script.clone(),
        });
        Ok(LaunchedSession::new(fetcher)
            .with_helper(Box::new(FakeHelper::new(
                1000 + n,
                self.helpers_exit,
                self.helpers.clone(),
            )))
            .with_terminated(terminated))
    }
}

pub struct FakeClient {
    groups: Vec<GroupInfo>,
    list_fails: bool,
    list_calls: AtomicUsize,
    own_id: Option<String>,
    /// Recipients whose sends always fail.
    failing_recipients: Vec<String>,
    sent: Mutex<Vec<(NotifyTarget, String)>>,
    send_attempts: AtomicUsize,
    pub connect_failures: AtomicU32,
    pub connect_calls: AtomicU32,
    pub reauth_failures: AtomicU32,
    pub reauth_calls: AtomicU32,
    events: broadcast::Sender<ConnectionEvent>,
}

impl FakeClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            groups: Vec::new(),
            list_fails: false,
            list_calls: AtomicUsize::new(0),
            own_id: Some("1".to_string()),
            failing_recipients: Vec::new(),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            connect_failures: AtomicU32::new(0),
            connect_calls: AtomicU32::new(0),
            reauth_failures: AtomicU32::new(0),
            reauth_calls: AtomicU32::new(0),
            events,
        }
    }

    pub fn with_groups(mut self, groups: Vec<GroupInfo>) -> Self {
        self.groups = groups;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn with_own_id(mut self, own_id: Option<&str>) -> Self {
        self.own_id = own_id.map(str::to_string);
        self
    }

    pub fn failing_sends_to(mut self, recipient: &str) -> Self {
        self.failing_recipients.push(recipient.to_string());
        self
    }

    pub fn with_connect_failures(self, failures: u32) -> Self {
        self.connect_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn with_reauth_failures(self, failures: u32) -> Self {
        self.reauth_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(NotifyTarget, String)> {
        self.sent.lock().clone()
    }

    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        let remaining = counter.load(Ordering::SeqCst);
        if remaining > 0 {
            counter.store(remaining - 1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    fn name(&self) -> &str {
        "fake"
    }

    async fn connect(&self) -> Result<(), MessagingError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.connect_failures) {
            return Err(MessagingError::ConnectionFailed("offline".to_string()));
        }
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: &NotifyTarget,
        text: &str,
    ) -> Result<(), MessagingError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_recipients.iter().any(|r| r == recipient.id()) {
            return Err(MessagingError::SendFailed(format!("{recipient} rejected")));
        }
        self.sent.lock().push((recipient.clone(), text.to_string()));
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, MessagingError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails {
            return Err(MessagingError::GroupLookup("timeout".to_string()));
        }
        Ok(self.groups.clone())
    }

    fn own_id(&self) -> Option<String> {
        self.own_id.clone()
    }

    async fn reauthenticate(&self) -> Result<(), MessagingError> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.reauth_failures) {
            return Err(MessagingError::LoggedOut("token rejected".to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}
