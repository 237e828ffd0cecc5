use super::*;
use crate::test_support::{FakeLauncher, FetchScript};
use std::sync::atomic::Ordering;
use tokio::time::Instant;

fn sampler(script: Arc<FetchScript>) -> (RateSampler, Arc<FakeLauncher>, Arc<SessionSupervisor>) {
    let launcher = Arc::new(FakeLauncher::new(script));
    let supervisor = Arc::new(SessionSupervisor::new(
        launcher.clone(),
        CancellationToken::new(),
        Duration::ZERO,
    ));
    let sampler = RateSampler::new(
        supervisor.clone(),
        RateParser::default(),
        PageTarget::new("https://rates.test/sgd-to-myr", "#rateStr"),
    );
    (sampler, launcher, supervisor)
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt() {
    let (sampler, launcher, _) = sampler(FetchScript::new("SGD 1.00 = MYR 3.1234"));
    let started = Instant::now();

    let sample = sampler
        .sample_with_retry(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sample.value, 3.1234);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failures() {
    let (sampler, launcher, _) =
        sampler(FetchScript::new("SGD 1.00 = MYR 3.2").failing_first(2));
    let started = Instant::now();

    let sample = sampler
        .sample_with_retry(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sample.value, 3.2);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(launcher.script.navigate_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_after_max_attempts_without_trailing_delay() {
    let (sampler, launcher, supervisor) =
        sampler(FetchScript::new("SGD 1.00 = MYR 3.2").failing_first(10));
    let started = Instant::now();

    let err = sampler
        .sample_with_retry(&CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        MonitorError::SessionExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, MonitorError::Fetch(FetchError::Navigation(_))));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Two delays between three attempts.
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(launcher.script.navigate_calls.load(Ordering::SeqCst), 3);
    // The sampler never recreates.
    assert_eq!(supervisor.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_parse_failures_count_as_attempts() {
    let script = FetchScript::new("SGD 1.00 = MYR 3.3");
    script.push_labels(&["MYR abc", "loading..."]);
    let (sampler, _, _) = sampler(script);

    let sample = sampler
        .sample_with_retry(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sample.value, 3.3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_delay() {
    let (sampler, _, _) = sampler(FetchScript::new("SGD 1.00 = MYR 3.2").failing_first(10));
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        })
    };
    let started = Instant::now();
    let err = sampler.sample_with_retry(&cancel).await.unwrap_err();
    assert!(matches!(err, MonitorError::Cancelled));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    canceller.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight_attempt() {
    let (sampler, _, _) = sampler(FetchScript::new("SGD 1.00 = MYR 3.2").hanging());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        })
    };
    let err = sampler.sample_with_retry(&cancel).await.unwrap_err();
    assert!(matches!(err, MonitorError::Cancelled));
    canceller.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy() {
    let (sampler, _, _) = sampler(FetchScript::new("SGD 1.00 = MYR 3.2").failing_first(10));
    let sampler = sampler.with_policy(RetryPolicy::new(1, Duration::from_secs(5)));
    let started = Instant::now();

    let err = sampler
        .sample_with_retry(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::SessionExhausted { attempts: 1, .. }));
    assert_eq!(started.elapsed(), Duration::ZERO);
}
