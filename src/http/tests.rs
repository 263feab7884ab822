use super::*;
use crate::args::{HttpMethod, Pacing};
use crate::config::{RequestBody, TestConfiguration};
use crate::metrics::{ErrorKind, RequestOutcome};
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Records the instant each index was sent and how many sends overlapped.
struct RecordingSender {
    started: Instant,
    sends: Mutex<Vec<(u64, Duration)>>,
    hold: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingSender {
    fn new(hold: Duration) -> Self {
        Self {
            started: Instant::now(),
            sends: Mutex::new(Vec::new()),
            hold,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn sends(&self) -> Result<Vec<(u64, Duration)>, String> {
        let mut sends = self
            .sends
            .lock()
            .map_err(|err| format!("lock poisoned: {}", err))?
            .clone();
        sends.sort_by_key(|(index, _)| *index);
        Ok(sends)
    }
}

#[async_trait]
impl RequestSender for RecordingSender {
    async fn send(&self, index: u64) -> Result<ResponseSummary, ErrorKind> {
        let now = self.current.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Ok(mut sends) = self.sends.lock() {
            sends.push((index, self.started.elapsed()));
        }
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ResponseSummary {
            status: 200,
            body_bytes: 2,
        })
    }
}

async fn dispatch_all(
    dispatcher: Arc<Dispatcher>,
    requests: u64,
) -> Result<Vec<RequestOutcome>, String> {
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();
    for index in 0..requests {
        let dispatcher = Arc::clone(&dispatcher);
        let stop_rx = stop_rx.clone();
        tasks.spawn(async move { dispatcher.dispatch(index, stop_rx).await });
    }
    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) => return Err("request was not dispatched".to_owned()),
            Err(err) => return Err(format!("task failed: {}", err)),
        }
    }
    Ok(outcomes)
}

#[test]
fn staircase_releases_whole_second_blocks() -> Result<(), String> {
    let schedule = RateSchedule::new(3, Pacing::Staircase);
    let expected = [
        (0, 0),
        (1, 0),
        (2, 0),
        (3, 1),
        (5, 1),
        (6, 2),
        (7, 2),
        (30, 10),
    ];
    for (index, secs) in expected {
        let delay = schedule.dispatch_delay(index);
        if delay != Duration::from_secs(secs) {
            return Err(format!(
                "index {} expected {}s, got {:?}",
                index, secs, delay
            ));
        }
    }
    Ok(())
}

#[test]
fn even_pacing_spreads_requests_within_the_second() -> Result<(), String> {
    let schedule = RateSchedule::new(4, Pacing::Even);
    let expected = [
        (0, Duration::ZERO),
        (1, Duration::from_millis(250)),
        (2, Duration::from_millis(500)),
        (5, Duration::from_millis(1250)),
    ];
    for (index, delay) in expected {
        let actual = schedule.dispatch_delay(index);
        if actual != delay {
            return Err(format!(
                "index {} expected {:?}, got {:?}",
                index, delay, actual
            ));
        }
    }
    Ok(())
}

#[test]
fn zero_rate_is_treated_as_one() -> Result<(), String> {
    let schedule = RateSchedule::new(0, Pacing::Staircase);
    if schedule.rate() != 1 || schedule.dispatch_delay(4) != Duration::from_secs(4) {
        return Err(format!("Unexpected schedule: {:?}", schedule));
    }
    Ok(())
}

#[test]
fn no_second_window_exceeds_the_rate() -> Result<(), String> {
    for pacing in [Pacing::Staircase, Pacing::Even] {
        for rate in [1_u64, 2, 3, 7, 10] {
            let schedule = RateSchedule::new(rate, pacing);
            let mut per_second = std::collections::BTreeMap::<u64, u64>::new();
            for index in 0..(rate * 5 + 3) {
                let second = schedule.dispatch_delay(index).as_secs();
                let count = per_second.entry(second).or_insert(0);
                *count += 1;
            }
            if let Some((second, count)) = per_second.iter().find(|(_, count)| **count > rate) {
                return Err(format!(
                    "{:?} rate {} released {} in second {}",
                    pacing, rate, count, second
                ));
            }
        }
    }
    Ok(())
}

#[test]
fn limiter_blocks_at_capacity_and_releases_on_drop() -> Result<(), String> {
    run_async_test(async {
        let limiter = ConcurrencyLimiter::new(2);
        let first = limiter.acquire().await.ok_or("first permit")?;
        let second = limiter.acquire().await.ok_or("second permit")?;
        if limiter.in_flight() != 2 {
            return Err(format!("Expected 2 in flight, got {}", limiter.in_flight()));
        }

        let blocked = tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await;
        if blocked.is_ok() {
            return Err("Expected third acquire to wait".to_owned());
        }

        drop(first);
        let third = tokio::time::timeout(Duration::from_millis(200), limiter.acquire())
            .await
            .map_err(|_err| "Expected a slot after release".to_owned())?;
        if third.is_none() {
            return Err("Expected a permit after release".to_owned());
        }
        drop(second);
        drop(third);

        if limiter.in_flight() != 0 || limiter.peak() != 2 {
            return Err(format!(
                "Unexpected gauge: in_flight={}, peak={}",
                limiter.in_flight(),
                limiter.peak()
            ));
        }
        Ok(())
    })
}

#[test]
fn closed_limiter_refuses_new_permits() -> Result<(), String> {
    run_async_test(async {
        let limiter = ConcurrencyLimiter::new(1);
        let held = limiter.acquire().await.ok_or("permit")?;
        limiter.close();
        if !limiter.is_closed() {
            return Err("Expected limiter to report closed".to_owned());
        }
        if limiter.acquire().await.is_some() {
            return Err("Expected no permit after close".to_owned());
        }
        drop(held);
        if limiter.in_flight() != 0 {
            return Err("Expected held permit to release after close".to_owned());
        }
        Ok(())
    })
}

#[test]
fn dispatcher_follows_staircase_schedule() -> Result<(), String> {
    run_async_test(async {
        tokio::time::pause();
        let sender = Arc::new(RecordingSender::new(Duration::ZERO));
        let dispatcher = Arc::new(Dispatcher::new(
            sender.clone(),
            RateSchedule::new(2, Pacing::Staircase),
            ConcurrencyLimiter::new(10),
        ));

        let outcomes = dispatch_all(dispatcher, 6).await?;
        if outcomes.len() != 6 || !outcomes.iter().all(RequestOutcome::is_success) {
            return Err(format!("Unexpected outcomes: {:?}", outcomes));
        }

        let seconds: Vec<u64> = sender
            .sends()?
            .iter()
            .map(|(_, offset)| offset.as_secs())
            .collect();
        if seconds != vec![0, 0, 1, 1, 2, 2] {
            return Err(format!("Unexpected send offsets: {:?}", seconds));
        }
        Ok(())
    })
}

#[test]
fn dispatcher_never_exceeds_concurrency() -> Result<(), String> {
    run_async_test(async {
        tokio::time::pause();
        let sender = Arc::new(RecordingSender::new(Duration::from_millis(300)));
        let limiter = ConcurrencyLimiter::new(3);
        let dispatcher = Arc::new(Dispatcher::new(
            sender.clone(),
            RateSchedule::new(100, Pacing::Staircase),
            limiter.clone(),
        ));

        let outcomes = dispatch_all(dispatcher, 20).await?;
        if outcomes.len() != 20 {
            return Err(format!("Expected 20 outcomes, got {}", outcomes.len()));
        }
        let observed = sender.peak.load(Ordering::SeqCst);
        if observed > 3 || limiter.peak() > 3 {
            return Err(format!(
                "Concurrency exceeded: sender saw {}, limiter saw {}",
                observed,
                limiter.peak()
            ));
        }
        if limiter.peak() != 3 {
            return Err(format!("Expected limiter to fill up, peak {}", limiter.peak()));
        }
        if outcomes
            .iter()
            .any(|outcome| outcome.elapsed < Duration::from_millis(300))
        {
            return Err("Latency should cover the whole send".to_owned());
        }
        Ok(())
    })
}

#[test]
fn latency_clock_starts_after_slot_is_granted() -> Result<(), String> {
    run_async_test(async {
        tokio::time::pause();
        let sender = Arc::new(RecordingSender::new(Duration::from_millis(500)));
        let dispatcher = Arc::new(Dispatcher::new(
            sender,
            RateSchedule::new(10, Pacing::Staircase),
            ConcurrencyLimiter::new(1),
        ));

        let outcomes = dispatch_all(dispatcher, 4).await?;
        for outcome in &outcomes {
            let waited = outcome.elapsed;
            if waited < Duration::from_millis(500) || waited >= Duration::from_millis(505) {
                return Err(format!("Unexpected latency: {:?}", waited));
            }
        }
        Ok(())
    })
}

#[test]
fn raised_stop_flag_skips_pending_requests() -> Result<(), String> {
    run_async_test(async {
        tokio::time::pause();
        let sender = Arc::new(RecordingSender::new(Duration::ZERO));
        let dispatcher = Dispatcher::new(
            sender.clone(),
            RateSchedule::new(1, Pacing::Staircase),
            ConcurrencyLimiter::new(1),
        );
        let (stop_tx, stop_rx) = watch::channel(false);

        let first = dispatcher.dispatch(0, stop_rx.clone()).await;
        if first.is_none() {
            return Err("Expected first request to run".to_owned());
        }

        let pending = dispatcher.dispatch(5, stop_rx);
        let stopper = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stop_tx.send_replace(true);
        };
        let (skipped, ()) = tokio::join!(pending, stopper);
        if skipped.is_some() {
            return Err("Expected stopped request to be skipped".to_owned());
        }
        if sender.sends()?.len() != 1 {
            return Err("Expected exactly one send".to_owned());
        }
        Ok(())
    })
}

async fn spawn_stub(response: &'static str) -> Result<(String, oneshot::Receiver<String>), String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("addr failed: {}", err))?;
    let (request_tx, request_rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        loop {
            let Ok(read) = socket.read(&mut buf).await else {
                return;
            };
            if read == 0 {
                break;
            }
            request.extend_from_slice(buf.get(..read).unwrap_or_default());
            if request_complete(&request) {
                break;
            }
        }
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        let _shutdown = socket.shutdown().await;
        drop(request_tx.send(String::from_utf8_lossy(&request).into_owned()));
    });
    Ok((format!("http://{}/", addr), request_rx))
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= content_length
}

fn local_config(url: &str, method: HttpMethod) -> Result<TestConfiguration, String> {
    TestConfiguration::new(url, method, 1, 1, 1)
        .and_then(|config| {
            config.with_timeouts(Duration::from_secs(2), Duration::from_millis(500))
        })
        .map_err(|err| err.to_string())
}

#[test]
fn http_sender_reports_status_and_body_size() -> Result<(), String> {
    run_async_test(async {
        let (url, request_rx) =
            spawn_stub("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
                .await?;
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;

        let summary = sender.send(0).await.map_err(|kind| kind.to_string())?;
        if summary != (ResponseSummary { status: 200, body_bytes: 5 }) {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        let request = request_rx
            .await
            .map_err(|err| format!("stub dropped: {}", err))?;
        if !request.starts_with("GET / HTTP/1.1") || !request.contains("volley-loadtest/") {
            return Err(format!("Unexpected request: {}", request));
        }
        Ok(())
    })
}

#[test]
fn http_sender_keeps_error_statuses_as_responses() -> Result<(), String> {
    run_async_test(async {
        let (url, _request_rx) =
            spawn_stub("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await?;
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;

        let summary = sender.send(0).await.map_err(|kind| kind.to_string())?;
        if summary.status != 503 || summary.body_bytes != 0 {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        Ok(())
    })
}

#[test]
fn http_sender_posts_json_payload() -> Result<(), String> {
    run_async_test(async {
        let (url, request_rx) =
            spawn_stub("HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await?;
        let config = local_config(&url, HttpMethod::Post)?
            .with_headers(vec![("X-Trace".to_owned(), "abc".to_owned())])
            .map_err(|err| err.to_string())?
            .with_body(RequestBody::Json(serde_json::json!({ "name": "volley" })));
        let sender = HttpSender::new(&config).map_err(|err| err.to_string())?;

        let summary = sender.send(0).await.map_err(|kind| kind.to_string())?;
        if summary.status != 201 {
            return Err(format!("Unexpected status: {}", summary.status));
        }
        let request = request_rx
            .await
            .map_err(|err| format!("stub dropped: {}", err))?
            .to_ascii_lowercase();
        let ok = request.starts_with("post / http/1.1")
            && request.contains("content-type: application/json")
            && request.contains("x-trace: abc")
            && request.contains(r#"{"name":"volley"}"#);
        if !ok {
            return Err(format!("Unexpected request: {}", request));
        }
        Ok(())
    })
}

#[test]
fn http_sender_posts_raw_bytes_untouched() -> Result<(), String> {
    run_async_test(async {
        let (url, request_rx) =
            spawn_stub("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await?;
        let config = local_config(&url, HttpMethod::Post)?
            .with_body(RequestBody::Raw(b"id=7&tag=x".to_vec()));
        let sender = HttpSender::new(&config).map_err(|err| err.to_string())?;

        let summary = sender.send(0).await.map_err(|kind| kind.to_string())?;
        if summary.status != 200 {
            return Err(format!("Unexpected status: {}", summary.status));
        }
        let request = request_rx
            .await
            .map_err(|err| format!("stub dropped: {}", err))?;
        let lowered = request.to_ascii_lowercase();
        let ok = lowered.starts_with("post / http/1.1")
            && lowered.contains("content-length: 10")
            && !lowered.contains("application/json")
            && request.ends_with("\r\n\r\nid=7&tag=x");
        if !ok {
            return Err(format!("Unexpected request: {}", request));
        }
        Ok(())
    })
}

#[test]
fn http_sender_classifies_non_http_reply_as_protocol_error() -> Result<(), String> {
    run_async_test(async {
        let (url, _request_rx) = spawn_stub("THIS IS NOT HTTP\r\n\r\n").await?;
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;
        match sender.send(0).await {
            Err(ErrorKind::ProtocolError) => Ok(()),
            other => Err(format!("Expected ProtocolError, got {:?}", other)),
        }
    })
}

#[test]
fn http_sender_classifies_truncated_body_as_protocol_error() -> Result<(), String> {
    run_async_test(async {
        let (url, _request_rx) = spawn_stub(
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort",
        )
        .await?;
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;
        match sender.send(0).await {
            Err(ErrorKind::ProtocolError) => Ok(()),
            other => Err(format!("Expected ProtocolError, got {:?}", other)),
        }
    })
}

#[test]
fn http_sender_classifies_refused_connection() -> Result<(), String> {
    run_async_test(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|err| format!("bind failed: {}", err))?;
        let addr = listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?;
        drop(listener);

        let url = format!("http://{}/", addr);
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;
        match sender.send(0).await {
            Err(ErrorKind::ConnectionError) => Ok(()),
            other => Err(format!("Expected ConnectionError, got {:?}", other)),
        }
    })
}

#[test]
fn http_sender_classifies_slow_response_as_timeout() -> Result<(), String> {
    run_async_test(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|err| format!("bind failed: {}", err))?;
        let addr = listener
            .local_addr()
            .map_err(|err| format!("addr failed: {}", err))?;
        let server = tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });

        let url = format!("http://{}/", addr);
        let sender = HttpSender::new(&local_config(&url, HttpMethod::Get)?)
            .map_err(|err| err.to_string())?;
        let result = sender.send(0).await;
        server.abort();
        match result {
            Err(ErrorKind::Timeout) => Ok(()),
            other => Err(format!("Expected Timeout, got {:?}", other)),
        }
    })
}

#[test]
fn method_maps_to_reqwest_method() -> Result<(), String> {
    let pairs = [
        (HttpMethod::Get, reqwest::Method::GET),
        (HttpMethod::Head, reqwest::Method::HEAD),
        (HttpMethod::Options, reqwest::Method::OPTIONS),
        (HttpMethod::Patch, reqwest::Method::PATCH),
    ];
    for (method, expected) in pairs {
        let mapped: reqwest::Method = method.into();
        if mapped != expected {
            return Err(format!("{:?} mapped to {}", method, mapped));
        }
    }
    Ok(())
}
