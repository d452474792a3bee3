//! Integration tests: supervisor against a local mock FAHClient.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use common::mock_daemon::{self, Behavior};
use fahcanary_core::control::CancelToken;
use fahcanary_core::greeting::{GreetingValidator, GREETING, READ_BUFFER_BYTES};
use fahcanary_core::retry::{BackoffPolicy, DialError, ErrorCategory};
use fahcanary_core::supervisor::{
    self, Dialer, Handshake, HandshakeResult, Supervisor, SupervisorConfig, TcpDialer,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// TCP dialer that counts how many dials were made.
#[derive(Default)]
struct CountingDialer {
    dials: AtomicU32,
}

impl CountingDialer {
    fn dials(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Dialer for CountingDialer {
    type Conn = TcpStream;

    async fn dial(&self, addr: &str) -> Result<TcpStream, DialError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        TcpDialer.dial(addr).await
    }
}

/// Dialer whose dial never completes.
struct HangingDialer;

impl Dialer for HangingDialer {
    type Conn = TcpStream;

    async fn dial(&self, _addr: &str) -> Result<TcpStream, DialError> {
        std::future::pending().await
    }
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        per_attempt_timeout: Duration::from_secs(2),
        max_attempts: 3,
        backoff: BackoffPolicy::with_unit(Duration::from_millis(1)),
        greeting: GreetingValidator::new(GREETING, READ_BUFFER_BYTES, Duration::from_millis(300)),
        ..SupervisorConfig::default()
    }
}

fn category(result: &HandshakeResult) -> Option<ErrorCategory> {
    match result {
        HandshakeResult::Failed(diag) => Some(diag.category()),
        _ => None,
    }
}

#[tokio::test]
async fn banner_yields_succeeded() {
    let addr = mock_daemon::start(Behavior::Greet);
    let sup = Supervisor::new(fast_config());
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert!(result.is_success(), "got {:?}", result);
}

#[tokio::test]
async fn banner_with_extra_bytes_yields_succeeded() {
    let mut bytes = b"# previous chatter\n".to_vec();
    bytes.extend_from_slice(GREETING.as_bytes());
    let addr = mock_daemon::start(Behavior::Send(bytes));
    let sup = Supervisor::new(fast_config());
    assert!(sup.run(&addr, &CancelToken::new()).await.is_success());
}

#[tokio::test]
async fn free_run_checks_with_tcp_defaults() {
    let addr = mock_daemon::start(Behavior::Greet);
    let result = supervisor::run(&addr, Duration::from_secs(2), 1, &CancelToken::new()).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn refused_is_not_retried_by_default() {
    let addr = mock_daemon::refused_address();
    let dialer = CountingDialer::default();
    let sup = Supervisor::with_dialer(&dialer, fast_config());
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::RefusedConnection));
    assert_eq!(dialer.dials(), 1);
    if let HandshakeResult::Failed(diag) = result {
        assert!(diag.message().contains(&addr));
    }
}

#[tokio::test]
async fn refused_with_retry_makes_exactly_max_attempts() {
    let addr = mock_daemon::refused_address();
    for max_attempts in [1u32, 3, 5] {
        let dialer = CountingDialer::default();
        let cfg = SupervisorConfig {
            max_attempts,
            retry_refused: true,
            ..fast_config()
        };
        let sup = Supervisor::with_dialer(&dialer, cfg);
        let result = sup.run(&addr, &CancelToken::new()).await;
        assert_eq!(category(&result), Some(ErrorCategory::RefusedConnection));
        assert_eq!(dialer.dials(), max_attempts);
    }
}

#[tokio::test]
async fn zero_max_attempts_still_dials_once() {
    let addr = mock_daemon::refused_address();
    let dialer = CountingDialer::default();
    let cfg = SupervisorConfig {
        max_attempts: 0,
        ..fast_config()
    };
    let sup = Supervisor::with_dialer(&dialer, cfg);
    let _ = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn unrelated_bytes_yield_protocol_mismatch() {
    let addr = mock_daemon::start(Behavior::Send(b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec()));
    let dialer = CountingDialer::default();
    let sup = Supervisor::with_dialer(&dialer, fast_config());
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ProtocolMismatch));
    assert_eq!(dialer.dials(), 1, "mismatch must not be retried");
}

#[tokio::test]
async fn silent_listener_yields_read_timeout() {
    let addr = mock_daemon::start(Behavior::Silent);
    let sup = Supervisor::new(fast_config());
    let started = Instant::now();
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ReadTimeout));
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Waits for the mock to report how the client left the connection.
fn client_released(watch: &std::sync::mpsc::Receiver<bool>) -> bool {
    watch
        .recv_timeout(Duration::from_secs(5))
        .expect("mock saw a connection")
}

#[tokio::test]
async fn socket_is_released_after_success() {
    let (addr, watch) = mock_daemon::start_watched(Behavior::Greet);
    let sup = Supervisor::new(fast_config());
    assert!(sup.run(&addr, &CancelToken::new()).await.is_success());
    assert!(client_released(&watch));
}

#[tokio::test]
async fn socket_is_released_after_protocol_mismatch() {
    let (addr, watch) = mock_daemon::start_watched(Behavior::Send(b"garbage".to_vec()));
    let sup = Supervisor::new(fast_config());
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ProtocolMismatch));
    assert!(client_released(&watch));
}

#[tokio::test]
async fn socket_is_released_after_read_timeout() {
    let (addr, watch) = mock_daemon::start_watched(Behavior::Silent);
    let sup = Supervisor::new(fast_config());
    let result = sup.run(&addr, &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ReadTimeout));
    assert!(client_released(&watch));
}

#[tokio::test]
async fn socket_is_released_when_cancelled_after_failed_attempt() {
    let (addr, watch) = mock_daemon::start_watched(Behavior::Silent);
    let cfg = SupervisorConfig {
        max_attempts: 1,
        ..fast_config()
    };
    let sup = Supervisor::new(cfg);
    let cancel = CancelToken::new();
    let result = sup.run(&addr, &cancel).await;
    assert_eq!(category(&result), Some(ErrorCategory::ReadTimeout));
    cancel.cancel();
    assert!(matches!(sup.run(&addr, &cancel).await, HandshakeResult::Cancelled));
    assert!(client_released(&watch));
    assert!(
        watch.recv_timeout(Duration::from_millis(200)).is_err(),
        "a cancelled run must not open a connection"
    );
}

#[tokio::test]
async fn cancel_before_start_makes_no_dials() {
    let addr = mock_daemon::start(Behavior::Greet);
    let dialer = CountingDialer::default();
    let sup = Supervisor::with_dialer(&dialer, fast_config());
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = sup.run(&addr, &cancel).await;
    assert!(matches!(result, HandshakeResult::Cancelled));
    assert_eq!(dialer.dials(), 0);
}

#[tokio::test]
async fn cancel_during_backoff_returns_promptly() {
    let addr = mock_daemon::refused_address();
    let dialer = CountingDialer::default();
    let cfg = SupervisorConfig {
        max_attempts: 5,
        retry_refused: true,
        backoff: BackoffPolicy::default(),
        ..fast_config()
    };
    let sup = Supervisor::with_dialer(&dialer, cfg);
    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };
    let started = Instant::now();
    let result = sup.run(&addr, &cancel).await;
    canceller.await.unwrap();
    assert!(matches!(result, HandshakeResult::Cancelled), "got {:?}", result);
    // The first backoff wait is 5s; cancellation must cut it short.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(dialer.dials(), 1);
}

#[tokio::test]
async fn cancel_aborts_in_flight_dial() {
    let cfg = SupervisorConfig {
        per_attempt_timeout: Duration::from_secs(30),
        ..fast_config()
    };
    let sup = Supervisor::with_dialer(HangingDialer, cfg);
    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };
    let started = Instant::now();
    let result = sup.run("127.0.0.1:36330", &cancel).await;
    canceller.await.unwrap();
    assert!(matches!(result, HandshakeResult::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn dial_timeout_is_reported_when_cancel_does_not_abort_dial() {
    let cfg = SupervisorConfig {
        per_attempt_timeout: Duration::from_millis(100),
        max_attempts: 1,
        cancel_aborts_dial: false,
        ..fast_config()
    };
    let sup = Supervisor::with_dialer(HangingDialer, cfg);
    let result = sup.run("127.0.0.1:36330", &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ConnectTimeout));
}

#[tokio::test]
async fn dial_timeouts_are_retried() {
    struct CountingHang(AtomicU32);
    impl Dialer for CountingHang {
        type Conn = TcpStream;
        async fn dial(&self, _addr: &str) -> Result<TcpStream, DialError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }
    let dialer = CountingHang(AtomicU32::new(0));
    let cfg = SupervisorConfig {
        per_attempt_timeout: Duration::from_millis(20),
        max_attempts: 3,
        ..fast_config()
    };
    let sup = Supervisor::with_dialer(&dialer, cfg);
    let result = sup.run("127.0.0.1:36330", &CancelToken::new()).await;
    assert_eq!(category(&result), Some(ErrorCategory::ConnectTimeout));
    assert_eq!(dialer.0.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn validated_stream_is_handed_to_caller() {
    let mut bytes = GREETING.as_bytes().to_vec();
    bytes.extend_from_slice(b"extra");
    let addr = mock_daemon::start(Behavior::Send(bytes));
    let cfg = SupervisorConfig {
        greeting: GreetingValidator::new(GREETING, GREETING.len(), Duration::from_secs(1)),
        ..fast_config()
    };
    let sup = Supervisor::new(cfg);
    match sup.run_with_stream(&addr, &CancelToken::new()).await {
        Handshake::Connected(mut stream) => {
            let mut rest = [0u8; 5];
            stream.read_exact(&mut rest).await.unwrap();
            assert_eq!(&rest, b"extra");
        }
        other => panic!("expected connection, got {:?}", other),
    }
}

#[tokio::test]
async fn targets_are_supervised_independently() {
    let good = mock_daemon::start(Behavior::Greet);
    let bad = mock_daemon::refused_address();
    let cancel = CancelToken::new();
    let tasks: Vec<_> = [good, bad]
        .into_iter()
        .map(|addr| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                Supervisor::new(fast_config()).run(&addr, &cancel).await
            })
        })
        .collect();
    let mut results = Vec::new();
    for t in tasks {
        results.push(t.await.unwrap());
    }
    assert!(results[0].is_success());
    assert_eq!(category(&results[1]), Some(ErrorCategory::RefusedConnection));
}
