//! End-to-end tests driving real processes through a session.
//!
//! These tests verify complete flows:
//! - Round trips through a line calculator
//! - Per-source ordering and closure completeness
//! - Timeout enforcement and idempotent shutdown

use std::time::{Duration, Instant};

use interactive::{Session, SessionConfig, SessionError, SessionState, SessionStatus};
use tokio::time::timeout;

const NO_ARGS: [&str; 0] = [];
const WAIT: Duration = Duration::from_secs(10);

/// Config for `bc`: a dumb terminal so line editing does not decorate the
/// output.
fn bc_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.env.insert("TERM".to_string(), "dumb".to_string());
    config
}

async fn next_line(session: &mut Session) -> Option<String> {
    timeout(WAIT, session.recv())
        .await
        .expect("timed out waiting for output")
}

async fn drain(session: &mut Session) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = next_line(session).await {
        lines.push(line);
    }
    lines
}

/// Reads until a line whose trimmed text equals `expected`.
async fn wait_for_line(session: &mut Session, expected: &str) {
    loop {
        match next_line(session).await {
            Some(line) if line.trim() == expected => return,
            Some(_) => continue,
            None => panic!("output closed before {expected:?} appeared"),
        }
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[tokio::test]
async fn test_calculator_round_trip() {
    let script = "while read expr; do echo $(($expr)); done";
    let mut calc = Session::start("sh", &["-c", script], None).unwrap();

    calc.write("1 + 1").await.unwrap();
    assert_eq!(next_line(&mut calc).await.as_deref(), Some("2"));

    calc.write("6 * 7").await.unwrap();
    assert_eq!(next_line(&mut calc).await.as_deref(), Some("42"));

    calc.exit().unwrap();
    assert_eq!(drain(&mut calc).await, Vec::<String>::new());

    let status = calc.wait().await;
    assert!(matches!(status, SessionStatus::Exited(_)), "got {status:?}");
    assert_eq!(calc.state(), SessionState::Closed);
}

#[tokio::test]
#[ignore = "requires bc on PATH"]
async fn test_bc_round_trip() {
    let mut bc = Session::start_with_config("bc", &["-q"], bc_config()).unwrap();

    bc.write("1 + 1").await.unwrap();
    wait_for_line(&mut bc, "2").await;

    bc.write("6 * 7").await.unwrap();
    wait_for_line(&mut bc, "42").await;

    bc.exit().unwrap();
    let rest = drain(&mut bc).await;
    assert!(rest.iter().all(|l| l.trim().is_empty()), "got {rest:?}");

    assert!(bc.wait().await.is_finished());
    assert_eq!(bc.state(), SessionState::Closed);
}

#[tokio::test]
#[ignore = "requires bc on PATH"]
async fn test_bc_quit_exits_cleanly() {
    let mut bc = Session::start_with_config("bc", &["-q"], bc_config()).unwrap();

    bc.write("2 ^ 10").await.unwrap();
    bc.write("quit").await.unwrap();

    let lines = drain(&mut bc).await;
    assert!(lines.iter().any(|l| l.trim() == "1024"), "got {lines:?}");
    assert_eq!(bc.wait().await, SessionStatus::Exited(0));
}

#[tokio::test]
async fn test_write_before_first_prompt() {
    // Input queues up even if the process has not started reading yet.
    let mut session = Session::start("sh", &["-c", "sleep 0.2; cat"], None).unwrap();

    session.write("early").await.unwrap();
    assert_eq!(next_line(&mut session).await.as_deref(), Some("early"));

    session.force_close().unwrap();
    drain(&mut session).await;
}

// =============================================================================
// Ordering and Closure Tests
// =============================================================================

#[tokio::test]
async fn test_lines_arrive_in_write_order() {
    let mut session = Session::start("cat", &NO_ARGS, None).unwrap();

    let expected: Vec<String> = (0..50).map(|i| format!("line-{i}")).collect();
    for line in &expected {
        session.write(line.as_str()).await.unwrap();
    }

    let mut received = Vec::new();
    while received.len() < expected.len() {
        received.push(next_line(&mut session).await.expect("output closed early"));
    }
    assert_eq!(received, expected);

    session.force_close().unwrap();
    drain(&mut session).await;
}

#[tokio::test]
async fn test_no_output_lost_before_close() {
    let script = "i=1; while [ $i -le 500 ]; do echo line-$i; i=$((i+1)); done";
    let mut session = Session::start("sh", &["-c", script], None).unwrap();

    let lines = drain(&mut session).await;
    let expected: Vec<String> = (1..=500).map(|i| format!("line-{i}")).collect();
    assert_eq!(lines, expected);
    assert_eq!(session.wait().await, SessionStatus::Exited(0));
}

#[tokio::test]
async fn test_slow_consumer_does_not_lose_lines() {
    let config = SessionConfig {
        output_capacity: 4,
        ..SessionConfig::default()
    };
    let script = "i=1; while [ $i -le 100 ]; do echo $i; i=$((i+1)); done";
    let mut session = Session::start_with_config("sh", &["-c", script], config).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let lines = drain(&mut session).await;
    assert_eq!(lines.len(), 100);
    assert_eq!(lines.last().map(String::as_str), Some("100"));
}

#[tokio::test]
async fn test_output_available_after_wait() {
    let mut session = Session::start("sh", &["-c", "echo kept"], None).unwrap();

    assert_eq!(timeout(WAIT, session.wait()).await.unwrap(), SessionStatus::Exited(0));
    assert_eq!(session.recv().await.as_deref(), Some("kept"));
    assert_eq!(session.recv().await, None);
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[tokio::test]
async fn test_timeout_terminates_process() {
    let limit = Duration::from_millis(500);
    let started = Instant::now();
    let mut session = Session::start_with_config(
        "cat",
        &NO_ARGS,
        SessionConfig {
            timeout: Some(limit),
            ..SessionConfig::default()
        },
    )
    .unwrap();

    tokio::time::sleep(limit + Duration::from_millis(500)).await;

    // The line is either refused or forwarded to a dead terminal.
    match session.write("1 + 1").await {
        Ok(()) | Err(SessionError::InputClosed) => {}
        Err(e) => panic!("unexpected write error: {e}"),
    }

    assert_eq!(drain(&mut session).await, Vec::<String>::new());
    assert_eq!(session.wait().await, SessionStatus::TimedOut);
    assert!(!session.is_running());
    assert!(started.elapsed() < limit + WAIT);
}

#[tokio::test]
async fn test_zero_timeout_means_unbounded() {
    let mut session = Session::start("sh", &["-c", "sleep 0.3; echo done"], Some(Duration::ZERO)).unwrap();

    assert_eq!(drain(&mut session).await, vec!["done"]);
    assert_eq!(session.wait().await, SessionStatus::Exited(0));
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[tokio::test]
async fn test_force_close_is_idempotent() {
    let mut session = Session::start("sh", &["-c", "echo once"], None).unwrap();

    assert_eq!(drain(&mut session).await, vec!["once"]);
    session.wait().await;

    for _ in 0..3 {
        assert!(session.force_close().is_ok());
    }
    assert_eq!(session.status(), SessionStatus::Exited(0));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_force_close_during_wait() {
    let mut session = Session::start("sleep", &["30"], None).unwrap();

    let killer = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.force_close().unwrap();
        session.force_close().unwrap();
    };
    let (status, ()) = tokio::join!(timeout(WAIT, session.wait()), killer);

    assert_eq!(status.unwrap(), SessionStatus::Killed);
    assert_eq!(drain(&mut session).await, Vec::<String>::new());
}

#[tokio::test]
async fn test_exit_interrupts_process() {
    let mut session = Session::start("sleep", &["30"], None).unwrap();

    session.exit().unwrap();
    drain(&mut session).await;

    let status = session.wait().await;
    assert!(matches!(status, SessionStatus::Exited(_)), "got {status:?}");
    assert!(matches!(session.write("x").await, Err(SessionError::InputClosed)));
}

#[tokio::test]
async fn test_independent_sessions() {
    let mut quiet = Session::start("cat", &NO_ARGS, None).unwrap();
    let mut loud = Session::start_with_config(
        "cat",
        &NO_ARGS,
        SessionConfig {
            verbose: true,
            ..SessionConfig::default()
        },
    )
    .unwrap();

    quiet.write("a").await.unwrap();
    loud.write("b").await.unwrap();
    assert_eq!(next_line(&mut quiet).await.as_deref(), Some("a"));
    assert_eq!(next_line(&mut loud).await.as_deref(), Some("b"));

    quiet.force_close().unwrap();
    assert_eq!(drain(&mut quiet).await, Vec::<String>::new());
    assert!(loud.is_running());

    loud.force_close().unwrap();
    drain(&mut loud).await;
}
