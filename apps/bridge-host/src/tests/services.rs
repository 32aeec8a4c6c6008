use crate::services::{HostInfo, LocalHostInfo, MAX_COUNT};

use bridge_core::RpcErrorCode;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[test]
fn given_host_info_when_pinged_then_pong() {
    let host = LocalHostInfo::new();

    assert_eq!(host.ping(), "pong");
    assert_eq!(host.echo("hello".to_string()), "hello");
}

#[test]
fn given_host_info_when_status_requested_then_names_this_package() {
    let status = LocalHostInfo::new().status();

    assert_eq!(status.name, "bridge-host");
    assert!(!status.version.is_empty());
}

/// **VALUE**: Verifies the streamed sequence is bounded.
///
/// **BUG THIS CATCHES**: Would catch a document asking for `u32::MAX` values
/// and parking a huge enumerator in the engine.
#[test]
fn given_limit_above_max_when_counting_then_invalid_request() {
    // GIVEN: A host
    let host = LocalHostInfo::new();

    // WHEN: Counting within and beyond the bound
    let small = host.count_to(3).expect("within bound");
    let too_big = host.count_to(MAX_COUNT + 1);

    // THEN: Only the bounded call succeeds
    assert_eq!(small, vec![1, 2, 3]);
    assert!(host.count_to(0).expect("zero is fine").is_empty());
    let err = too_big.expect_err("should be rejected");
    assert_eq!(err.code(), RpcErrorCode::InvalidRequest.code());
}

/// **VALUE**: Verifies a document cancellation interrupts the wait.
///
/// **WHY THIS MATTERS**: Without this the host keeps a task sleeping for the
/// full delay after the caller has given up.
#[tokio::test]
async fn given_cancellation_when_delayed_echo_waiting_then_cancelled_error() {
    // GIVEN: A long delay and a token that fires shortly
    let host = LocalHostInfo::new();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    // WHEN: Echoing
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        host.delayed_echo("late".to_string(), Duration::from_secs(30), token),
    )
    .await
    .expect("cancellation should end the wait");

    // THEN: Cancelled
    let err = result.expect_err("should be cancelled");
    assert_eq!(err.code(), RpcErrorCode::Cancelled.code());
}

#[tokio::test]
async fn given_short_delay_when_delayed_echo_then_message_returned() {
    let host = LocalHostInfo::new();

    let echoed = host
        .delayed_echo("soon".to_string(), Duration::from_millis(5), CancellationToken::new())
        .await
        .expect("should complete");

    assert_eq!(echoed, "soon");
}
