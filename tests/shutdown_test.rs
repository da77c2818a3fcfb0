//! Tests for graceful shutdown and drain.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use render_queue::{Context, ContextError, Job, QueueError, QueueState, RenderQueue};
use tokio_util::sync::CancellationToken;

use common::gated_render;

#[test]
fn test_initial_state_is_open() {
    let (render, _gate, _recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();
    assert_eq!(queue.state(), QueueState::Open);
    assert!(queue.is_accepting());
}

#[test]
fn test_idle_shutdown_completes_immediately() {
    let (render, _gate, recorder) = gated_render();
    let queue = RenderQueue::new(3, render).unwrap();

    queue.shutdown(&Context::with_timeout(Duration::from_millis(500))).unwrap();
    assert_eq!(queue.state(), QueueState::Closed);
    assert_eq!(recorder.calls(), 0);
}

#[test]
fn test_submit_after_shutdown_is_closed() {
    let (render, _gate, _recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();
    queue.shutdown(&Context::background()).unwrap();

    for _ in 0..3 {
        let err = queue
            .submit(&Context::background(), Job::interactive("post/1", "x"), None)
            .unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }
}

#[test]
fn test_drain_completes_accepted_work() {
    let (render, gate, recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();
    let ctx = Context::background();

    queue.submit(&ctx, Job::background("busy", "block"), None).unwrap();
    gate.wait_started();
    let receivers: Vec<_> = (0..4)
        .map(|i| queue.submit_with_response(&ctx, Job::background(format!("k{i}"), format!("p{i}"))).unwrap().1)
        .collect();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        gate.release();
        gate
    });

    queue.shutdown(&Context::with_timeout(Duration::from_secs(5))).unwrap();
    assert_eq!(queue.state(), QueueState::Closed);
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.active(), 0);
    assert_eq!(recorder.calls(), 5);

    for (i, mut rx) in receivers.into_iter().enumerate() {
        assert_eq!(rx.try_recv().unwrap().unwrap().output, format!("<p>p{i}</p>"));
    }
    let _ = releaser.join();
}

#[test]
fn test_shutdown_deadline_reports_outstanding_work() {
    let (render, gate, _recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();
    let ctx = Context::background();

    queue.submit(&ctx, Job::background("busy", "block"), None).unwrap();
    gate.wait_started();
    let (_, late) = queue.submit_with_response(&ctx, Job::background("late", "late")).unwrap();

    let err = queue
        .shutdown(&Context::with_timeout(Duration::from_millis(30)))
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    assert!(matches!(
        err,
        QueueError::DrainIncomplete { source: ContextError::DeadlineExceeded, pending: 1, active: 1 }
    ));
    assert_eq!(queue.state(), QueueState::Draining);

    // Draining continues after the caller gave up.
    gate.release();
    assert_eq!(late.blocking_recv().unwrap().unwrap().output, "<p>late</p>");
    queue.shutdown(&Context::with_timeout(Duration::from_secs(5))).unwrap();
    assert_eq!(queue.state(), QueueState::Closed);
}

#[test]
fn test_shutdown_can_be_cancelled() {
    let (render, gate, _recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();

    queue.submit(&Context::background(), Job::background("busy", "block"), None).unwrap();
    gate.wait_started();

    let token = CancellationToken::new();
    token.cancel();
    let err = queue
        .shutdown(&Context::background().with_cancellation(token))
        .unwrap_err();
    assert!(matches!(err, QueueError::DrainIncomplete { source: ContextError::Cancelled, .. }));
    assert!(!err.is_deadline_exceeded());

    gate.release();
    queue.close().unwrap();
}

#[test]
fn test_concurrent_shutdown_calls_share_one_drain() {
    let (render, gate, _recorder) = gated_render();
    let queue = Arc::new(RenderQueue::new(2, render).unwrap());

    queue.submit(&Context::background(), Job::background("busy", "block"), None).unwrap();
    gate.wait_started();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.shutdown(&Context::with_timeout(Duration::from_secs(5))))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    assert!(!queue.is_accepting());
    gate.release();

    for waiter in waiters {
        assert!(waiter.join().unwrap().is_ok());
    }
    assert_eq!(queue.state(), QueueState::Closed);
}

#[test]
fn test_dropping_the_queue_still_delivers_accepted_work() {
    let (render, gate, _recorder) = gated_render();
    let queue = RenderQueue::new(1, render).unwrap();
    let ctx = Context::background();

    queue.submit(&ctx, Job::background("busy", "block"), None).unwrap();
    gate.wait_started();
    let (_, rx) = queue.submit_with_response(&ctx, Job::interactive("post/5", "body")).unwrap();

    drop(queue);
    gate.release();
    assert_eq!(rx.blocking_recv().unwrap().unwrap().output, "<p>body</p>");
}
