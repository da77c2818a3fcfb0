//! Shared helpers for render queue integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Holds renders whose payload starts with `block` until released.
pub struct Gate {
    started: Mutex<mpsc::Receiver<String>>,
    release: mpsc::Sender<()>,
}

impl Gate {
    pub fn wait_started(&self) -> String {
        self.started
            .lock()
            .unwrap()
            .recv_timeout(GATE_TIMEOUT)
            .expect("a worker entered a blocking render")
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

/// Observations of every render call.
#[derive(Clone, Default)]
pub struct Recorder {
    payloads: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Markdown-ish renderer: wraps the payload in `<p>` tags.
pub fn gated_render() -> (
    impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    Gate,
    Recorder,
) {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let recorder = Recorder::default();
    let seen = recorder.clone();

    let render = move |payload: &str| -> Result<String, String> {
        seen.calls.fetch_add(1, Ordering::SeqCst);
        seen.payloads.lock().unwrap().push(payload.to_string());
        if payload.starts_with("block") {
            let _ = started_tx.lock().unwrap().send(payload.to_string());
            let _ = release_rx.lock().unwrap().recv_timeout(GATE_TIMEOUT);
        }
        Ok(format!("<p>{payload}</p>"))
    };

    let gate = Gate {
        started: Mutex::new(started_rx),
        release: release_tx,
    };
    (render, gate, recorder)
}
