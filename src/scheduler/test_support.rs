//! Render callbacks with controllable timing for scheduler tests.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Holds render calls whose payload starts with `block` until released.
pub(crate) struct Gate {
    started: Mutex<mpsc::Receiver<String>>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Wait until a worker is parked inside a blocking render.
    pub(crate) fn wait_started(&self) -> String {
        self.started
            .lock()
            .recv_timeout(GATE_TIMEOUT)
            .expect("a worker entered a blocking render")
    }

    /// Let one parked render finish.
    pub(crate) fn release(&self) {
        let _ = self.release.send(());
    }
}

/// Payloads in the order the render callback saw them.
pub(crate) type RenderLog = Arc<Mutex<Vec<String>>>;

/// Render callback producing `<p>{payload}</p>`, recording every call.
pub(crate) fn gated_render() -> (
    impl Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    Gate,
    RenderLog,
) {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let started_tx = Mutex::new(started_tx);
    let release_rx = Mutex::new(release_rx);
    let log: RenderLog = Arc::default();
    let seen = Arc::clone(&log);

    let render = move |payload: &str| -> Result<String, String> {
        seen.lock().push(payload.to_string());
        if payload.starts_with("block") {
            let _ = started_tx.lock().send(payload.to_string());
            let _ = release_rx.lock().recv_timeout(GATE_TIMEOUT);
        }
        Ok(format!("<p>{payload}</p>"))
    };

    let gate = Gate {
        started: Mutex::new(started_rx),
        release: release_tx,
    };
    (render, gate, log)
}
