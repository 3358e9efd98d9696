//! `CaptureDevice` trait and the `CaptureSession` wrapper.
//!
//! [`CaptureSession`] is the only way the engines touch the device.  It
//! guards against the two real-world races the raw device surface allows:
//!
//! * **Double start** — a stop and a restart can overlap; starting an
//!   already-started session is a logged no-op instead of a crash.
//! * **Stale trailing events** — after `stop()`/`abort()` the device may
//!   still flush results before its terminal `End`.  The session enters a
//!   draining state and the event router discards everything up to and
//!   including that `End`, so a superseded run can never mutate the next
//!   turn's state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{CaptureError, CaptureMode};

// ---------------------------------------------------------------------------
// CaptureDevice trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-capture backends.
///
/// # Contract
///
/// - The device is handed one `mpsc::Sender<CaptureEvent>` at construction
///   time and keeps it for its whole lifetime (subscribe once).
/// - Every run started with [`start`](CaptureDevice::start) terminates with
///   exactly one `CaptureEvent::End`, including after `stop()` / `abort()`
///   and after errors.
/// - `stop()` is graceful: buffered finals may still be delivered before
///   `End`.  `abort()` discards in-flight results.
/// - `stop()`/`abort()` on a device with no active run must be harmless.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Begin a capture run in the given mode.
    async fn start(&self, mode: CaptureMode) -> Result<(), CaptureError>;

    /// Gracefully conclude the active run.
    async fn stop(&self);

    /// Immediately conclude the active run, discarding in-flight results.
    async fn abort(&self);
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Shared handle over the single capture device.
///
/// Cheap to clone; all clones observe the same active/draining flags.  The
/// session is exclusively owned by whichever engine is currently active —
/// phase transitions stop or abort it before handing it over.
#[derive(Clone)]
pub struct CaptureSession {
    device: Arc<dyn CaptureDevice>,
    active: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            device,
            active: Arc::new(AtomicBool::new(false)),
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a capture run.  A start while a run is already active is a
    /// no-op — observed race: a stop and a restart can overlap.
    pub async fn start(&self, mode: CaptureMode) -> Result<(), CaptureError> {
        if self.active.swap(true, Ordering::SeqCst) {
            log::debug!("capture: start while active — ignoring");
            return Ok(());
        }
        if let Err(e) = self.device.start(mode).await {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }
        log::debug!("capture: started ({mode:?})");
        Ok(())
    }

    /// Gracefully stop the active run and start discarding its trailing
    /// events.  No-op when nothing is active.
    pub async fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.draining.store(true, Ordering::SeqCst);
            self.device.stop().await;
            log::debug!("capture: stopped, draining trailing events");
        }
    }

    /// Abort the active run, discarding in-flight results.  No-op when
    /// nothing is active.
    pub async fn abort(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.draining.store(true, Ordering::SeqCst);
            self.device.abort().await;
            log::debug!("capture: aborted");
        }
    }

    /// Whether a run is currently active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether trailing events of a superseded run are being discarded.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Record the terminal `End` of a drained run.
    pub fn finish_drain(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Record that the device concluded its run on its own (`End` arrived
    /// without a preceding `stop()`/`abort()`).
    pub fn note_end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ScriptedCapture  (test-only)
// ---------------------------------------------------------------------------

/// One step of a scripted capture run.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Emit a transcript result.
    Result {
        index: usize,
        transcript: &'static str,
        is_final: bool,
    },
    /// Emit a device error (the run still ends with `End`).
    Error(super::CaptureErrorKind),
    /// Sleep before the next step.
    Wait(u64),
}

/// A test double that replays one pre-programmed scenario per `start()`.
///
/// Each scenario runs on its own task; `stop()`/`abort()` cancels the task
/// and sends the terminal `End` immediately, matching the device contract.
#[cfg(test)]
pub struct ScriptedCapture {
    tx: tokio::sync::mpsc::Sender<super::CaptureEvent>,
    scenarios: std::sync::Mutex<std::collections::VecDeque<Vec<ScriptedStep>>>,
    running: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    starts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedCapture {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<super::CaptureEvent>,
        scenarios: Vec<Vec<ScriptedStep>>,
    ) -> Self {
        Self {
            tx,
            scenarios: std::sync::Mutex::new(scenarios.into_iter().collect()),
            running: std::sync::Mutex::new(None),
            starts: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many times `start()` was called.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    async fn conclude(&self) {
        let handle = self.running.lock().unwrap().take();
        if let Some(handle) = handle {
            // A finished scenario already delivered its terminal End; a run
            // may emit only one.
            if !handle.is_finished() {
                handle.abort();
                let _ = self.tx.send(super::CaptureEvent::End).await;
            }
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CaptureDevice for ScriptedCapture {
    async fn start(&self, _mode: CaptureMode) -> Result<(), CaptureError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let steps = self
            .scenarios
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            for step in steps {
                match step {
                    ScriptedStep::Wait(ms) => {
                        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                    }
                    ScriptedStep::Result {
                        index,
                        transcript,
                        is_final,
                    } => {
                        let _ = tx
                            .send(super::CaptureEvent::Result {
                                index,
                                transcript: transcript.to_string(),
                                is_final,
                            })
                            .await;
                    }
                    ScriptedStep::Error(kind) => {
                        let _ = tx.send(super::CaptureEvent::Error { kind }).await;
                    }
                }
            }
            let _ = tx.send(super::CaptureEvent::End).await;
        });
        *self.running.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.conclude().await;
    }

    async fn abort(&self) {
        self.conclude().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
