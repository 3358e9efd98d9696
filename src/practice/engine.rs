//! The per-word practice engine.

use crate::capture::{CaptureEvent, CaptureMode};
use crate::session::{SessionIo, SessionNotice};

use super::words::clean_word;
use super::{PracticeStatus, PracticeWord};

// ---------------------------------------------------------------------------
// PracticeOutcome
// ---------------------------------------------------------------------------

/// What an engine entry point produced.
#[derive(Debug, PartialEq, Eq)]
pub enum PracticeOutcome {
    /// The engine is waiting for further events or triggers.
    Continue,
    /// Every practice word has been resolved.
    Finished,
}

// ---------------------------------------------------------------------------
// PracticeEngine
// ---------------------------------------------------------------------------

/// Drills the practice words one at a time through listen/confirm/retry.
///
/// Constructed from the dialogue's frozen mistakes (already de-duplicated
/// and decomposed by the session controller).  The cursor only advances
/// after a Success determination; a non-match parks the word in `TryAgain`
/// until the learner triggers another attempt.
pub struct PracticeEngine {
    words: Vec<PracticeWord>,
    cursor: usize,
    status: PracticeStatus,
    finished: bool,
}

impl PracticeEngine {
    /// `words` must be non-empty — an empty drill list is the controller's
    /// immediate-completion case and never constructs an engine.
    pub fn new(words: Vec<PracticeWord>) -> Self {
        debug_assert!(!words.is_empty());
        Self {
            words,
            cursor: 0,
            status: PracticeStatus::Idle,
            finished: false,
        }
    }

    pub fn status(&self) -> PracticeStatus {
        self.status
    }

    /// Index of the word being drilled.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_word(&self) -> &PracticeWord {
        &self.words[self.cursor]
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Present the first word.
    pub(crate) async fn begin(&self, io: &SessionIo) {
        self.announce_current(io).await;
    }

    /// External listen trigger.
    ///
    /// Accepted from `Idle` (first attempt) and `TryAgain` (retry); rejected
    /// while `Listening` or `Success` so rapid re-triggering can never start
    /// overlapping capture runs.
    pub(crate) async fn trigger_listen(&mut self, io: &SessionIo) {
        if self.finished {
            return;
        }
        match self.status {
            PracticeStatus::Idle | PracticeStatus::TryAgain => {
                match io.capture.start(CaptureMode::SingleShot).await {
                    Ok(()) => self.set_status(PracticeStatus::Listening, io).await,
                    Err(e) => {
                        log::error!("practice: {e}");
                        io.notify(SessionNotice::CaptureBlocked {
                            message: e.to_string(),
                        })
                        .await;
                        self.set_status(PracticeStatus::Idle, io).await;
                    }
                }
            }
            PracticeStatus::Listening | PracticeStatus::Success => {
                log::debug!("practice: listen trigger ignored while {:?}", self.status);
            }
        }
    }

    /// Feed one raw capture event into the machine.
    pub(crate) async fn on_capture_event(
        &mut self,
        event: CaptureEvent,
        io: &SessionIo,
    ) -> PracticeOutcome {
        if self.finished {
            return PracticeOutcome::Continue;
        }

        match event {
            CaptureEvent::Result {
                transcript,
                is_final,
                ..
            } => {
                // Single-shot runs deliver finals only; anything else is
                // noise from an over-eager device.
                if !is_final || self.status != PracticeStatus::Listening {
                    return PracticeOutcome::Continue;
                }
                self.judge_attempt(&transcript, io).await
            }

            CaptureEvent::Error { kind } => {
                if self.status != PracticeStatus::Listening {
                    return PracticeOutcome::Continue;
                }
                if !kind.is_benign() {
                    let message = format!("microphone unavailable ({kind})");
                    log::error!("practice: {message}");
                    io.notify(SessionNotice::CaptureBlocked { message }).await;
                }
                // Whatever the kind, the learner gets to retry.
                self.set_status(PracticeStatus::Idle, io).await;
                PracticeOutcome::Continue
            }

            CaptureEvent::End => {
                if self.status == PracticeStatus::Listening {
                    // Run ended without delivering any result.
                    self.set_status(PracticeStatus::Idle, io).await;
                }
                PracticeOutcome::Continue
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Compare the attempt against the current word and transition.
    async fn judge_attempt(&mut self, transcript: &str, io: &SessionIo) -> PracticeOutcome {
        let spoken = clean_word(transcript);
        let target = clean_word(&self.words[self.cursor].word);

        // Lenient containment: carrier words around the target are fine.
        if !spoken.contains(&target) {
            log::debug!(
                "practice: {:?} does not contain {:?}",
                spoken,
                target
            );
            self.set_status(PracticeStatus::TryAgain, io).await;
            return PracticeOutcome::Continue;
        }

        self.set_status(PracticeStatus::Success, io).await;
        io.capture.stop().await;
        tokio::time::sleep(io.timing.success_display()).await;

        if self.cursor + 1 < self.words.len() {
            self.cursor += 1;
            self.set_status(PracticeStatus::Idle, io).await;
            self.announce_current(io).await;
            PracticeOutcome::Continue
        } else {
            self.finished = true;
            log::info!("practice complete: {} words drilled", self.words.len());
            PracticeOutcome::Finished
        }
    }

    async fn announce_current(&self, io: &SessionIo) {
        io.notify(SessionNotice::PracticePrompt {
            index: self.cursor,
            total: self.words.len(),
            word: self.words[self.cursor].clone(),
        })
        .await;
    }

    async fn set_status(&mut self, status: PracticeStatus, io: &SessionIo) {
        if self.status != status {
            log::debug!("practice: {:?} → {:?}", self.status, status);
            self.status = status;
            io.notify(SessionNotice::PracticeStatusChanged(status)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureErrorKind;
    use crate::session::testkit::{drain_notices, null_io, ScriptedAnalyzer, TablePhonetics};
    use crate::session::SessionNotice;

    fn words() -> Vec<PracticeWord> {
        vec![
            PracticeWord {
                word: "together".into(),
                phonemes: vec!["tu".into(), "geh".into(), "dhuh".into()],
            },
            PracticeWord {
                word: "croissant".into(),
                phonemes: vec!["kwa".into(), "son".into()],
            },
        ]
    }

    fn final_result(transcript: &str) -> CaptureEvent {
        CaptureEvent::Result {
            index: 0,
            transcript: transcript.to_string(),
            is_final: true,
        }
    }

    fn io() -> (
        crate::session::SessionIo,
        tokio::sync::mpsc::Receiver<crate::session::SessionNotice>,
    ) {
        let (io, _timers, notices) = null_io(ScriptedAnalyzer::no_mistakes(), TablePhonetics::empty());
        (io, notices)
    }

    /// The listen trigger starts a single-shot run and moves to Listening.
    #[tokio::test]
    async fn trigger_from_idle_starts_listening() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;

        assert_eq!(engine.status(), PracticeStatus::Listening);
        assert!(io.capture.is_active());
    }

    /// Re-triggering while already listening is rejected without a state
    /// change.
    #[tokio::test]
    async fn trigger_while_listening_is_rejected() {
        let (io, mut notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        drain_notices(&mut notices);
        engine.trigger_listen(&io).await;

        assert_eq!(engine.status(), PracticeStatus::Listening);
        assert!(drain_notices(&mut notices).is_empty());
    }

    /// A transcript that does not contain the target parks the word in
    /// TryAgain without advancing the cursor.
    #[tokio::test]
    async fn mismatch_sets_try_again_and_keeps_cursor() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        let outcome = engine.on_capture_event(final_result("tugeda"), &io).await;

        assert_eq!(outcome, PracticeOutcome::Continue);
        assert_eq!(engine.status(), PracticeStatus::TryAgain);
        assert_eq!(engine.cursor(), 0);
    }

    /// TryAgain requires a fresh trigger; the trigger is accepted from
    /// there.
    #[tokio::test]
    async fn retry_after_try_again() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        engine.on_capture_event(final_result("tugeda"), &io).await;
        engine.on_capture_event(CaptureEvent::End, &io).await;
        assert_eq!(engine.status(), PracticeStatus::TryAgain);

        engine.trigger_listen(&io).await;
        assert_eq!(engine.status(), PracticeStatus::Listening);
    }

    /// Containment match with carrier words advances to the next word after
    /// the display delay.
    #[tokio::test]
    async fn carrier_words_still_match_and_cursor_advances() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        let outcome = engine
            .on_capture_event(final_result("I said together!"), &io)
            .await;

        assert_eq!(outcome, PracticeOutcome::Continue);
        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.status(), PracticeStatus::Idle);
        assert_eq!(engine.current_word().word, "croissant");
    }

    /// The last word's success finishes the drill exactly once.
    #[tokio::test]
    async fn last_word_success_finishes() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        engine.on_capture_event(final_result("together"), &io).await;

        engine.trigger_listen(&io).await;
        let outcome = engine
            .on_capture_event(final_result("croissant please"), &io)
            .await;
        assert_eq!(outcome, PracticeOutcome::Finished);

        // Anything arriving afterwards is inert.
        engine.trigger_listen(&io).await;
        let outcome = engine.on_capture_event(final_result("croissant"), &io).await;
        assert_eq!(outcome, PracticeOutcome::Continue);
    }

    /// Capture errors always return the learner to Idle; non-benign kinds
    /// also surface a blocking message.
    #[tokio::test]
    async fn errors_revert_to_idle() {
        let (io, mut notices) = io();
        let mut engine = PracticeEngine::new(words());

        // Benign: silent reset.
        engine.trigger_listen(&io).await;
        engine
            .on_capture_event(
                CaptureEvent::Error {
                    kind: CaptureErrorKind::NoSpeech,
                },
                &io,
            )
            .await;
        io.capture.note_end();
        engine.on_capture_event(CaptureEvent::End, &io).await;
        assert_eq!(engine.status(), PracticeStatus::Idle);
        let blocked = drain_notices(&mut notices)
            .iter()
            .any(|n| matches!(n, SessionNotice::CaptureBlocked { .. }));
        assert!(!blocked);

        // Non-benign: same reset, plus the persistent message.
        engine.trigger_listen(&io).await;
        engine
            .on_capture_event(
                CaptureEvent::Error {
                    kind: CaptureErrorKind::NotAllowed,
                },
                &io,
            )
            .await;
        io.capture.note_end();
        engine.on_capture_event(CaptureEvent::End, &io).await;
        assert_eq!(engine.status(), PracticeStatus::Idle);
        let blocked = drain_notices(&mut notices)
            .iter()
            .any(|n| matches!(n, SessionNotice::CaptureBlocked { .. }));
        assert!(blocked);
    }

    /// A run that ends while listening, with no result at all, resets to
    /// Idle.
    #[tokio::test]
    async fn silent_end_reverts_to_idle() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        io.capture.note_end();
        engine.on_capture_event(CaptureEvent::End, &io).await;

        assert_eq!(engine.status(), PracticeStatus::Idle);
    }

    /// Interim results never judge an attempt.
    #[tokio::test]
    async fn interim_results_are_ignored() {
        let (io, _notices) = io();
        let mut engine = PracticeEngine::new(words());

        engine.trigger_listen(&io).await;
        engine
            .on_capture_event(
                CaptureEvent::Result {
                    index: 0,
                    transcript: "together".into(),
                    is_final: false,
                },
                &io,
            )
            .await;

        assert_eq!(engine.status(), PracticeStatus::Listening);
        assert_eq!(engine.cursor(), 0);
    }
}
