//! The turn-taking engine.

use crate::analysis::{omission_mistakes, Mistake};
use crate::capture::{CaptureErrorKind, CaptureEvent, CaptureMode, CaptureStatus};
use crate::script::DialogueScript;
use crate::session::{SessionIo, SessionNotice, TimerEvent};

// ---------------------------------------------------------------------------
// DialogueOutcome
// ---------------------------------------------------------------------------

/// What an engine entry point produced.
#[derive(Debug)]
pub enum DialogueOutcome {
    /// The engine is waiting for further events.
    Continue,
    /// The script is exhausted.  Carries the frozen mistake sequence; the
    /// engine keeps nothing, so the list can never be mutated afterwards.
    Finished(Vec<Mistake>),
}

// ---------------------------------------------------------------------------
// DialogueEngine
// ---------------------------------------------------------------------------

/// Drives the script turn-by-turn against the capture and playback
/// sessions.
///
/// The engine is a plain state machine: every transition happens inside one
/// of the named entry points ([`begin`](Self::begin),
/// [`on_capture_event`](Self::on_capture_event),
/// [`on_silence_elapsed`](Self::on_silence_elapsed),
/// [`clear_capture_error`](Self::clear_capture_error)), which the session
/// controller calls one event at a time.
pub struct DialogueEngine {
    script: DialogueScript,
    local_role: String,

    /// Index of the active turn.  Monotonically non-decreasing; only
    /// advances after the turn's analysis has been folded in.
    turn: usize,
    /// Per-turn processed guard.  Set before the first asynchronous step of
    /// submission, cleared only on the transition to the next turn.
    submitted: bool,
    status: CaptureStatus,

    /// Transcript slots for the active turn, keyed by device result index.
    slots: Vec<String>,
    /// Whether any final result arrived for the active run.
    saw_final: bool,
    /// Error reported by the active run; resolved when its `End` arrives.
    pending_error: Option<CaptureErrorKind>,

    /// Mistakes accumulated across all self-spoken turns, in script order.
    mistakes: Vec<Mistake>,

    /// Epoch of the most recently armed silence timer.  Firings carrying an
    /// older epoch are stale and ignored.
    silence_epoch: u64,

    finished: bool,
}

impl DialogueEngine {
    pub fn new(script: DialogueScript, local_role: impl Into<String>) -> Self {
        Self {
            script,
            local_role: local_role.into(),
            turn: 0,
            submitted: false,
            status: CaptureStatus::Idle,
            slots: Vec::new(),
            saw_final: false,
            pending_error: None,
            mistakes: Vec::new(),
            silence_epoch: 0,
            finished: false,
        }
    }

    /// Index of the active turn.
    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.status
    }

    /// Mistakes recorded so far.
    pub fn mistakes(&self) -> &[Mistake] {
        &self.mistakes
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Start the session: play through leading other-spoken turns and stop
    /// at the first turn that needs the learner's voice.
    pub(crate) async fn begin(&mut self, io: &SessionIo) -> DialogueOutcome {
        self.run_until_input(io).await
    }

    /// Feed one raw capture event into the machine.
    pub(crate) async fn on_capture_event(
        &mut self,
        event: CaptureEvent,
        io: &SessionIo,
    ) -> DialogueOutcome {
        if self.finished {
            return DialogueOutcome::Continue;
        }

        match event {
            CaptureEvent::Result {
                index,
                transcript,
                is_final,
            } => {
                if self.submitted || self.status != CaptureStatus::Listening {
                    log::debug!("turn {}: discarding late result", self.turn);
                    return DialogueOutcome::Continue;
                }

                // Live feedback counts tokens of the latest result only;
                // never consulted for correctness.
                io.notify(SessionNotice::MatchedWords {
                    count: transcript.split_whitespace().count(),
                })
                .await;

                if index >= self.slots.len() {
                    self.slots.resize(index + 1, String::new());
                }
                self.slots[index] = transcript;
                self.saw_final |= is_final;

                self.arm_silence_timer(io);
                DialogueOutcome::Continue
            }

            CaptureEvent::Error { kind } => {
                if !self.submitted {
                    log::debug!("turn {}: capture error {kind}", self.turn);
                    self.pending_error = Some(kind);
                }
                DialogueOutcome::Continue
            }

            CaptureEvent::End => {
                if self.submitted || self.status != CaptureStatus::Listening {
                    return DialogueOutcome::Continue;
                }

                match self.pending_error.take() {
                    Some(kind) if !kind.is_benign() => {
                        self.status = CaptureStatus::Error;
                        let message = format!("microphone unavailable ({kind})");
                        log::error!("turn {}: {message}", self.turn);
                        io.notify(SessionNotice::CaptureBlocked { message }).await;
                        DialogueOutcome::Continue
                    }
                    _ => {
                        if self.saw_final && !self.transcript().trim().is_empty() {
                            // Natural end of the utterance; submits under the
                            // same guard as the silence timer.
                            self.submit(io).await
                        } else {
                            log::debug!(
                                "turn {}: capture ended without a usable result — restarting",
                                self.turn
                            );
                            self.start_listening(io).await
                        }
                    }
                }
            }
        }
    }

    /// Handle a silence-timer firing.  Stale epochs are ignored.
    pub(crate) async fn on_silence_elapsed(
        &mut self,
        epoch: u64,
        io: &SessionIo,
    ) -> DialogueOutcome {
        if self.finished
            || epoch != self.silence_epoch
            || self.submitted
            || self.status != CaptureStatus::Listening
        {
            return DialogueOutcome::Continue;
        }

        log::debug!("turn {}: silence window elapsed", self.turn);
        self.submit(io).await
    }

    /// External action clearing a blocking capture error; retries the
    /// current turn.
    pub(crate) async fn clear_capture_error(&mut self, io: &SessionIo) -> DialogueOutcome {
        if self.finished || self.status != CaptureStatus::Error {
            return DialogueOutcome::Continue;
        }

        log::info!("turn {}: capture error cleared — retrying", self.turn);
        tokio::time::sleep(io.timing.settle()).await;
        self.start_listening(io).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Play other-spoken turns until the script needs the learner (returns
    /// `Continue` with capture listening) or runs out (returns `Finished`).
    async fn run_until_input(&mut self, io: &SessionIo) -> DialogueOutcome {
        loop {
            let Some(line) = self.script.line(self.turn).cloned() else {
                self.finished = true;
                log::info!(
                    "dialogue complete: {} turns, {} mistakes",
                    self.script.len(),
                    self.mistakes.len()
                );
                return DialogueOutcome::Finished(std::mem::take(&mut self.mistakes));
            };

            let self_spoken = line.speaker == self.local_role;
            io.notify(SessionNotice::TurnStarted {
                index: self.turn,
                speaker: line.speaker.clone(),
                self_spoken,
            })
            .await;

            if self_spoken {
                tokio::time::sleep(io.timing.settle()).await;
                return self.start_listening(io).await;
            }

            if let Err(e) = io.playback.speak(&line.text).await {
                log::warn!("turn {}: playback failed ({e}) — continuing", self.turn);
            }
            tokio::time::sleep(io.timing.settle()).await;
            self.advance();
        }
    }

    /// Start (or restart) the capture run for the active self-spoken turn.
    async fn start_listening(&mut self, io: &SessionIo) -> DialogueOutcome {
        self.slots.clear();
        self.saw_final = false;
        self.pending_error = None;
        self.submitted = false;

        match io.capture.start(CaptureMode::Continuous).await {
            Ok(()) => {
                self.status = CaptureStatus::Listening;
                // An entirely silent learner produces no result events, so
                // the turn's timeout starts counting from here.
                self.arm_silence_timer(io);
            }
            Err(e) => {
                self.status = CaptureStatus::Error;
                let message = e.to_string();
                log::error!("turn {}: {message}", self.turn);
                io.notify(SessionNotice::CaptureBlocked { message }).await;
            }
        }
        DialogueOutcome::Continue
    }

    /// Freeze the transcript, run analysis, record mistakes and move on.
    async fn submit(&mut self, io: &SessionIo) -> DialogueOutcome {
        // Guard first: nothing after this point may run twice for one turn.
        self.submitted = true;
        self.silence_epoch += 1;
        self.status = CaptureStatus::Idle;
        io.capture.stop().await;

        let spoken = self.transcript();
        let target = self
            .script
            .line(self.turn)
            .map(|l| l.text.clone())
            .unwrap_or_default();

        io.notify(SessionNotice::TurnSubmitted {
            index: self.turn,
            transcript: spoken.clone(),
        })
        .await;

        let mistakes = if spoken.trim().is_empty() {
            // A fully missed line never reaches the analyzer.
            omission_mistakes(&target)
        } else {
            match io.analyzer.analyze(&spoken, &target).await {
                Ok(mistakes) => mistakes,
                Err(e) => {
                    log::warn!(
                        "turn {}: analysis failed ({e}) — recording no mistakes",
                        self.turn
                    );
                    Vec::new()
                }
            }
        };

        if !mistakes.is_empty() {
            io.notify(SessionNotice::MistakesRecorded {
                count: mistakes.len(),
            })
            .await;
        }
        self.mistakes.extend(mistakes);

        self.advance();
        self.run_until_input(io).await
    }

    /// Move to the next turn, clearing the processed guard.
    fn advance(&mut self) {
        self.turn += 1;
        self.submitted = false;
    }

    /// The full transcript of the active turn: all result slots in index
    /// order.
    fn transcript(&self) -> String {
        self.slots
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// (Re)arm the silence-completion timer for the active run.
    fn arm_silence_timer(&mut self, io: &SessionIo) {
        self.silence_epoch += 1;
        let epoch = self.silence_epoch;
        let delay = io.timing.silence();
        let timers = io.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timers.send(TimerEvent::SilenceElapsed { epoch }).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MistakeAnalyzer;
    use crate::script::sample_script;
    use crate::session::testkit::{
        drain_notices, null_io, FailingAnalyzer, ScriptedAnalyzer, TablePhonetics,
    };
    use crate::session::SessionNotice;
    use std::sync::Arc;

    fn result(index: usize, transcript: &str, is_final: bool) -> CaptureEvent {
        CaptureEvent::Result {
            index,
            transcript: transcript.to_string(),
            is_final,
        }
    }

    fn mistake(said: &str, expected: &str) -> Mistake {
        Mistake {
            said: said.into(),
            expected: expected.into(),
        }
    }

    /// `begin` must speak the opening other-spoken line and stop at turn 1
    /// (the first Customer line) listening.
    #[tokio::test]
    async fn begin_plays_opening_line_and_listens() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, _notices) = null_io(analyzer, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        let outcome = engine.begin(&io).await;

        assert!(matches!(outcome, DialogueOutcome::Continue));
        assert_eq!(engine.turn(), 1);
        assert_eq!(engine.capture_status(), CaptureStatus::Listening);
        assert!(io.capture.is_active());
    }

    /// A final result followed by the run's natural end submits the turn and
    /// chains into the next pair of turns.
    #[tokio::test]
    async fn end_with_final_submits_and_advances() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, _notices) =
            null_io(Arc::clone(&analyzer) as Arc<dyn MistakeAnalyzer>, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine
            .on_capture_event(result(0, "Can I have a small coffee please", true), &io)
            .await;
        let outcome = engine.on_capture_event(CaptureEvent::End, &io).await;

        assert!(matches!(outcome, DialogueOutcome::Continue));
        // Turn 1 submitted; turn 2 (Barista) played; now listening on turn 3.
        assert_eq!(engine.turn(), 3);
        assert_eq!(analyzer.calls(), 1);
    }

    /// The silence timer and the end event racing must submit exactly once.
    #[tokio::test]
    async fn racing_timer_and_end_submit_once() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, mut timers, _notices) =
            null_io(Arc::clone(&analyzer) as Arc<dyn MistakeAnalyzer>, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine.on_capture_event(result(0, "to go please", true), &io).await;

        // The result armed a timer; capture both that epoch and the raced
        // end event.
        let TimerEvent::SilenceElapsed { epoch } = timers.recv().await.unwrap();
        engine.on_silence_elapsed(epoch, &io).await;
        engine.on_capture_event(CaptureEvent::End, &io).await;
        // A stale re-fire of the same epoch must also be ignored.
        engine.on_silence_elapsed(epoch, &io).await;

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(engine.turn(), 3);
    }

    /// Silence with no results at all freezes an empty transcript: one
    /// omission per target word, without calling the analyzer.
    #[tokio::test]
    async fn silent_turn_records_omissions_without_analyzer() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, mut timers, _notices) =
            null_io(Arc::clone(&analyzer) as Arc<dyn MistakeAnalyzer>, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        // start_listening armed the turn timeout on its own.
        let TimerEvent::SilenceElapsed { epoch } = timers.recv().await.unwrap();
        engine.on_silence_elapsed(epoch, &io).await;

        assert_eq!(analyzer.calls(), 0);
        // "Can I have a small coffee please" = 7 omitted words.
        assert_eq!(engine.mistakes().len(), 7);
        assert!(engine.mistakes().iter().all(|m| m.is_omission()));
        assert_eq!(engine.turn(), 3);
    }

    /// Benign interruptions restart capture for the same turn.
    #[tokio::test]
    async fn benign_error_restarts_same_turn() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, _notices) = null_io(analyzer, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine
            .on_capture_event(
                CaptureEvent::Error {
                    kind: CaptureErrorKind::NoSpeech,
                },
                &io,
            )
            .await;
        io.capture.note_end(); // the run concluded on its own
        engine.on_capture_event(CaptureEvent::End, &io).await;

        assert_eq!(engine.turn(), 1);
        assert_eq!(engine.capture_status(), CaptureStatus::Listening);
    }

    /// A permission error halts capture until cleared, then the turn is
    /// retried.
    #[tokio::test]
    async fn blocking_error_halts_until_cleared() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, mut notices) = null_io(analyzer, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
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

        assert_eq!(engine.capture_status(), CaptureStatus::Error);
        let blocked = drain_notices(&mut notices)
            .into_iter()
            .any(|n| matches!(n, SessionNotice::CaptureBlocked { .. }));
        assert!(blocked);

        engine.clear_capture_error(&io).await;
        assert_eq!(engine.capture_status(), CaptureStatus::Listening);
        assert_eq!(engine.turn(), 1);
    }

    /// A submitted turn's results never re-enter the analyzer: the guard
    /// plus the per-turn state reset keep a late flush from re-submitting.
    #[tokio::test]
    async fn results_after_submission_never_resubmit() {
        let analyzer = ScriptedAnalyzer::new(vec![vec![mistake("", "coffee")]]);
        let (io, _timers, _notices) =
            null_io(Arc::clone(&analyzer) as Arc<dyn MistakeAnalyzer>, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine.on_capture_event(result(0, "something", true), &io).await;
        engine.on_capture_event(CaptureEvent::End, &io).await; // submits, now on turn 3

        let before = engine.mistakes().len();
        engine.on_capture_event(result(5, "stale text", true), &io).await;
        assert_eq!(engine.mistakes().len(), before);
        assert_eq!(analyzer.calls(), 1);
    }

    /// All eight turns with clean transcripts: pointer visits 0..8 in order
    /// and the final outcome carries no mistakes.
    #[tokio::test]
    async fn full_clean_script_finishes_with_no_mistakes() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, mut notices) =
            null_io(Arc::clone(&analyzer) as Arc<dyn MistakeAnalyzer>, TablePhonetics::empty());
        let script = sample_script();
        let user_lines: Vec<String> = script
            .lines()
            .iter()
            .filter(|l| l.speaker == "Customer")
            .map(|l| l.text.clone())
            .collect();
        let mut engine = DialogueEngine::new(script, "Customer");

        let mut outcome = engine.begin(&io).await;
        for line in &user_lines {
            assert!(matches!(outcome, DialogueOutcome::Continue));
            engine.on_capture_event(result(0, line, true), &io).await;
            outcome = engine.on_capture_event(CaptureEvent::End, &io).await;
        }

        let DialogueOutcome::Finished(mistakes) = outcome else {
            panic!("script should be exhausted");
        };
        assert!(mistakes.is_empty());
        assert_eq!(analyzer.calls(), 4);

        // Turn pointer visited every index exactly once, in order.
        let turns: Vec<usize> = drain_notices(&mut notices)
            .into_iter()
            .filter_map(|n| match n {
                SessionNotice::TurnStarted { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(turns, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    /// Analyzer failure degrades to zero recorded mistakes and the session
    /// keeps moving.
    #[tokio::test]
    async fn analyzer_failure_records_nothing_and_advances() {
        let (io, _timers, _notices) = null_io(
            Arc::new(FailingAnalyzer),
            TablePhonetics::empty(),
        );
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine.on_capture_event(result(0, "whatever", true), &io).await;
        engine.on_capture_event(CaptureEvent::End, &io).await;

        assert!(engine.mistakes().is_empty());
        assert_eq!(engine.turn(), 3);
    }

    /// Interim results update the cosmetic matched-word count from the
    /// latest result only.
    #[tokio::test]
    async fn matched_words_track_latest_result() {
        let analyzer = ScriptedAnalyzer::no_mistakes();
        let (io, _timers, mut notices) = null_io(analyzer, TablePhonetics::empty());
        let mut engine = DialogueEngine::new(sample_script(), "Customer");

        engine.begin(&io).await;
        engine.on_capture_event(result(0, "can i", false), &io).await;
        engine.on_capture_event(result(0, "can i have a", false), &io).await;

        let counts: Vec<usize> = drain_notices(&mut notices)
            .into_iter()
            .filter_map(|n| match n {
                SessionNotice::MatchedWords { count } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![2, 4]);
    }
}
