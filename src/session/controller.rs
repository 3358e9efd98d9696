//! The top-level session controller.
//!
//! Owns the [`Phase`] variable, drives the dialogue engine until the script
//! is exhausted, freezes the mistake list, prepares and drives the practice
//! engine, and emits the single completion notice.  The run loop is the one
//! place raw capture events, timer firings and external commands meet the
//! state machines, so everything downstream sees one event at a time.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::analysis::{Mistake, MistakeAnalyzer, PhoneticService};
use crate::capture::{CaptureEvent, CaptureSession};
use crate::dialogue::{DialogueEngine, DialogueOutcome};
use crate::playback::PlaybackSession;
use crate::practice::{practice_words, PracticeEngine, PracticeOutcome, PracticeWord};
use crate::script::{ScriptError, ScriptGenerator, ScriptRequest};

use super::{Phase, SessionCommand, SessionIo, SessionNotice, TimerEvent};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors returned by the controller's phase-progression operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not valid in phase {0:?}")]
    WrongPhase(Phase),

    #[error("roles have not been chosen yet")]
    RolesNotChosen,

    #[error(transparent)]
    Script(#[from] ScriptError),
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Glue between the selection surface, the two engines and the outside
/// world.
///
/// The excluded UI layer walks the controller through
/// [`choose_scene`](Self::choose_scene) →
/// [`choose_roles`](Self::choose_roles) →
/// [`load_script`](Self::load_script), then hands the event receivers to
/// [`run`](Self::run), which consumes the controller until the session
/// completes.
pub struct SessionController {
    io: SessionIo,
    generator: Arc<dyn ScriptGenerator>,
    timers: Option<mpsc::Receiver<TimerEvent>>,

    phase: Phase,
    scene: Option<String>,
    user_role: Option<String>,
    ai_role: Option<String>,

    dialogue: Option<DialogueEngine>,
    practice: Option<PracticeEngine>,
}

impl SessionController {
    pub fn new(
        generator: Arc<dyn ScriptGenerator>,
        analyzer: Arc<dyn MistakeAnalyzer>,
        phonetics: Arc<dyn PhoneticService>,
        capture: CaptureSession,
        playback: PlaybackSession,
        timing: crate::config::TimingConfig,
        notices: mpsc::Sender<SessionNotice>,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::channel(16);

        Self {
            io: SessionIo {
                capture,
                playback,
                analyzer,
                phonetics,
                notices,
                timers: timer_tx,
                timing,
            },
            generator,
            timers: Some(timer_rx),
            phase: Phase::SceneSelect,
            scene: None,
            user_role: None,
            ai_role: None,
            dialogue: None,
            practice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    // -----------------------------------------------------------------------
    // Selection surface
    // -----------------------------------------------------------------------

    /// Pick the scene.  Valid only in [`Phase::SceneSelect`].
    pub async fn choose_scene(&mut self, scene: impl Into<String>) -> Result<(), SessionError> {
        if self.phase != Phase::SceneSelect {
            return Err(SessionError::WrongPhase(self.phase));
        }
        self.scene = Some(scene.into());
        self.set_phase(Phase::CharacterSelect).await;
        Ok(())
    }

    /// Pick the learner's role and the synthesized partner's role.  Valid
    /// only in [`Phase::CharacterSelect`].
    pub async fn choose_roles(
        &mut self,
        user_role: impl Into<String>,
        ai_role: impl Into<String>,
    ) -> Result<(), SessionError> {
        if self.phase != Phase::CharacterSelect {
            return Err(SessionError::WrongPhase(self.phase));
        }
        self.user_role = Some(user_role.into());
        self.ai_role = Some(ai_role.into());
        Ok(())
    }

    /// Generate and validate the script, then enter [`Phase::Dialogue`].
    ///
    /// A generation failure returns the session to character selection and
    /// emits [`SessionNotice::ScriptFailed`] so the learner can retry.
    pub async fn load_script(&mut self, difficulty: &str) -> Result<(), SessionError> {
        if self.phase != Phase::CharacterSelect {
            return Err(SessionError::WrongPhase(self.phase));
        }
        let (Some(scene), Some(user_role), Some(ai_role)) =
            (self.scene.clone(), self.user_role.clone(), self.ai_role.clone())
        else {
            return Err(SessionError::RolesNotChosen);
        };

        self.set_phase(Phase::ScriptLoading).await;

        let request = ScriptRequest {
            scene,
            user_role: user_role.clone(),
            ai_role,
            difficulty: difficulty.to_string(),
        };

        match self.generator.generate(&request).await {
            Ok(script) => {
                self.dialogue = Some(DialogueEngine::new(script, user_role));
                self.set_phase(Phase::Dialogue).await;
                Ok(())
            }
            Err(e) => {
                log::warn!("script generation failed: {e}");
                self.set_phase(Phase::CharacterSelect).await;
                self.io
                    .notify(SessionNotice::ScriptFailed {
                        message: format!("Could not write a script — please try again ({e})"),
                    })
                    .await;
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Drive the session to completion.
    ///
    /// Valid once [`load_script`](Self::load_script) has succeeded.
    /// Consumes the controller; returns when [`Phase::Complete`] is reached
    /// or every inbound channel has closed.
    pub async fn run(
        mut self,
        mut capture_events: mpsc::Receiver<CaptureEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) {
        if self.phase != Phase::Dialogue {
            log::error!("run() called in phase {:?} — nothing to do", self.phase);
            return;
        }

        let mut timers = self
            .timers
            .take()
            .expect("run() consumed the timer receiver twice");

        // Kick off turn 0 before listening for events.
        let outcome = match self.dialogue.as_mut() {
            Some(engine) => engine.begin(&self.io).await,
            None => return,
        };
        self.apply_dialogue_outcome(outcome).await;

        while self.phase != Phase::Complete {
            tokio::select! {
                Some(event) = capture_events.recv() => {
                    self.on_capture_event(event).await;
                }
                Some(event) = timers.recv() => {
                    self.on_timer_event(event).await;
                }
                Some(command) = commands.recv() => {
                    self.on_command(command).await;
                }
                else => {
                    log::info!("session: all channels closed, shutting down");
                    break;
                }
            }
        }

        // Whatever ended the loop, leave no capture or playback behind.
        self.io.capture.abort().await;
        self.io.playback.cancel().await;
    }

    // -----------------------------------------------------------------------
    // Event routing
    // -----------------------------------------------------------------------

    async fn on_capture_event(&mut self, event: CaptureEvent) {
        // Trailing events of a superseded run are discarded wholesale; the
        // terminal End closes the drain.
        if self.io.capture.is_draining() {
            if matches!(event, CaptureEvent::End) {
                self.io.capture.finish_drain();
            }
            return;
        }
        if matches!(event, CaptureEvent::End) {
            self.io.capture.note_end();
        }

        match self.phase {
            Phase::Dialogue => {
                let outcome = match self.dialogue.as_mut() {
                    Some(engine) => engine.on_capture_event(event, &self.io).await,
                    None => return,
                };
                self.apply_dialogue_outcome(outcome).await;
            }
            Phase::Practice => {
                let outcome = match self.practice.as_mut() {
                    Some(engine) => engine.on_capture_event(event, &self.io).await,
                    None => return,
                };
                self.apply_practice_outcome(outcome).await;
            }
            _ => {
                log::debug!("capture event ignored in phase {:?}", self.phase);
            }
        }
    }

    async fn on_timer_event(&mut self, event: TimerEvent) {
        let TimerEvent::SilenceElapsed { epoch } = event;
        if self.phase != Phase::Dialogue {
            return;
        }
        let outcome = match self.dialogue.as_mut() {
            Some(engine) => engine.on_silence_elapsed(epoch, &self.io).await,
            None => return,
        };
        self.apply_dialogue_outcome(outcome).await;
    }

    async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Listen => {
                if self.phase == Phase::Practice {
                    if let Some(engine) = self.practice.as_mut() {
                        engine.trigger_listen(&self.io).await;
                    }
                } else {
                    log::debug!("listen command ignored in phase {:?}", self.phase);
                }
            }
            SessionCommand::ClearCaptureError => {
                if self.phase == Phase::Dialogue {
                    let outcome = match self.dialogue.as_mut() {
                        Some(engine) => engine.clear_capture_error(&self.io).await,
                        None => return,
                    };
                    self.apply_dialogue_outcome(outcome).await;
                } else {
                    log::debug!("clear-error command ignored in phase {:?}", self.phase);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    async fn apply_dialogue_outcome(&mut self, outcome: DialogueOutcome) {
        if let DialogueOutcome::Finished(mistakes) = outcome {
            self.finish_dialogue(mistakes).await;
        }
    }

    async fn apply_practice_outcome(&mut self, outcome: PracticeOutcome) {
        if outcome == PracticeOutcome::Finished {
            self.practice = None;
            self.complete().await;
        }
    }

    /// Close out the dialogue phase with its frozen mistake list.
    async fn finish_dialogue(&mut self, mistakes: Vec<Mistake>) {
        self.dialogue = None;

        // The practice engine must never inherit a live capture run or a
        // half-spoken line.
        self.io.capture.abort().await;
        self.io.playback.cancel().await;

        if mistakes.is_empty() {
            self.complete().await;
            return;
        }

        self.set_phase(Phase::PracticePrep).await;

        let words = practice_words(&mistakes);
        log::info!("practice prep: {} distinct words", words.len());

        // All breakdowns are fetched up front — the full word list is shown
        // before drilling begins.
        let fetches = words.iter().map(|w| self.io.phonetics.phonemes(w));
        let results = futures::future::join_all(fetches).await;

        let mut drill = Vec::new();
        for (word, result) in words.into_iter().zip(results) {
            let phonemes = match result {
                Ok(phonemes) => phonemes,
                Err(e) => {
                    log::warn!("phonemes for {word:?} failed ({e}) — using whole word");
                    vec![word.clone()]
                }
            };
            if phonemes.is_empty() {
                log::debug!("dropping practice word {word:?}: empty breakdown");
                continue;
            }
            drill.push(PracticeWord { word, phonemes });
        }

        if drill.is_empty() {
            self.complete().await;
            return;
        }

        let engine = PracticeEngine::new(drill);
        self.set_phase(Phase::Practice).await;
        engine.begin(&self.io).await;
        self.practice = Some(engine);
    }

    /// Enter [`Phase::Complete`] and emit the single completion notice.
    async fn complete(&mut self) {
        if self.phase == Phase::Complete {
            return;
        }
        self.set_phase(Phase::Complete).await;
        self.io.notify(SessionNotice::Complete).await;
    }

    async fn set_phase(&mut self, phase: Phase) {
        log::debug!("phase: {:?} → {:?}", self.phase, phase);
        self.phase = phase;
        self.io.notify(SessionNotice::PhaseChanged(phase)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
