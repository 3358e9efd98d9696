//! Console rehearsal session — dialogue-coach.
//!
//! Headless demo wiring for the library: the partner's lines go to the
//! system synthesis voice, and the learner "speaks" by typing a line that
//! stands in for the capture transcript.  All state machines live in the
//! library; this binary only connects devices, services and a printer for
//! the notice stream.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the chat-endpoint services (script, analysis, phonetics).
//! 4. Build the synthesis voice (simulated when no backend exists).
//! 5. Wire the console capture device and the session channels.
//! 6. Walk the controller through scene/role selection + script load.
//! 7. Run the session and print notices until completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use dialogue_coach::{
    analysis::{ApiMistakeAnalyzer, ApiPhoneticService, FallbackPhonetics},
    capture::{CaptureDevice, CaptureError, CaptureEvent, CaptureMode, CaptureSession},
    config::AppConfig,
    playback::{PlaybackError, PlaybackSession, Synthesizer, SystemSynthesizer},
    practice::PracticeStatus,
    remote::ChatClient,
    script::ApiScriptGenerator,
    session::{SessionCommand, SessionController, SessionNotice},
};

// ---------------------------------------------------------------------------
// ConsoleCapture — stdin stands in for the speech recognizer
// ---------------------------------------------------------------------------

/// Each started run reads one line from stdin and delivers it as a single
/// final transcript.  An empty line is a run that heard nothing.
struct ConsoleCapture {
    tx: mpsc::Sender<CaptureEvent>,
    generation: Arc<AtomicU64>,
}

impl ConsoleCapture {
    fn new(tx: mpsc::Sender<CaptureEvent>) -> Self {
        Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl CaptureDevice for ConsoleCapture {
    async fn start(&self, _mode: CaptureMode) -> Result<(), CaptureError> {
        let run = self.generation.load(Ordering::SeqCst);
        let generation = Arc::clone(&self.generation);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut line = String::new();
            let mut reader = BufReader::new(tokio::io::stdin());
            let read = reader.read_line(&mut line).await.unwrap_or(0);

            // A stop()/abort() during the read supersedes this run; its End
            // was already sent.
            if generation.load(Ordering::SeqCst) != run {
                return;
            }

            let transcript = line.trim().to_string();
            if read > 0 && !transcript.is_empty() {
                let _ = tx
                    .send(CaptureEvent::Result {
                        index: 0,
                        transcript,
                        is_final: true,
                    })
                    .await;
            }
            let _ = tx.send(CaptureEvent::End).await;
        });

        Ok(())
    }

    async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(CaptureEvent::End).await;
    }

    async fn abort(&self) {
        self.stop().await;
    }
}

// ---------------------------------------------------------------------------
// SilentSynthesizer — fallback when the platform has no speech backend
// ---------------------------------------------------------------------------

struct SilentSynthesizer {
    ms_per_char: u64,
}

#[async_trait]
impl Synthesizer for SilentSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        let ms = (text.chars().count() as u64 * self.ms_per_char).max(500);
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        Ok(())
    }

    async fn cancel(&self) {}
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("dialogue-coach starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Language services — one chat endpoint serves all three.
    let chat = ChatClient::from_config(&config.service);
    let generator = Arc::new(ApiScriptGenerator::new(chat.clone()));
    let analyzer = Arc::new(ApiMistakeAnalyzer::new(chat.clone()));
    let phonetics = Arc::new(FallbackPhonetics::new(ApiPhoneticService::new(chat)));

    // 4. Playback — degrade to simulated timing when no backend exists.
    let synth: Arc<dyn Synthesizer> = match SystemSynthesizer::new(&config.speech) {
        Ok(synth) => Arc::new(synth),
        Err(e) => {
            log::warn!("speech synthesis unavailable ({e}) — lines will be paced silently");
            Arc::new(SilentSynthesizer {
                ms_per_char: config.speech.ms_per_char,
            })
        }
    };

    // 5. Devices and channels.
    let (capture_tx, capture_rx) = mpsc::channel::<CaptureEvent>(64);
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);
    let (notice_tx, mut notice_rx) = mpsc::channel::<SessionNotice>(64);

    let capture = CaptureSession::new(Arc::new(ConsoleCapture::new(capture_tx)));
    let playback = PlaybackSession::new(synth);

    // 6. Selection + script load.
    let scene = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.session.scene.clone());

    let mut controller = SessionController::new(
        generator,
        analyzer,
        phonetics,
        capture,
        playback,
        config.timing,
        notice_tx,
    );

    controller.choose_scene(scene.clone()).await?;
    controller
        .choose_roles(
            config.session.user_role.clone(),
            config.session.ai_role.clone(),
        )
        .await?;

    println!("Scene: {scene}");
    println!(
        "You play {:?}; the voice plays {:?}. Generating the script…\n",
        config.session.user_role, config.session.ai_role
    );
    controller.load_script(&config.session.difficulty).await?;

    // 7. Run, printing notices until the completion signal.
    let session = tokio::spawn(controller.run(capture_rx, command_rx));

    while let Some(notice) = notice_rx.recv().await {
        match notice {
            SessionNotice::PhaseChanged(phase) => {
                println!("— {}", phase.label());
            }
            SessionNotice::TurnStarted {
                speaker,
                self_spoken,
                ..
            } => {
                if self_spoken {
                    println!("[{speaker}] your line — type it and press Enter:");
                } else {
                    println!("[{speaker}] …");
                }
            }
            SessionNotice::MatchedWords { .. } => {}
            SessionNotice::TurnSubmitted { transcript, .. } => {
                println!("  heard: {transcript:?}");
            }
            SessionNotice::MistakesRecorded { count } => {
                println!("  {count} mistake(s) noted");
            }
            SessionNotice::CaptureBlocked { message } => {
                println!("  !! {message}");
                let _ = command_tx.send(SessionCommand::ClearCaptureError).await;
            }
            SessionNotice::ScriptFailed { message } => {
                println!("  !! {message}");
            }
            SessionNotice::PracticePrompt { index, total, word } => {
                println!(
                    "Practice {}/{}: {}  [{}] — type the word:",
                    index + 1,
                    total,
                    word.word,
                    word.phonemes.join("·")
                );
                let _ = command_tx.send(SessionCommand::Listen).await;
            }
            SessionNotice::PracticeStatusChanged(status) => {
                println!("  {}", status.label());
                if status == PracticeStatus::TryAgain {
                    println!("  try once more:");
                    let _ = command_tx.send(SessionCommand::Listen).await;
                }
            }
            SessionNotice::Complete => {
                println!("\nSession complete — well done!");
                break;
            }
        }
    }

    session.await?;
    Ok(())
}
