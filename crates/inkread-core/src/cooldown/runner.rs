//! Async driver for the cooldown controller.
//!
//! Owns a [`CooldownController`], a [`Recognizer`] and a once-per-tick timer.
//! Captures and cancels arrive as commands; everything that happens is
//! reported back as events so a UI (or the CLI) can render it.

use super::{CaptureDecision, Completion, CooldownController, Submission, Tick};
use crate::config::CooldownConfig;
use crate::error::{RecognitionError, ServiceError};
use crate::llm::Recognizer;
use crate::types::RecognitionResult;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Input to a running queue.
#[derive(Debug, Clone)]
pub enum QueueCommand {
    /// A new image from the user
    Capture(String),
    /// Drop the queued image and leave the cooldown
    Cancel,
}

/// Everything the runner reports back.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// An image was sent to the recognizer
    Submitted { resubmission: bool },
    Recognized {
        image: String,
        result: RecognitionResult,
    },
    /// Captured during a cooldown; will be retried when it ends
    Queued,
    /// Captured while a recognition was in flight; ignored
    Busy,
    /// Quota exhausted; the triggering image is queued
    CoolingDown { seconds: u32, message: String },
    Countdown { seconds_remaining: u32 },
    /// Cooldown ended with nothing queued
    CooldownExpired,
    /// Non-quota failure; not retried
    ServiceUnavailable { image: String, error: ServiceError },
    Cancelled,
}

type Flight = JoinHandle<(Submission, Result<RecognitionResult, RecognitionError>)>;

/// Drives a [`CooldownController`] against a [`Recognizer`].
pub struct QueueRunner {
    recognizer: Recognizer,
    controller: CooldownController,
    tick: Duration,
}

impl QueueRunner {
    pub fn new(recognizer: Recognizer, config: &CooldownConfig) -> Self {
        Self::with_timing(
            recognizer,
            config.seconds,
            Duration::from_millis(config.tick_ms),
        )
    }

    /// Create a runner with an explicit cooldown length and tick period.
    pub fn with_timing(recognizer: Recognizer, cooldown_secs: u32, tick: Duration) -> Self {
        Self {
            recognizer,
            controller: CooldownController::new(cooldown_secs),
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the runner on the current tokio runtime.
    ///
    /// Returns the command sender and event receiver. Dropping the sender
    /// lets the runner finish its pending work and exit.
    pub fn spawn(
        self,
        buffer: usize,
    ) -> (
        mpsc::Sender<QueueCommand>,
        mpsc::Receiver<QueueEvent>,
        JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(buffer.max(1));
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(self.run(command_rx, event_tx));
        (command_tx, event_rx, handle)
    }

    /// Process commands until the channel closes and nothing is pending.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<QueueCommand>,
        events: mpsc::Sender<QueueEvent>,
    ) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut flight: Option<Flight> = None;
        let mut commands_open = true;

        loop {
            if !commands_open && flight.is_none() && !self.controller.has_queued() {
                break;
            }

            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(QueueCommand::Capture(image)) => {
                        match self.controller.capture(image) {
                            CaptureDecision::Submit(submission) => {
                                flight = Some(self.launch(submission));
                                emit(&events, QueueEvent::Submitted { resubmission: false }).await;
                            }
                            CaptureDecision::Queued => {
                                tracing::info!("Request queued. Will auto-retry when limit resets.");
                                emit(&events, QueueEvent::Queued).await;
                            }
                            CaptureDecision::Busy => emit(&events, QueueEvent::Busy).await,
                        }
                    }
                    Some(QueueCommand::Cancel) => {
                        self.controller.cancel();
                        emit(&events, QueueEvent::Cancelled).await;
                    }
                    None => commands_open = false,
                },

                joined = async {
                    match flight.as_mut() {
                        Some(handle) => handle.await,
                        None => std::future::pending().await,
                    }
                }, if flight.is_some() => {
                    flight = None;
                    let (submission, outcome) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            tracing::error!("Recognition task failed: {e}");
                            // The submission went down with the task; treat it as cancelled
                            self.controller.cancel();
                            emit(&events, QueueEvent::Cancelled).await;
                            continue;
                        }
                    };
                    self.settle(&submission, outcome, &mut ticker, &events).await;
                },

                _ = ticker.tick() => match self.controller.tick() {
                    Tick::Idle => {}
                    Tick::Counting { seconds_remaining } => {
                        emit(&events, QueueEvent::Countdown { seconds_remaining }).await;
                    }
                    Tick::Expired => emit(&events, QueueEvent::CooldownExpired).await,
                    Tick::Resubmit(submission) => {
                        tracing::info!("Cooldown over, resubmitting queued image");
                        flight = Some(self.launch(submission));
                        emit(&events, QueueEvent::Submitted { resubmission: true }).await;
                    }
                },
            }
        }

        tracing::debug!("Queue runner stopped");
    }

    fn launch(&self, submission: Submission) -> Flight {
        let recognizer = self.recognizer.clone();
        tokio::spawn(async move {
            let outcome = recognizer.recognize(&submission.image).await;
            (submission, outcome)
        })
    }

    async fn settle(
        &mut self,
        submission: &Submission,
        outcome: Result<RecognitionResult, RecognitionError>,
        ticker: &mut Interval,
        events: &mpsc::Sender<QueueEvent>,
    ) {
        match self.controller.complete(submission, &outcome) {
            Completion::Stale => {
                tracing::debug!("Ignoring result that arrived after cancel");
            }
            Completion::Recognized => {
                if let Ok(result) = outcome {
                    emit(
                        events,
                        QueueEvent::Recognized {
                            image: submission.image.clone(),
                            result,
                        },
                    )
                    .await;
                }
            }
            Completion::CoolingDown { seconds } => {
                // Count whole ticks from the moment the cooldown starts
                ticker.reset();
                let message = outcome.err().map(|e| e.to_string()).unwrap_or_default();
                tracing::warn!("Free tier limit reached, cooling down for {seconds}s: {message}");
                emit(events, QueueEvent::CoolingDown { seconds, message }).await;
            }
            Completion::Failed => {
                if let Err(RecognitionError::Service(error)) = outcome {
                    tracing::error!("Recognition service unavailable: {error}");
                    emit(
                        events,
                        QueueEvent::ServiceUnavailable {
                            image: submission.image.clone(),
                            error,
                        },
                    )
                    .await;
                }
            }
        }
    }
}

async fn emit(events: &mpsc::Sender<QueueEvent>, event: QueueEvent) {
    if events.send(event).await.is_err() {
        tracing::debug!("Queue event receiver dropped");
    }
}
