//! Caller-side cooldown and single-slot queue for quota exhaustion.
//!
//! When the recognizer reports a quota failure, the controller enters a
//! cooldown, keeps at most one pending image (the latest capture wins), and
//! hands it back for resubmission once the countdown reaches zero.
//!
//! [`CooldownController`] is a plain state machine; [`QueueRunner`] drives it
//! with a ticker and a [`crate::Recognizer`].

mod runner;

pub use runner::{QueueCommand, QueueEvent, QueueRunner};

use crate::error::RecognitionError;
use crate::types::RecognitionResult;

/// Where the controller is in its cooldown cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownState {
    /// No cooldown; captures go straight to the recognizer
    Idle,
    /// Waiting out a quota limit
    Cooling {
        seconds_remaining: u32,
        queued: Option<String>,
    },
}

/// An image the driver should send to the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub image: String,
    generation: u64,
}

/// What to do with a new capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureDecision {
    /// Recognize this image now
    Submit(Submission),
    /// Cooling down; the image replaced whatever was queued
    Queued,
    /// A recognition is already in flight; the capture was dropped
    Busy,
}

/// How a finished recognition changed the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Recognized,
    /// Quota failure; the image is queued for the end of the cooldown
    CoolingDown { seconds: u32 },
    /// Non-quota failure; nothing is retried
    Failed,
    /// The controller was cancelled while this call was in flight
    Stale,
}

/// Result of one cooldown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Counting { seconds_remaining: u32 },
    /// Cooldown over with nothing queued
    Expired,
    /// Cooldown over; recognize the queued image
    Resubmit(Submission),
}

/// Cooldown/queue state machine.
#[derive(Debug)]
pub struct CooldownController {
    state: CooldownState,
    processing: bool,
    // Bumped on cancel so late completions can be told apart
    generation: u64,
    cooldown_secs: u32,
}

impl Default for CooldownController {
    fn default() -> Self {
        Self::new(45)
    }
}

impl CooldownController {
    pub fn new(cooldown_secs: u32) -> Self {
        Self {
            state: CooldownState::Idle,
            processing: false,
            generation: 0,
            cooldown_secs: cooldown_secs.max(1),
        }
    }

    pub fn state(&self) -> &CooldownState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Whether an image is waiting for the cooldown to end.
    pub fn has_queued(&self) -> bool {
        matches!(
            self.state,
            CooldownState::Cooling {
                queued: Some(_),
                ..
            }
        )
    }

    pub fn capture(&mut self, image: String) -> CaptureDecision {
        if let CooldownState::Cooling { queued, .. } = &mut self.state {
            *queued = Some(image);
            return CaptureDecision::Queued;
        }
        if self.processing {
            return CaptureDecision::Busy;
        }
        CaptureDecision::Submit(self.submit(image))
    }

    /// Apply the outcome of a submission.
    pub fn complete(
        &mut self,
        submission: &Submission,
        outcome: &Result<RecognitionResult, RecognitionError>,
    ) -> Completion {
        self.processing = false;
        if submission.generation != self.generation {
            return Completion::Stale;
        }

        match outcome {
            Ok(_) => Completion::Recognized,
            Err(e) if e.is_quota() => {
                self.state = CooldownState::Cooling {
                    seconds_remaining: self.cooldown_secs,
                    queued: Some(submission.image.clone()),
                };
                Completion::CoolingDown {
                    seconds: self.cooldown_secs,
                }
            }
            Err(_) => Completion::Failed,
        }
    }

    /// Advance the cooldown by one second.
    pub fn tick(&mut self) -> Tick {
        let CooldownState::Cooling {
            seconds_remaining,
            queued,
        } = &mut self.state
        else {
            return Tick::Idle;
        };

        *seconds_remaining = seconds_remaining.saturating_sub(1);
        if *seconds_remaining > 0 {
            return Tick::Counting {
                seconds_remaining: *seconds_remaining,
            };
        }
        if self.processing {
            // Hold the queued image until the current call settles
            return Tick::Counting {
                seconds_remaining: 0,
            };
        }

        let queued = queued.take();
        self.state = CooldownState::Idle;
        match queued {
            Some(image) => Tick::Resubmit(self.submit(image)),
            None => Tick::Expired,
        }
    }

    /// Drop the queued image and end the cooldown.
    ///
    /// A call already in flight still finishes, but its outcome no longer
    /// changes the state.
    pub fn cancel(&mut self) {
        self.state = CooldownState::Idle;
        self.generation += 1;
    }

    fn submit(&mut self, image: String) -> Submission {
        self.processing = true;
        Submission {
            image,
            generation: self.generation,
        }
    }
}
