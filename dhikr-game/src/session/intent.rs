//! Queued player input, applied at the next step boundary.
use serde::{Deserialize, Serialize};

use super::event::{EventList, TapOutcome};
use super::{InstanceId, SessionError, SessionLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "instance", rename_all = "snake_case")]
pub enum SessionIntent {
    Tap(InstanceId),
    Pause,
    Resume,
    Quit,
}

/// Everything that happened during one `step`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutcome {
    pub events: EventList,
    /// False when the session was paused or ended before the tick.
    pub ticked: bool,
}

impl SessionLoop {
    /// Queue an intent for the next `step`.
    pub fn enqueue(&mut self, intent: SessionIntent) {
        self.intents.push_back(intent);
    }

    #[must_use]
    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    /// Apply queued intents in arrival order, then tick once if running.
    ///
    /// Intents that are not valid in the current phase are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` only when the session has ended
    /// and nothing was queued.
    pub fn step(&mut self) -> Result<StepOutcome, SessionError> {
        if self.phase().is_ended() && self.intents.is_empty() {
            return Err(SessionError::NotRunning(self.phase()));
        }
        let mut outcome = StepOutcome::default();
        while let Some(intent) = self.intents.pop_front() {
            let applied = match intent {
                SessionIntent::Tap(instance) => self.tap(instance).map(|tap| {
                    if let TapOutcome::Hit { events, .. } = tap {
                        outcome.events.extend(events);
                    }
                }),
                SessionIntent::Pause => self.pause(),
                SessionIntent::Resume => self.resume(),
                SessionIntent::Quit => {
                    let result = self.quit();
                    if result.is_ok() {
                        outcome.events.push(super::SessionEvent::Ended {
                            reason: super::EndReason::Quit,
                        });
                    }
                    result
                }
            };
            if let Err(err) = applied {
                log::debug!("dropped {intent:?}: {err}");
            }
        }
        if self.phase().is_running() {
            let tick = self.tick()?;
            outcome.events.extend(tick.events);
            outcome.ticked = true;
        }
        Ok(outcome)
    }
}
