//! calloop glue: one timer source kept at the controller's next deadline.

use std::time::Instant;

use calloop::{
    LoopHandle, RegistrationToken,
    timer::{TimeoutAction, Timer},
};

use crate::DockError;

#[derive(Debug, Default)]
pub struct DeadlineTimer {
    token: Option<RegistrationToken>,
    armed_for: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed_for(&self) -> Option<Instant> {
        self.armed_for
    }

    /// Re-registers the timer source when `deadline` moved. `fire` runs from
    /// the source callback and must call [`Self::fired`].
    pub fn sync<'l, D: 'l>(
        &mut self,
        handle: &LoopHandle<'l, D>,
        deadline: Option<Instant>,
        fire: fn(&mut D),
    ) -> Result<(), DockError> {
        if self.armed_for == deadline {
            return Ok(());
        }

        if let Some(token) = self.token.take() {
            handle.remove(token);
        }
        self.armed_for = None;

        let Some(deadline) = deadline else {
            return Ok(());
        };

        let token = handle
            .insert_source(Timer::from_deadline(deadline), move |_, _, data| {
                fire(data);
                TimeoutAction::Drop
            })
            .map_err(|err| {
                DockError::EventLoop(format!("failed to schedule dock timer: {err}"))
            })?;

        self.token = Some(token);
        self.armed_for = Some(deadline);
        Ok(())
    }

    /// Forgets the source after it fired and dropped itself.
    pub fn fired(&mut self) {
        self.token = None;
        self.armed_for = None;
    }
}
