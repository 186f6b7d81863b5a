//! Two-button input with claim-based routing
//!
//! Presses route to whichever state currently holds the claim. A state claims
//! the buttons on mount and releases them on dismount, so input can never
//! leak into a state that has already been torn down. Presses arriving while
//! nobody holds the claim are dropped.

use std::collections::VecDeque;

use pdn_core::prelude::*;
use pdn_core::StateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonInteraction {
    Click,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub button: Button,
    pub interaction: ButtonInteraction,
}

#[derive(Default)]
pub struct ButtonDriver {
    owner: Option<StateId>,
    queue: VecDeque<ButtonPress>,
}

impl ButtonDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of button input. Replaces any previous claim and drops
    /// presses queued for the old owner.
    pub fn claim(&mut self, owner: StateId) {
        if let Some(previous) = self.owner {
            if previous != owner {
                debug!(%previous, new = %owner, "button claim handed over");
            }
        }
        self.owner = Some(owner);
        self.queue.clear();
    }

    /// Release the claim if `owner` still holds it
    pub fn release(&mut self, owner: StateId) {
        if self.owner == Some(owner) {
            self.owner = None;
            self.queue.clear();
        }
    }

    pub fn claimed_by(&self) -> Option<StateId> {
        self.owner
    }

    /// Feed a hardware press into the queue
    pub fn inject(&mut self, button: Button, interaction: ButtonInteraction) {
        if self.owner.is_none() {
            trace!(?button, "press dropped, no claim held");
            return;
        }
        self.queue.push_back(ButtonPress {
            button,
            interaction,
        });
    }

    /// Pop the oldest queued press, only for the claim holder
    pub fn take_press(&mut self, owner: StateId) -> Option<ButtonPress> {
        if self.owner != Some(owner) {
            return None;
        }
        self.queue.pop_front()
    }
}
