use crate::window::WindowId;

/// Single slot remembering which foreign window is asking for attention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttentionLatch {
    window: Option<WindowId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatchChange {
    Latched(WindowId),
    Released(WindowId),
}

impl AttentionLatch {
    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    pub fn is_latched(&self) -> bool {
        self.window.is_some()
    }

    /// Feeds the current demands-attention state of `window`. Only an empty
    /// latch can be taken, and only by its holder can it be released.
    pub fn update(&mut self, window: WindowId, demands_attention: bool) -> Option<LatchChange> {
        match self.window {
            None if demands_attention => {
                self.window = Some(window);
                Some(LatchChange::Latched(window))
            }
            Some(held) if held == window && !demands_attention => {
                self.window = None;
                Some(LatchChange::Released(window))
            }
            _ => None,
        }
    }

    pub fn forget(&mut self, window: WindowId) -> Option<LatchChange> {
        if self.window != Some(window) {
            return None;
        }
        self.window = None;
        Some(LatchChange::Released(window))
    }
}
