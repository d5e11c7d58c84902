use std::fmt;

use bitflags::bitflags;

use crate::geometry::{self, Rect};

/// Opaque handle of a foreign window as reported by the window manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WindowStates: u32 {
        const KEEP_ABOVE = 1 << 0;
        const KEEP_BELOW = 1 << 1;
        const MAXIMIZED = 1 << 2;
        const MINIMIZED = 1 << 3;
        const DEMANDS_ATTENTION = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowType {
    #[default]
    Normal,
    Desktop,
    Dock,
    Dialog,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub states: WindowStates,
    pub window_type: WindowType,
    pub geometry: Rect,
}

impl WindowInfo {
    pub fn new(geometry: Rect) -> Self {
        Self {
            states: WindowStates::empty(),
            window_type: WindowType::Normal,
            geometry,
        }
    }

    pub fn with_states(mut self, states: WindowStates) -> Self {
        self.states = states;
        self
    }

    pub fn with_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    pub fn demands_attention(&self) -> bool {
        self.states.contains(WindowStates::DEMANDS_ATTENTION)
    }
}

/// Read side of the window manager. Every call is a fresh, point-in-time
/// query; `window_info` returns `None` for handles that are gone.
pub trait WindowStackQuery {
    /// Bottom-to-top.
    fn stacking_order(&self) -> Vec<WindowId>;
    fn window_info(&self, window: WindowId) -> Option<WindowInfo>;
    fn active_window(&self) -> Option<WindowId>;
}

/// Facts about the active window, fetched once per evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveWindow {
    pub id: WindowId,
    pub is_desktop: bool,
    pub is_maximized: bool,
    pub intersects_dock: bool,
}

/// Stacking questions asked about the dock, answered against a
/// [`WindowStackQuery`].
pub struct StackOracle<'a, Q: ?Sized> {
    query: &'a Q,
    dock: WindowId,
    transient: Option<WindowId>,
    mask: Rect,
}

impl<'a, Q: WindowStackQuery + ?Sized> StackOracle<'a, Q> {
    pub fn new(query: &'a Q, dock: WindowId, transient: Option<WindowId>, mask: Rect) -> Self {
        Self {
            query,
            dock,
            transient,
            mask,
        }
    }

    fn states(&self, window: WindowId) -> WindowStates {
        self.query
            .window_info(window)
            .map(|info| info.states)
            .unwrap_or_default()
    }

    pub fn is_on_top(&self, window: WindowId) -> bool {
        self.states(window).contains(WindowStates::KEEP_ABOVE)
    }

    pub fn is_on_bottom(&self, window: WindowId) -> bool {
        self.states(window).contains(WindowStates::KEEP_BELOW)
    }

    pub fn is_normal(&self, window: WindowId) -> bool {
        !self.is_on_top(window) && !self.is_on_bottom(window)
    }

    pub fn is_maximized(&self, window: WindowId) -> bool {
        self.states(window).contains(WindowStates::MAXIMIZED)
    }

    pub fn is_desktop_window(&self, window: WindowId) -> bool {
        self.query
            .window_info(window)
            .is_some_and(|info| info.window_type == WindowType::Desktop)
    }

    pub fn stacking_order(&self) -> Vec<WindowId> {
        self.query.stacking_order()
    }

    pub fn dock_is_covered(&self) -> bool {
        self.scan(ScanDirection::Above)
    }

    pub fn dock_is_covering(&self) -> bool {
        self.scan(ScanDirection::Below)
    }

    pub fn active_window(&self) -> Option<ActiveWindow> {
        let id = self.query.active_window()?;
        let info = self.query.window_info(id)?;
        Some(ActiveWindow {
            id,
            is_desktop: info.window_type == WindowType::Desktop,
            is_maximized: info.states.contains(WindowStates::MAXIMIZED),
            intersects_dock: geometry::intersects(info.geometry, self.mask),
        })
    }

    fn scan(&self, direction: ScanDirection) -> bool {
        let order = self.query.stacking_order();
        let Some(position) = order.iter().position(|window| *window == self.dock) else {
            tracing::trace!(dock = %self.dock, "dock missing from stacking order");
            return false;
        };

        let candidates = match direction {
            ScanDirection::Above => &order[position + 1..],
            ScanDirection::Below => &order[..position],
        };

        candidates.iter().any(|window| self.occludes(*window))
    }

    fn occludes(&self, window: WindowId) -> bool {
        if window == self.dock || Some(window) == self.transient {
            return false;
        }

        let Some(info) = self.query.window_info(window) else {
            return false;
        };

        info.window_type != WindowType::Desktop
            && !info.states.contains(WindowStates::MINIMIZED)
            && geometry::intersects(info.geometry, self.mask)
    }
}

#[derive(Clone, Copy)]
enum ScanDirection {
    Above,
    Below,
}
