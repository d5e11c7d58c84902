#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc, time::Duration};

use nowdock::{
    DockController, DockEvent, DockNotification, VisibilityMode, WindowId, WindowInfo,
    WindowStackQuery, WindowStates,
    config::DockConfig,
    evaluator::{Clock, ManualClock},
    geometry::{Rect, TransientLayout, rect},
    placement::{PlacementSink, TransientChild},
    window::WindowType,
};
use smithay::utils::{Logical, Point, Size};

pub const DOCK: WindowId = WindowId(1);
pub const CONTENT: WindowId = WindowId(50);

pub fn screen() -> Rect {
    rect(0, 0, 1920, 1080)
}

/// Bottom dock hugging the screen edge.
pub fn dock_rect() -> Rect {
    rect(0, 1016, 1920, 64)
}

pub fn covering() -> WindowInfo {
    WindowInfo::new(rect(0, 0, 1920, 1080))
}

pub fn distant() -> WindowInfo {
    WindowInfo::new(rect(0, 0, 800, 600))
}

#[derive(Default)]
pub struct Stack {
    order: Vec<WindowId>,
    windows: HashMap<WindowId, WindowInfo>,
    active: Option<WindowId>,
}

impl Stack {
    pub fn push(&mut self, window: WindowId, info: WindowInfo) {
        self.order.push(window);
        self.windows.insert(window, info);
    }

    pub fn insert(&mut self, index: usize, window: WindowId, info: WindowInfo) {
        self.order.insert(index, window);
        self.windows.insert(window, info);
    }

    pub fn remove(&mut self, window: WindowId) {
        self.order.retain(|id| *id != window);
        self.windows.remove(&window);
    }

    pub fn set_states(&mut self, window: WindowId, states: WindowStates) {
        if let Some(info) = self.windows.get_mut(&window) {
            info.states = states;
        }
    }

    pub fn set_active(&mut self, window: Option<WindowId>) {
        self.active = window;
    }
}

impl WindowStackQuery for Stack {
    fn stacking_order(&self) -> Vec<WindowId> {
        self.order.clone()
    }

    fn window_info(&self, window: WindowId) -> Option<WindowInfo> {
        self.windows.get(&window).copied()
    }

    fn active_window(&self) -> Option<WindowId> {
        self.active
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Raise,
    Lower,
    PinAbove,
    PinBelow,
    AlwaysOnTopType,
    AllDesktops,
    Move(Point<i32, Logical>),
}

#[derive(Default)]
pub struct Recorder {
    pub effects: Vec<Effect>,
}

impl PlacementSink for Recorder {
    fn request_raise(&mut self) {
        self.effects.push(Effect::Raise);
    }

    fn request_lower(&mut self) {
        self.effects.push(Effect::Lower);
    }

    fn pin_above_normal(&mut self) {
        self.effects.push(Effect::PinAbove);
    }

    fn pin_below_normal(&mut self) {
        self.effects.push(Effect::PinBelow);
    }

    fn declare_always_on_top_type(&mut self) {
        self.effects.push(Effect::AlwaysOnTopType);
    }

    fn show_on_all_desktops(&mut self) {
        self.effects.push(Effect::AllDesktops);
    }

    fn move_dock(&mut self, position: Point<i32, Logical>) {
        self.effects.push(Effect::Move(position));
    }
}

/// Content window recording every layout it is given.
pub struct Content {
    pub geometry: Rect,
    pub maximum_size: Size<i32, Logical>,
    pub layouts: Rc<RefCell<Vec<TransientLayout>>>,
}

impl Content {
    pub fn new() -> Self {
        Self {
            geometry: rect(480, 1016, 960, 64),
            maximum_size: Size::from((1920, 200)),
            layouts: Rc::default(),
        }
    }
}

impl TransientChild for Content {
    fn handle(&self) -> WindowId {
        CONTENT
    }

    fn geometry(&self) -> Rect {
        self.geometry
    }

    fn maximum_size(&self) -> Size<i32, Logical> {
        self.maximum_size
    }

    fn apply_layout(&mut self, layout: TransientLayout) {
        self.geometry = layout.geometry;
        self.layouts.borrow_mut().push(layout);
    }
}

pub struct Harness {
    pub dock: DockController<Stack, Recorder>,
    pub clock: ManualClock,
    pub seen: Rc<RefCell<Vec<DockNotification>>>,
}

impl Harness {
    /// Dock placed on the bottom edge, kept above normal windows when
    /// `on_top` is set. Nothing is armed yet.
    pub fn new(mode: VisibilityMode, on_top: bool) -> Self {
        Self::build(mode, on_top, None)
    }

    pub fn with_content(mode: VisibilityMode, content: Content) -> Self {
        Self::build(mode, true, Some(content))
    }

    fn build(mode: VisibilityMode, on_top: bool, content: Option<Content>) -> Self {
        let config = DockConfig {
            visibility: mode,
            ..DockConfig::default()
        };

        let states = if on_top {
            WindowStates::KEEP_ABOVE
        } else {
            WindowStates::empty()
        };
        let mut stack = Stack::default();
        stack.push(
            DOCK,
            WindowInfo::new(dock_rect())
                .with_states(states)
                .with_type(WindowType::Dock),
        );

        let clock = ManualClock::new();
        let mut dock = DockController::new(DOCK, &config, stack, Recorder::default())
            .with_clock(clock.clone());
        if let Some(content) = content {
            dock = dock.with_transient(content);
        }

        dock.handle_event(DockEvent::ScreenChanged(screen()));
        dock.handle_event(DockEvent::GeometryChanged(dock_rect()));
        dock.sink_mut().effects.clear();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        dock.subscribe(move |notification| sink.borrow_mut().push(*notification));

        Self { dock, clock, seen }
    }

    pub fn stack(&mut self) -> &mut Stack {
        self.dock.query_mut()
    }

    /// Moves the clock forward and fires whatever became due.
    pub fn advance(&mut self, millis: u64) -> bool {
        self.clock.advance(Duration::from_millis(millis));
        self.dock.dispatch_timers(self.clock.now())
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.dock.sink_mut().effects)
    }

    pub fn take_notifications(&mut self) -> Vec<DockNotification> {
        std::mem::take(&mut *self.seen.borrow_mut())
    }
}
