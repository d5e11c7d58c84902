//! The dock visibility state machine.
//!
//! [`DockController`] owns the dock's window state, ingests window-manager
//! events and, once its debounce timer fires, asks the visibility policy what
//! to do with the dock's stacking. Effects leave through a [`PlacementSink`]
//! and observers registered with [`DockController::subscribe`].

use std::time::{Duration, Instant};

use crate::{
    attention::{AttentionLatch, LatchChange},
    config::DockConfig,
    evaluator::{Clock, Debouncer, MonotonicClock},
    geometry::{DockGeometry, Location, Orientation, Rect},
    notify::{DockNotification, ObserverId, Observers},
    placement::{PlacementSink, TransientChild},
    visibility::{self, DockFlags, DockStackFacts, Intervals, PlacementAction, VisibilityMode},
    window::{StackOracle, WindowId, WindowStackQuery},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DockEvent {
    ActiveWindowChanged(Option<WindowId>),
    WindowChanged(WindowId),
    WindowRemoved(WindowId),
    HoverEnter,
    HoverLeave,
    ContextMenuOpened,
    ContextMenuClosed,
    ScreenChanged(Rect),
    GeometryChanged(Rect),
    MaskChanged(Option<Rect>),
}

pub struct DockController<Q, P> {
    dock: WindowId,
    query: Q,
    sink: P,
    transient: Option<Box<dyn TransientChild>>,
    clock: Box<dyn Clock>,
    observers: Observers,

    mode: VisibilityMode,
    geometry: DockGeometry,
    intervals: Intervals,
    shrink_thickness: i32,

    hovered: bool,
    disable_hiding: bool,
    window_in_attention: bool,
    is_auto_hidden: bool,
    immutable: bool,
    maximum_length: u32,
    children_length: i32,
    temp_thickness: Option<u32>,
    second_init_pass: bool,

    active_window: Option<WindowId>,
    attention: AttentionLatch,

    update_timer: Debouncer,
    init_timer: Debouncer,
}

impl<Q: WindowStackQuery, P: PlacementSink> DockController<Q, P> {
    pub fn new(dock: WindowId, config: &DockConfig, query: Q, sink: P) -> Self {
        let mode = config.visibility;
        Self {
            dock,
            query,
            sink,
            transient: None,
            clock: Box::new(MonotonicClock),
            observers: Observers::default(),

            mode,
            geometry: DockGeometry::new(config.location),
            intervals: config.intervals,
            shrink_thickness: config.shrink_thickness,

            hovered: false,
            disable_hiding: false,
            window_in_attention: false,
            is_auto_hidden: false,
            immutable: config.immutable,
            maximum_length: 0,
            children_length: -1,
            temp_thickness: None,
            second_init_pass: false,

            active_window: None,
            attention: AttentionLatch::default(),

            update_timer: Debouncer::new(mode.update_interval(&config.intervals)),
            init_timer: Debouncer::new(config.init_interval),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_transient(mut self, transient: impl TransientChild + 'static) -> Self {
        self.transient = Some(Box::new(transient));
        self
    }

    pub fn dock(&self) -> WindowId {
        self.dock
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Q {
        &mut self.query
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&DockNotification) + 'static,
    ) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn visibility_mode(&self) -> VisibilityMode {
        self.mode
    }

    pub fn location(&self) -> Location {
        self.geometry.location()
    }

    pub fn orientation(&self) -> Orientation {
        self.geometry.orientation()
    }

    pub fn geometry(&self) -> Rect {
        self.geometry.window()
    }

    pub fn screen_geometry(&self) -> Rect {
        self.geometry.screen()
    }

    pub fn mask_area(&self) -> Option<Rect> {
        self.geometry.mask()
    }

    pub fn effective_mask(&self) -> Rect {
        self.geometry.effective_mask()
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn disable_hiding(&self) -> bool {
        self.disable_hiding
    }

    pub fn window_in_attention(&self) -> bool {
        self.window_in_attention
    }

    pub fn attention_window(&self) -> Option<WindowId> {
        self.attention.window()
    }

    pub fn is_auto_hidden(&self) -> bool {
        self.is_auto_hidden
    }

    pub fn immutable(&self) -> bool {
        self.immutable
    }

    pub fn maximum_length(&self) -> u32 {
        self.maximum_length
    }

    pub fn children_length(&self) -> i32 {
        self.children_length
    }

    pub fn active_window(&self) -> Option<WindowId> {
        self.active_window
    }

    pub fn update_interval(&self) -> Duration {
        self.update_timer.interval()
    }

    /// Whether a debounced evaluation is armed.
    pub fn is_update_pending(&self) -> bool {
        self.update_timer.is_active()
    }

    pub fn is_initializing(&self) -> bool {
        self.init_timer.is_active()
    }

    /// Earliest instant at which [`Self::dispatch_timers`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.update_timer.deadline(), self.init_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires every timer whose deadline has passed. Returns whether anything ran.
    pub fn dispatch_timers(&mut self, now: Instant) -> bool {
        let mut fired = false;
        if self.init_timer.expire(now) {
            self.init_window();
            fired = true;
        }
        if self.update_timer.expire(now) {
            self.evaluate();
            fired = true;
        }
        fired
    }

    /// Applies the visibility flags once and schedules the two delayed
    /// initialisation passes that shrink and position the transient child.
    pub fn initialize(&mut self) {
        tracing::debug!(dock = %self.dock, mode = %self.mode, "initializing dock");
        self.update_visibility_flags();
        self.second_init_pass = true;
        self.init_timer.start(self.clock.now());
    }

    pub fn handle_event(&mut self, event: DockEvent) {
        tracing::trace!(?event, "dock event");
        match event {
            DockEvent::ActiveWindowChanged(window) => self.active_window_changed(window),
            DockEvent::WindowChanged(window) => self.window_changed(window),
            DockEvent::WindowRemoved(window) => self.window_removed(window),
            DockEvent::HoverEnter => self.hover_enter(),
            DockEvent::HoverLeave => self.hover_leave(),
            DockEvent::ContextMenuOpened => self.context_menu_opened(),
            DockEvent::ContextMenuClosed => self.context_menu_closed(),
            DockEvent::ScreenChanged(screen) => self.set_screen_geometry(screen),
            DockEvent::GeometryChanged(geometry) => self.set_geometry(geometry),
            DockEvent::MaskChanged(mask) => self.set_mask_area(mask),
        }
    }

    pub fn active_window_changed(&mut self, window: Option<WindowId>) {
        self.active_window = window;

        if self.mode == VisibilityMode::WindowsGoBelow {
            return;
        }

        // activation bursts must not keep pushing the deadline back
        self.arm_if_idle();
    }

    pub fn window_changed(&mut self, window: WindowId) {
        let demands_attention = self
            .query
            .window_info(window)
            .is_some_and(|info| info.demands_attention());

        match self.attention.update(window, demands_attention) {
            Some(LatchChange::Latched(window)) => {
                tracing::debug!(%window, "window demands attention");
                self.set_window_in_attention(true);
            }
            Some(LatchChange::Released(window)) => {
                tracing::debug!(%window, "window no longer demands attention");
                self.set_window_in_attention(false);
            }
            None => {}
        }

        if self.mode.tracks_active_window() && self.active_window == Some(window) {
            self.arm_if_idle();
        }
    }

    pub fn window_removed(&mut self, window: WindowId) {
        if self.attention.forget(window).is_some() {
            tracing::debug!(%window, "window in attention was removed");
            self.set_window_in_attention(false);
        }
    }

    pub fn hover_enter(&mut self) {
        self.set_is_hovered(true);
        self.update_timer.stop();
        self.shrink_transient();

        if self.mode == VisibilityMode::AutoHide {
            if self.is_auto_hidden {
                self.apply(PlacementAction::Raise);
            }
        } else {
            self.show_on_top();
        }
    }

    pub fn hover_leave(&mut self) {
        if self.query.active_window() == Some(self.dock) {
            tracing::trace!("ignoring hover leave while the dock is active");
            return;
        }

        self.set_is_hovered(false);

        if self.mode != VisibilityMode::WindowsGoBelow {
            self.arm();
        }
    }

    pub fn context_menu_opened(&mut self) {
        self.set_disable_hiding(true);
    }

    pub fn context_menu_closed(&mut self) {
        self.set_disable_hiding(false);
        self.arm();
    }

    pub fn set_visibility_mode(&mut self, mode: VisibilityMode) {
        if self.mode == mode {
            return;
        }

        tracing::info!(from = %self.mode, to = %mode, "dock visibility mode changed");
        self.mode = mode;
        self.observers
            .emit(DockNotification::PanelVisibilityChanged(mode));
        self.update_visibility_flags();
    }

    pub fn set_location(&mut self, location: Location) {
        if !self.geometry.set_location(location) {
            return;
        }

        self.observers.emit(DockNotification::LocationChanged);
        self.reposition();
    }

    pub fn set_screen_geometry(&mut self, screen: Rect) {
        if !self.geometry.set_screen(screen) {
            return;
        }

        tracing::debug!(?screen, "dock screen geometry changed");
        self.observers
            .emit(DockNotification::ScreenGeometryChanged(screen));
        self.reposition();
    }

    pub fn set_geometry(&mut self, geometry: Rect) {
        let previous_mask = self.geometry.effective_mask();
        if !self.geometry.set_window(geometry) {
            return;
        }

        let mask = self.geometry.effective_mask();
        if mask != previous_mask {
            self.observers.emit(DockNotification::MaskAreaChanged(mask));
        }
        self.reposition();
    }

    pub fn set_mask_area(&mut self, mask: Option<Rect>) {
        if !self.geometry.set_mask(mask) {
            return;
        }

        self.observers
            .emit(DockNotification::MaskAreaChanged(self.geometry.effective_mask()));
    }

    pub fn set_is_auto_hidden(&mut self, auto_hidden: bool) {
        if self.is_auto_hidden == auto_hidden {
            return;
        }

        self.is_auto_hidden = auto_hidden;
        self.observers
            .emit(DockNotification::IsAutoHiddenChanged(auto_hidden));
    }

    pub fn set_disable_hiding(&mut self, disable: bool) {
        if self.disable_hiding == disable {
            return;
        }

        self.disable_hiding = disable;
        self.observers
            .emit(DockNotification::DisableHidingChanged(disable));

        if !disable {
            self.arm();
        }
    }

    pub fn set_immutable(&mut self, immutable: bool) {
        if self.immutable == immutable {
            return;
        }

        self.immutable = immutable;
        self.observers
            .emit(DockNotification::ImmutableChanged(immutable));
    }

    pub fn set_children_length(&mut self, length: i32) {
        if self.children_length == length {
            return;
        }

        self.children_length = length;
        self.observers
            .emit(DockNotification::ChildrenLengthChanged(length));
    }

    /// Pins the transient child's thickness. The first call starts a single
    /// initialisation pass that re-applies it; the next call clears it.
    pub fn set_transient_thickness(&mut self, thickness: u32) {
        if thickness == 0 {
            return;
        }
        let Ok(pixels) = i32::try_from(thickness) else {
            tracing::warn!(thickness, "transient thickness out of range");
            return;
        };

        let layout = {
            let Some(child) = self.transient.as_mut() else {
                return;
            };
            let layout = self
                .geometry
                .thick_transient(child.geometry(), pixels);
            child.apply_layout(layout);
            layout
        };
        tracing::debug!(thickness, geometry = ?layout.geometry, "transient thickness applied");

        if self.temp_thickness.is_none() {
            self.temp_thickness = Some(thickness);
            self.second_init_pass = false;
            self.init_timer.start(self.clock.now());
        } else {
            self.temp_thickness = None;
        }
    }

    pub fn update_maximum_length(&mut self) {
        let Some(child) = self.transient.as_ref() else {
            return;
        };

        let maximum = child.maximum_size();
        let length = match self.geometry.orientation() {
            Orientation::Horizontal => maximum.w,
            Orientation::Vertical => maximum.h,
        }
        .max(0) as u32;

        if self.maximum_length == length {
            return;
        }

        self.maximum_length = length;
        self.observers
            .emit(DockNotification::MaximumLengthChanged(length));
    }

    pub fn shrink_transient(&mut self) {
        if !self.immutable || self.transient.is_none() {
            return;
        }

        self.update_maximum_length();

        let thickness = self.shrink_thickness;
        let children_length = self.children_length;
        if let Some(child) = self.transient.as_mut() {
            let layout = self
                .geometry
                .shrunk_transient(child.geometry(), thickness, children_length);
            child.apply_layout(layout);
        }
    }

    /// Moves the dock window against its screen edge.
    pub fn reposition(&mut self) {
        let target = self.geometry.docked_position();
        if self.geometry.window().loc == target {
            return;
        }

        tracing::debug!(location = %self.geometry.location(), ?target, "repositioning dock");
        self.sink.move_dock(target);
    }

    /// Re-derives the dock's stacking from the current mode and a fresh look
    /// at the window stack.
    pub fn evaluate(&mut self) {
        let flags = DockFlags {
            hovered: self.hovered,
            in_attention: self.window_in_attention,
            disable_hiding: self.disable_hiding,
            auto_hidden: self.is_auto_hidden,
        };

        let action = {
            let transient = self.transient.as_ref().map(|child| child.handle());
            let oracle = StackOracle::new(
                &self.query,
                self.dock,
                transient,
                self.geometry.effective_mask(),
            );
            let facts = DockStackFacts::new(oracle, self.dock);
            visibility::decide(self.mode, flags, &facts)
        };

        tracing::debug!(mode = %self.mode, ?flags, ?action, "evaluated dock state");

        if let Some(action) = action {
            self.apply(action);
        }
    }

    fn apply(&mut self, action: PlacementAction) {
        match action {
            PlacementAction::Raise => {
                self.sink.request_raise();
                self.observers.emit(DockNotification::MustBeRaised);
            }
            PlacementAction::Lower => {
                self.sink.request_lower();
                self.observers.emit(DockNotification::MustBeLowered);
            }
            PlacementAction::PinAbove => self.show_on_top(),
            PlacementAction::PinBelow => self.sink.pin_below_normal(),
        }
    }

    fn show_on_top(&mut self) {
        self.sink.pin_above_normal();
    }

    fn update_visibility_flags(&mut self) {
        self.sink.show_on_all_desktops();
        self.update_timer
            .set_interval(self.mode.update_interval(&self.intervals));

        if self.mode == VisibilityMode::AlwaysVisible {
            self.sink.declare_always_on_top_type();
            self.reposition();
        } else {
            self.reposition();
            self.show_on_top();
            self.arm();
        }
    }

    fn init_window(&mut self) {
        self.update_visibility_flags();

        match self.temp_thickness {
            Some(thickness) => self.set_transient_thickness(thickness),
            None => self.shrink_transient(),
        }

        self.reposition();

        // the second pass positions the windows once the type change settled
        if self.second_init_pass {
            self.second_init_pass = false;
            self.init_timer.start(self.clock.now());
        }
    }

    fn set_is_hovered(&mut self, hovered: bool) {
        if self.hovered == hovered {
            return;
        }

        self.hovered = hovered;
        self.observers
            .emit(DockNotification::IsHoveredChanged(hovered));
    }

    fn set_window_in_attention(&mut self, in_attention: bool) {
        if self.window_in_attention == in_attention {
            return;
        }

        self.window_in_attention = in_attention;
        self.observers
            .emit(DockNotification::WindowInAttentionChanged(in_attention));
        self.evaluate();
    }

    fn arm(&mut self) {
        self.update_timer.start(self.clock.now());
    }

    fn arm_if_idle(&mut self) {
        if !self.update_timer.is_active() {
            self.arm();
        }
    }
}
