//! In-process window stack fed by a compositor's toplevel bookkeeping.
//!
//! [`ToplevelRegistry`] mirrors what a compositor exports over
//! `zwlr_foreign_toplevel_management_v1` (plus keep-above/below and attention
//! bits, which that protocol lacks) and answers [`WindowStackQuery`].
//! [`LayerPlacement`] turns placement hints into layer-shell layers and
//! queued requests that the compositor applies back to the registry.

use std::collections::HashMap;

use smithay::{
    reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_handle_v1::State,
    utils::{Logical, Point},
    wayland::shell::wlr_layer::Layer,
};

use crate::{
    controller::DockEvent,
    placement::PlacementSink,
    window::{WindowId, WindowInfo, WindowStackQuery, WindowStates},
};

/// Decodes a foreign-toplevel `state` array. The second value reports whether
/// the toplevel is activated.
pub fn decode_protocol_states(states: &[u32]) -> (WindowStates, bool) {
    let mut decoded = WindowStates::empty();
    let mut activated = false;
    for state in states {
        match *state {
            s if s == State::Maximized as u32 => decoded |= WindowStates::MAXIMIZED,
            s if s == State::Minimized as u32 => decoded |= WindowStates::MINIMIZED,
            s if s == State::Activated as u32 => activated = true,
            _ => {}
        }
    }
    (decoded, activated)
}

#[derive(Debug, Default)]
pub struct ToplevelRegistry {
    toplevels: HashMap<WindowId, WindowInfo>,
    /// Bottom-most first.
    stacking: Vec<WindowId>,
    active: Option<WindowId>,
}

impl ToplevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.toplevels.contains_key(&window)
    }

    /// Maps a new toplevel on top of its layer, or replaces the info of a
    /// known one in place.
    pub fn map(&mut self, window: WindowId, info: WindowInfo) -> DockEvent {
        if self.toplevels.insert(window, info).is_none() {
            self.stacking.push(window);
        }
        self.restack();
        DockEvent::WindowChanged(window)
    }

    pub fn unmap(&mut self, window: WindowId) -> Option<Vec<DockEvent>> {
        self.toplevels.remove(&window)?;
        self.stacking.retain(|id| *id != window);

        let mut events = vec![DockEvent::WindowRemoved(window)];
        if self.active == Some(window) {
            self.active = None;
            events.push(DockEvent::ActiveWindowChanged(None));
        }
        Some(events)
    }

    pub fn update(
        &mut self,
        window: WindowId,
        f: impl FnOnce(&mut WindowInfo),
    ) -> Option<DockEvent> {
        let info = self.toplevels.get_mut(&window)?;
        let before = *info;
        f(info);
        if *info == before {
            return None;
        }

        if info.states & LAYER_STATES != before.states & LAYER_STATES {
            self.restack();
        }
        Some(DockEvent::WindowChanged(window))
    }

    pub fn set_states(&mut self, window: WindowId, states: WindowStates) -> Option<DockEvent> {
        self.update(window, |info| info.states = states)
    }

    /// Applies a foreign-toplevel `state` array, activating the window when
    /// the array says so.
    pub fn apply_protocol_states(&mut self, window: WindowId, states: &[u32]) -> Vec<DockEvent> {
        let (decoded, activated) = decode_protocol_states(states);
        let mut events = Vec::new();

        let changed = self.update(window, |info| {
            info.states.remove(WindowStates::MAXIMIZED | WindowStates::MINIMIZED);
            info.states.insert(decoded);
        });
        events.extend(changed);

        if activated && self.active != Some(window) {
            events.extend(self.activate(Some(window)));
        }
        events
    }

    /// Focus change. Activated windows are raised within their layer.
    pub fn activate(&mut self, window: Option<WindowId>) -> Option<DockEvent> {
        if let Some(id) = window
            && !self.contains(id)
        {
            return None;
        }
        if self.active == window {
            return None;
        }

        self.active = window;
        if let Some(id) = window {
            self.raise(id);
        }
        Some(DockEvent::ActiveWindowChanged(window))
    }

    pub fn raise(&mut self, window: WindowId) -> bool {
        let Some(position) = self.stacking.iter().position(|id| *id == window) else {
            return false;
        };
        self.stacking.remove(position);
        self.stacking.push(window);
        self.restack();
        true
    }

    pub fn lower(&mut self, window: WindowId) -> bool {
        let Some(position) = self.stacking.iter().position(|id| *id == window) else {
            return false;
        };
        self.stacking.remove(position);
        self.stacking.insert(0, window);
        self.restack();
        true
    }

    pub fn move_window(&mut self, window: WindowId, position: Point<i32, Logical>) -> Option<DockEvent> {
        self.update(window, |info| info.geometry.loc = position)
    }

    /// Applies a queued request on behalf of `dock` and returns the events
    /// the compositor would report for it.
    pub fn apply_request(&mut self, dock: WindowId, request: PlacementRequest) -> Vec<DockEvent> {
        let mut events = Vec::new();
        match request {
            PlacementRequest::Raise => {
                self.raise(dock);
            }
            PlacementRequest::Lower => {
                events.extend(self.update(dock, |info| {
                    info.states.remove(WindowStates::KEEP_ABOVE);
                }));
                self.lower(dock);
            }
            PlacementRequest::Layer(layer) => {
                events.extend(self.update(dock, |info| {
                    info.states.remove(LAYER_STATES);
                    match layer {
                        Layer::Top | Layer::Overlay => info.states.insert(WindowStates::KEEP_ABOVE),
                        Layer::Background => info.states.insert(WindowStates::KEEP_BELOW),
                        Layer::Bottom => {}
                    }
                }));
            }
            PlacementRequest::AllDesktops => {}
            PlacementRequest::Move(position) => {
                if let Some(event) = self.move_window(dock, position) {
                    events.push(event);
                    if let Some(info) = self.toplevels.get(&dock) {
                        events.push(DockEvent::GeometryChanged(info.geometry));
                    }
                }
            }
        }
        events
    }

    /// Keeps keep-below windows at the bottom and keep-above windows on top
    /// while preserving the relative order inside each group.
    fn restack(&mut self) {
        let toplevels = &self.toplevels;
        self.stacking.sort_by_key(|id| {
            let states = toplevels
                .get(id)
                .map(|info| info.states)
                .unwrap_or_default();
            if states.contains(WindowStates::KEEP_BELOW) {
                0
            } else if states.contains(WindowStates::KEEP_ABOVE) {
                2
            } else {
                1
            }
        });
    }
}

const LAYER_STATES: WindowStates = WindowStates::KEEP_ABOVE.union(WindowStates::KEEP_BELOW);

impl WindowStackQuery for ToplevelRegistry {
    fn stacking_order(&self) -> Vec<WindowId> {
        self.stacking.clone()
    }

    fn window_info(&self, window: WindowId) -> Option<WindowInfo> {
        self.toplevels.get(&window).copied()
    }

    fn active_window(&self) -> Option<WindowId> {
        self.active
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementRequest {
    Raise,
    Lower,
    Layer(Layer),
    AllDesktops,
    Move(Point<i32, Logical>),
}

/// Placement sink for a layer-shell dock surface.
#[derive(Debug)]
pub struct LayerPlacement {
    layer: Layer,
    requests: Vec<PlacementRequest>,
}

impl Default for LayerPlacement {
    fn default() -> Self {
        Self {
            layer: Layer::Bottom,
            requests: Vec::new(),
        }
    }
}

impl LayerPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn pending(&self) -> &[PlacementRequest] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<PlacementRequest> {
        std::mem::take(&mut self.requests)
    }

    fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
        self.requests.push(PlacementRequest::Layer(layer));
    }
}

impl PlacementSink for LayerPlacement {
    fn request_raise(&mut self) {
        self.requests.push(PlacementRequest::Raise);
    }

    fn request_lower(&mut self) {
        if self.layer == Layer::Top {
            self.layer = Layer::Bottom;
        }
        self.requests.push(PlacementRequest::Lower);
    }

    fn pin_above_normal(&mut self) {
        self.set_layer(Layer::Top);
    }

    fn pin_below_normal(&mut self) {
        self.set_layer(Layer::Background);
    }

    fn declare_always_on_top_type(&mut self) {
        self.set_layer(Layer::Overlay);
    }

    fn show_on_all_desktops(&mut self) {
        self.requests.push(PlacementRequest::AllDesktops);
    }

    fn move_dock(&mut self, position: Point<i32, Logical>) {
        self.requests.push(PlacementRequest::Move(position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect;

    fn window() -> WindowInfo {
        WindowInfo::new(rect(0, 0, 100, 100))
    }

    #[test]
    fn keep_above_windows_stay_on_top() {
        let mut registry = ToplevelRegistry::new();
        registry.map(
            WindowId(1),
            window().with_states(WindowStates::KEEP_ABOVE),
        );
        registry.map(WindowId(2), window());
        registry.map(
            WindowId(3),
            window().with_states(WindowStates::KEEP_BELOW),
        );

        assert_eq!(
            registry.stacking_order(),
            vec![WindowId(3), WindowId(2), WindowId(1)]
        );

        registry.raise(WindowId(3));
        assert_eq!(registry.stacking_order()[0], WindowId(3));
    }

    #[test]
    fn unmapping_the_active_window_clears_focus() {
        let mut registry = ToplevelRegistry::new();
        registry.map(WindowId(1), window());
        assert_eq!(
            registry.activate(Some(WindowId(1))),
            Some(DockEvent::ActiveWindowChanged(Some(WindowId(1))))
        );
        assert_eq!(registry.activate(Some(WindowId(1))), None);

        let events = registry.unmap(WindowId(1)).unwrap();
        assert_eq!(
            events,
            vec![
                DockEvent::WindowRemoved(WindowId(1)),
                DockEvent::ActiveWindowChanged(None)
            ]
        );
        assert_eq!(registry.active_window(), None);
    }

    #[test]
    fn protocol_states_decode() {
        let (states, activated) = decode_protocol_states(&[
            State::Maximized as u32,
            State::Activated as u32,
            State::Fullscreen as u32,
        ]);
        assert_eq!(states, WindowStates::MAXIMIZED);
        assert!(activated);
    }

    #[test]
    fn lowering_the_dock_drops_keep_above() {
        let dock = WindowId(9);
        let mut registry = ToplevelRegistry::new();
        registry.map(WindowId(1), window());
        registry.map(dock, window());

        registry.apply_request(dock, PlacementRequest::Layer(Layer::Top));
        assert!(registry.window_info(dock).unwrap().states.contains(WindowStates::KEEP_ABOVE));

        registry.apply_request(dock, PlacementRequest::Lower);
        assert!(registry.window_info(dock).unwrap().states.is_empty());
        assert_eq!(registry.stacking_order(), vec![dock, WindowId(1)]);
    }

    #[test]
    fn sink_tracks_the_requested_layer() {
        let mut sink = LayerPlacement::new();
        sink.pin_above_normal();
        assert_eq!(sink.layer(), Layer::Top);
        sink.request_lower();
        assert_eq!(sink.layer(), Layer::Bottom);
        assert_eq!(
            sink.take_requests(),
            vec![PlacementRequest::Layer(Layer::Top), PlacementRequest::Lower]
        );
        assert!(sink.pending().is_empty());
    }
}
