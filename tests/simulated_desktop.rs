use std::time::Duration;

use nowdock::{
    DockController, DockEvent, VisibilityMode, WindowId, WindowInfo, WindowStackQuery,
    WindowStates,
    backend::toplevel::{LayerPlacement, ToplevelRegistry},
    config::DockConfig,
    evaluator::{Clock, ManualClock},
    geometry::rect,
    window::WindowType,
};
use smithay::{
    reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_handle_v1::State,
    wayland::shell::wlr_layer::Layer,
};

const DOCK: WindowId = WindowId(1);

fn settle(dock: &mut DockController<ToplevelRegistry, LayerPlacement>) {
    loop {
        let requests = dock.sink_mut().take_requests();
        if requests.is_empty() {
            break;
        }
        for request in requests {
            let events = dock.query_mut().apply_request(DOCK, request);
            for event in events {
                dock.handle_event(event);
            }
        }
    }
}

/// Bottom dock on a 1920x1080 desktop, initialised and pinned on top.
fn docked(mode: VisibilityMode, clock: &ManualClock) -> DockController<ToplevelRegistry, LayerPlacement> {
    let mut registry = ToplevelRegistry::new();
    registry.map(
        DOCK,
        WindowInfo::new(rect(0, 0, 1920, 64)).with_type(WindowType::Dock),
    );

    let config = DockConfig {
        visibility: mode,
        ..DockConfig::default()
    };
    let mut dock = DockController::new(DOCK, &config, registry, LayerPlacement::new())
        .with_clock(clock.clone());

    dock.handle_event(DockEvent::ScreenChanged(rect(0, 0, 1920, 1080)));
    dock.handle_event(DockEvent::GeometryChanged(rect(0, 0, 1920, 64)));
    dock.initialize();
    settle(&mut dock);
    while dock.is_initializing() {
        clock.advance(Duration::from_millis(400));
        assert!(dock.dispatch_timers(clock.now()));
        settle(&mut dock);
    }
    dock
}

#[test]
fn dock_steps_aside_for_an_overlapping_active_window() {
    let clock = ManualClock::new();
    let mut dock = docked(VisibilityMode::BelowActive, &clock);

    assert_eq!(dock.geometry(), rect(0, 1016, 1920, 64));
    assert_eq!(dock.sink().layer(), Layer::Top);
    assert!(
        dock.query()
            .window_info(DOCK)
            .unwrap()
            .states
            .contains(WindowStates::KEEP_ABOVE)
    );

    let event = dock
        .query_mut()
        .map(WindowId(2), WindowInfo::new(rect(0, 0, 1920, 1080)));
    dock.handle_event(event);
    let activated = dock.query_mut().activate(Some(WindowId(2))).unwrap();
    dock.handle_event(activated);

    clock.advance(Duration::from_millis(1500));
    assert!(dock.dispatch_timers(clock.now()));
    settle(&mut dock);

    assert_eq!(dock.sink().layer(), Layer::Bottom);
    assert_eq!(
        dock.query().stacking_order(),
        vec![DOCK, WindowId(2)]
    );

    // hovering brings it back on top
    dock.handle_event(DockEvent::HoverEnter);
    settle(&mut dock);
    assert_eq!(dock.sink().layer(), Layer::Top);
    assert_eq!(
        dock.query().stacking_order(),
        vec![WindowId(2), DOCK]
    );
    assert_eq!(dock.visibility_mode(), VisibilityMode::BelowActive);
}

#[test]
fn maximized_toplevel_state_hides_the_dock() {
    let clock = ManualClock::new();
    let mut dock = docked(VisibilityMode::BelowMaximized, &clock);
    assert_eq!(dock.sink().layer(), Layer::Top);

    let event = dock
        .query_mut()
        .map(WindowId(2), WindowInfo::new(rect(0, 0, 1920, 1080)));
    dock.handle_event(event);

    let events = dock.query_mut().apply_protocol_states(
        WindowId(2),
        &[State::Maximized as u32, State::Activated as u32],
    );
    assert!(events.contains(&DockEvent::ActiveWindowChanged(Some(WindowId(2)))));
    assert!(
        dock.query()
            .window_info(WindowId(2))
            .unwrap()
            .states
            .contains(WindowStates::MAXIMIZED)
    );
    for event in events {
        dock.handle_event(event);
    }
    assert_eq!(dock.active_window(), Some(WindowId(2)));

    clock.advance(Duration::from_millis(1500));
    assert!(dock.dispatch_timers(clock.now()));
    settle(&mut dock);

    assert_eq!(dock.sink().layer(), Layer::Bottom);
    assert_eq!(dock.query().stacking_order(), vec![DOCK, WindowId(2)]);
}
