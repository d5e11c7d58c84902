//! EWMH backend for X11 window managers.
//!
//! The stack is read from `_NET_CLIENT_LIST_STACKING`, per-window states from
//! `_NET_WM_STATE` and `_NET_WM_WINDOW_TYPE`. Placement hints are sent to the
//! window manager as root client messages.

use std::{
    cell::Cell,
    collections::HashSet,
    os::fd::{AsFd, OwnedFd},
    rc::Rc,
};

use anyhow::{Context, Result as AnyResult};
use smithay::utils::{Logical, Point};
use x11rb::{
    connection::Connection,
    protocol::{
        Event,
        xproto::{
            AtomEnum, CLIENT_MESSAGE_EVENT, ChangeWindowAttributesAux, ClientMessageData,
            ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _, EventMask, NotifyDetail,
            PropMode, StackMode, Window,
        },
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
};

use crate::{
    DockError,
    controller::DockEvent,
    geometry::{Rect, rect},
    placement::PlacementSink,
    window::{WindowId, WindowInfo, WindowStackQuery, WindowStates, WindowType},
};

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        _NET_CLIENT_LIST_STACKING,
        _NET_ACTIVE_WINDOW,
        _NET_WM_DESKTOP,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_BELOW,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_WM_STATE_HIDDEN,
        _NET_WM_STATE_DEMANDS_ATTENTION,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DESKTOP,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _NET_WM_WINDOW_TYPE_NORMAL,
    }
}

const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
/// Source indication for requests coming from pagers and panels.
const SOURCE_PAGER: u32 = 2;
const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

pub struct X11Session {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
    screen: Cell<Rect>,
}

/// Output rectangle of a root window of the given size.
fn root_rect(width: u16, height: u16) -> Rect {
    rect(0, 0, i32::from(width), i32::from(height))
}

/// Hover event for a pointer crossing on the dock. Crossings into or out of
/// the dock's own children keep the pointer over the dock and are dropped.
fn crossing_event(detail: NotifyDetail, entered: bool) -> Option<DockEvent> {
    if detail == NotifyDetail::INFERIOR {
        return None;
    }
    Some(if entered {
        DockEvent::HoverEnter
    } else {
        DockEvent::HoverLeave
    })
}

impl X11Session {
    pub fn connect() -> Result<Rc<Self>, DockError> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|err| DockError::Backend(format!("failed to connect to X server: {err}")))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_rect = root_rect(screen.width_in_pixels, screen.height_in_pixels);

        let atoms = Atoms::new(&conn)
            .map_err(|err| DockError::Backend(format!("failed to intern atoms: {err}")))?
            .reply()
            .map_err(|err| DockError::Backend(format!("failed to intern atoms: {err}")))?;

        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new()
                .event_mask(EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY),
        )
        .map_err(|err| DockError::Backend(format!("failed to watch root window: {err}")))?;
        conn.flush()
            .map_err(|err| DockError::Backend(format!("failed to flush X connection: {err}")))?;

        tracing::info!(root, ?screen_rect, "connected to X server");

        Ok(Rc::new(Self {
            conn,
            root,
            atoms,
            screen: Cell::new(screen_rect),
        }))
    }

    pub fn screen(&self) -> Rect {
        self.screen.get()
    }

    /// Duplicate of the connection socket for event-loop registration.
    pub fn event_fd(&self) -> Result<OwnedFd, DockError> {
        self.conn
            .stream()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|err| DockError::Backend(format!("failed to clone X socket: {err}")))
    }

    fn window_list(&self, property: u32) -> AnyResult<Vec<Window>> {
        let reply = self
            .conn
            .get_property(false, self.root, property, AtomEnum::WINDOW, 0, 4096)?
            .reply()?;
        Ok(reply
            .value32()
            .map(|values| values.collect())
            .unwrap_or_default())
    }

    fn atom_list(&self, window: Window, property: u32) -> AnyResult<Vec<u32>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 1024)?
            .reply()?;
        Ok(reply
            .value32()
            .map(|values| values.collect())
            .unwrap_or_default())
    }

    fn stacking(&self) -> AnyResult<Vec<Window>> {
        self.window_list(self.atoms._NET_CLIENT_LIST_STACKING)
    }

    fn active(&self) -> AnyResult<Option<Window>> {
        let active = self
            .window_list(self.atoms._NET_ACTIVE_WINDOW)?
            .first()
            .copied()
            .filter(|window| *window != x11rb::NONE);
        Ok(active)
    }

    fn geometry(&self, window: Window) -> AnyResult<Rect> {
        let geometry = self.conn.get_geometry(window)?.reply()?;
        let origin = self
            .conn
            .translate_coordinates(window, self.root, 0, 0)?
            .reply()?;
        Ok(rect(
            i32::from(origin.dst_x),
            i32::from(origin.dst_y),
            i32::from(geometry.width),
            i32::from(geometry.height),
        ))
    }

    fn window_info(&self, window: Window) -> AnyResult<WindowInfo> {
        let atoms = &self.atoms;

        let mut states = WindowStates::empty();
        let net_states = self.atom_list(window, atoms._NET_WM_STATE)?;
        for (atom, state) in [
            (atoms._NET_WM_STATE_ABOVE, WindowStates::KEEP_ABOVE),
            (atoms._NET_WM_STATE_BELOW, WindowStates::KEEP_BELOW),
            (atoms._NET_WM_STATE_HIDDEN, WindowStates::MINIMIZED),
            (atoms._NET_WM_STATE_DEMANDS_ATTENTION, WindowStates::DEMANDS_ATTENTION),
        ] {
            if net_states.contains(&atom) {
                states |= state;
            }
        }
        if net_states.contains(&atoms._NET_WM_STATE_MAXIMIZED_VERT)
            && net_states.contains(&atoms._NET_WM_STATE_MAXIMIZED_HORZ)
        {
            states |= WindowStates::MAXIMIZED;
        }

        // the first type the window lists is its preferred one
        let window_type = self
            .atom_list(window, atoms._NET_WM_WINDOW_TYPE)?
            .first()
            .map(|atom| match *atom {
                a if a == atoms._NET_WM_WINDOW_TYPE_DESKTOP => WindowType::Desktop,
                a if a == atoms._NET_WM_WINDOW_TYPE_DOCK => WindowType::Dock,
                a if a == atoms._NET_WM_WINDOW_TYPE_DIALOG => WindowType::Dialog,
                a if a == atoms._NET_WM_WINDOW_TYPE_NORMAL => WindowType::Normal,
                _ => WindowType::Other,
            })
            .unwrap_or_default();

        Ok(WindowInfo {
            states,
            window_type,
            geometry: self.geometry(window)?,
        })
    }

    fn send_root_message(&self, window: Window, type_: u32, data: [u32; 5]) -> AnyResult<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            window,
            type_,
            data: ClientMessageData::from(data),
            sequence: 0,
        };
        self.conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )?;
        Ok(())
    }

    fn change_state(&self, window: Window, action: u32, first: u32, second: u32) -> AnyResult<()> {
        self.send_root_message(
            window,
            self.atoms._NET_WM_STATE,
            [action, first, second, SOURCE_PAGER, 0],
        )
    }
}

/// [`WindowStackQuery`] over EWMH properties. X errors read as absent data.
#[derive(Clone)]
pub struct X11Stack {
    session: Rc<X11Session>,
}

impl X11Stack {
    pub fn new(session: Rc<X11Session>) -> Self {
        Self { session }
    }
}

impl WindowStackQuery for X11Stack {
    fn stacking_order(&self) -> Vec<WindowId> {
        match self.session.stacking() {
            Ok(windows) => windows.into_iter().map(WindowId).collect(),
            Err(err) => {
                tracing::warn!("failed to read client stacking: {err:#}");
                Vec::new()
            }
        }
    }

    fn window_info(&self, window: WindowId) -> Option<WindowInfo> {
        match self.session.window_info(window.0) {
            Ok(info) => Some(info),
            Err(err) => {
                tracing::trace!(%window, "window info unavailable: {err:#}");
                None
            }
        }
    }

    fn active_window(&self) -> Option<WindowId> {
        match self.session.active() {
            Ok(active) => active.map(WindowId),
            Err(err) => {
                tracing::warn!("failed to read active window: {err:#}");
                None
            }
        }
    }
}

pub struct X11Placement {
    session: Rc<X11Session>,
    dock: Window,
}

impl X11Placement {
    pub fn new(session: Rc<X11Session>, dock: WindowId) -> Self {
        Self {
            session,
            dock: dock.0,
        }
    }

    fn submit(&self, what: &str, request: impl FnOnce(&X11Session, Window) -> AnyResult<()>) {
        let result = request(&self.session, self.dock)
            .and_then(|()| self.session.conn.flush().context("flush failed"));
        if let Err(err) = result {
            tracing::warn!(dock = self.dock, "failed to {what}: {err:#}");
        }
    }
}

impl PlacementSink for X11Placement {
    fn request_raise(&mut self) {
        self.submit("raise dock", |session, dock| {
            session
                .conn
                .configure_window(dock, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
            Ok(())
        });
    }

    fn request_lower(&mut self) {
        self.submit("lower dock", |session, dock| {
            session.change_state(dock, NET_WM_STATE_REMOVE, session.atoms._NET_WM_STATE_ABOVE, 0)?;
            session
                .conn
                .configure_window(dock, &ConfigureWindowAux::new().stack_mode(StackMode::BELOW))?;
            Ok(())
        });
    }

    fn pin_above_normal(&mut self) {
        self.submit("keep dock above", |session, dock| {
            session.change_state(dock, NET_WM_STATE_REMOVE, session.atoms._NET_WM_STATE_BELOW, 0)?;
            session.change_state(dock, NET_WM_STATE_ADD, session.atoms._NET_WM_STATE_ABOVE, 0)
        });
    }

    fn pin_below_normal(&mut self) {
        self.submit("keep dock below", |session, dock| {
            session.change_state(dock, NET_WM_STATE_REMOVE, session.atoms._NET_WM_STATE_ABOVE, 0)?;
            session.change_state(dock, NET_WM_STATE_ADD, session.atoms._NET_WM_STATE_BELOW, 0)
        });
    }

    fn declare_always_on_top_type(&mut self) {
        self.submit("set dock window type", |session, dock| {
            session.conn.change_property32(
                PropMode::REPLACE,
                dock,
                session.atoms._NET_WM_WINDOW_TYPE,
                AtomEnum::ATOM,
                &[session.atoms._NET_WM_WINDOW_TYPE_DOCK],
            )?;
            Ok(())
        });
    }

    fn show_on_all_desktops(&mut self) {
        self.submit("show dock on all desktops", |session, dock| {
            session.send_root_message(
                dock,
                session.atoms._NET_WM_DESKTOP,
                [ALL_DESKTOPS, SOURCE_PAGER, 0, 0, 0],
            )
        });
    }

    fn move_dock(&mut self, position: Point<i32, Logical>) {
        self.submit("move dock", |session, dock| {
            session
                .conn
                .configure_window(dock, &ConfigureWindowAux::new().x(position.x).y(position.y))?;
            Ok(())
        });
    }
}

/// Turns X events into [`DockEvent`]s.
pub struct X11Events {
    session: Rc<X11Session>,
    dock: Window,
    clients: HashSet<Window>,
}

impl X11Events {
    pub fn new(session: Rc<X11Session>, dock: WindowId) -> Self {
        Self {
            session,
            dock: dock.0,
            clients: HashSet::new(),
        }
    }

    /// Selects input on the dock and known clients and reports the current
    /// screen, dock geometry, clients and focus.
    pub fn initial_events(&mut self) -> Result<Vec<DockEvent>, DockError> {
        let session = self.session.clone();
        session
            .conn
            .change_window_attributes(
                self.dock,
                &ChangeWindowAttributesAux::new().event_mask(
                    EventMask::PROPERTY_CHANGE
                        | EventMask::STRUCTURE_NOTIFY
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW,
                ),
            )
            .map_err(|err| DockError::Backend(format!("failed to watch dock window: {err}")))?;

        let mut events = vec![DockEvent::ScreenChanged(session.screen())];
        let geometry = session
            .geometry(self.dock)
            .map_err(|err| DockError::Backend(format!("failed to read dock geometry: {err:#}")))?;
        events.push(DockEvent::GeometryChanged(geometry));

        self.sync_clients(&mut events);
        match session.active() {
            Ok(active) => events.push(DockEvent::ActiveWindowChanged(active.map(WindowId))),
            Err(err) => tracing::warn!("failed to read active window: {err:#}"),
        }

        session
            .conn
            .flush()
            .map_err(|err| DockError::Backend(format!("failed to flush X connection: {err}")))?;
        Ok(events)
    }

    /// Drains every queued X event.
    pub fn dispatch(&mut self) -> Result<Vec<DockEvent>, DockError> {
        let mut events = Vec::new();
        while let Some(event) = self
            .session
            .conn
            .poll_for_event()
            .map_err(|err| DockError::Backend(format!("X connection failed: {err}")))?
        {
            self.translate(event, &mut events);
        }

        self.session
            .conn
            .flush()
            .map_err(|err| DockError::Backend(format!("failed to flush X connection: {err}")))?;
        Ok(events)
    }

    fn translate(&mut self, event: Event, out: &mut Vec<DockEvent>) {
        let session = self.session.clone();
        let atoms = &session.atoms;
        match event {
            Event::PropertyNotify(event) if event.window == session.root => {
                if event.atom == atoms._NET_ACTIVE_WINDOW {
                    match session.active() {
                        Ok(active) => out.push(DockEvent::ActiveWindowChanged(active.map(WindowId))),
                        Err(err) => tracing::warn!("failed to read active window: {err:#}"),
                    }
                } else if event.atom == atoms._NET_CLIENT_LIST_STACKING {
                    self.sync_clients(out);
                }
            }
            Event::PropertyNotify(event) if event.atom == atoms._NET_WM_STATE => {
                out.push(DockEvent::WindowChanged(WindowId(event.window)));
            }
            Event::ConfigureNotify(event) if event.window == session.root => {
                let screen = root_rect(event.width, event.height);
                if screen != session.screen.replace(screen) {
                    out.push(DockEvent::ScreenChanged(screen));
                }
            }
            Event::ConfigureNotify(event) if event.window == self.dock => {
                match session.geometry(self.dock) {
                    Ok(geometry) => out.push(DockEvent::GeometryChanged(geometry)),
                    Err(err) => tracing::warn!("failed to read dock geometry: {err:#}"),
                }
            }
            Event::DestroyNotify(event) => {
                if self.clients.remove(&event.window) {
                    out.push(DockEvent::WindowRemoved(WindowId(event.window)));
                }
            }
            Event::EnterNotify(event) if event.event == self.dock => {
                out.extend(crossing_event(event.detail, true));
            }
            Event::LeaveNotify(event) if event.event == self.dock => {
                out.extend(crossing_event(event.detail, false));
            }
            Event::Error(err) => tracing::debug!(?err, "X protocol error"),
            _ => {}
        }
    }

    fn sync_clients(&mut self, out: &mut Vec<DockEvent>) {
        let current: HashSet<Window> = match self.session.stacking() {
            Ok(windows) => windows.into_iter().collect(),
            Err(err) => {
                tracing::warn!("failed to read client stacking: {err:#}");
                return;
            }
        };

        for gone in self.clients.difference(&current) {
            out.push(DockEvent::WindowRemoved(WindowId(*gone)));
        }

        for window in current.difference(&self.clients) {
            if *window == self.dock {
                continue;
            }
            let watched = self.session.conn.change_window_attributes(
                *window,
                &ChangeWindowAttributesAux::new()
                    .event_mask(EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY),
            );
            if let Err(err) = watched {
                tracing::debug!(window, "failed to watch client: {err}");
            }
            out.push(DockEvent::WindowChanged(WindowId(*window)));
        }

        self.clients = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_moving_into_a_child_keeps_the_hover() {
        assert_eq!(crossing_event(NotifyDetail::INFERIOR, false), None);
        assert_eq!(crossing_event(NotifyDetail::INFERIOR, true), None);
        assert_eq!(
            crossing_event(NotifyDetail::ANCESTOR, false),
            Some(DockEvent::HoverLeave)
        );
        assert_eq!(
            crossing_event(NotifyDetail::NONLINEAR, true),
            Some(DockEvent::HoverEnter)
        );
    }

    #[test]
    fn root_size_becomes_the_screen() {
        assert_eq!(root_rect(2560, 1440), rect(0, 0, 2560, 1440));
    }
}
