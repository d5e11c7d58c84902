use calloop::{
    EventLoop, Interest, LoopHandle, LoopSignal, Mode, PostAction,
    generic::Generic,
    signals::{Signal, Signals},
};
use nowdock::{
    DockController, DockError, DockEvent, Result, WindowId, WindowInfo, WindowStackQuery,
    backend::toplevel::{LayerPlacement, ToplevelRegistry},
    command::{self, Command},
    config::{self, DockConfig},
    geometry::{Rect, TransientLayout, rect},
    placement::{PlacementSink, TransientChild},
    runtime::DeadlineTimer,
    window::WindowType,
};
use smithay::utils::{Logical, Point, Size};
use std::{
    backtrace::Backtrace,
    fs,
    io::Read,
    os::fd::AsFd,
    path::PathBuf,
    time::Instant,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SIMULATED_DOCK: WindowId = WindowId(1);
const SIMULATED_CONTENT: WindowId = WindowId(2);

fn simulated_screen() -> Rect {
    rect(0, 0, 1920, 1080)
}

struct Driver<Q, P> {
    dock: DockController<Q, P>,
    timer: DeadlineTimer,
    signal: LoopSignal,
}

impl<Q: WindowStackQuery + 'static, P: PlacementSink + 'static> Driver<Q, P> {
    fn fire(driver: &mut Self) {
        driver.timer.fired();
    }

    fn tick(&mut self, handle: &LoopHandle<'static, Self>) {
        self.dock.dispatch_timers(Instant::now());
        if let Err(err) = self
            .timer
            .sync(handle, self.dock.next_deadline(), Self::fire)
        {
            tracing::error!("{err}");
            self.signal.stop();
        }
    }
}

type SimulatedDriver = Driver<ToplevelRegistry, LayerPlacement>;

/// Content window of the simulated dock. Layouts are applied verbatim.
struct SimulatedContent {
    geometry: Rect,
    maximum_size: Size<i32, Logical>,
}

impl TransientChild for SimulatedContent {
    fn handle(&self) -> WindowId {
        SIMULATED_CONTENT
    }

    fn geometry(&self) -> Rect {
        self.geometry
    }

    fn maximum_size(&self) -> Size<i32, Logical> {
        self.maximum_size
    }

    fn apply_layout(&mut self, layout: TransientLayout) {
        tracing::debug!(geometry = ?layout.geometry, "content window layout");
        self.geometry = layout.geometry;
    }
}

fn main() -> Result<()> {
    init_backtrace_defaults();
    init_logging()?;
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("panic: {panic_info}\n{backtrace}");
        eprintln!("panic: {panic_info}\n{backtrace}");
    }));

    let args: Vec<String> = std::env::args().collect();
    let config = match flag_value(&args, "--config") {
        Some(path) => config::load_from_path(&PathBuf::from(path))?,
        None => config::load_or_create_default()?.config,
    };
    tracing::info!(mode = %config.visibility, location = %config.location, "dock config loaded");

    match flag_value(&args, "--x11") {
        Some(window) => {
            let window = command::parse_window_id(window)
                .map_err(|err| DockError::Config(format!("{err:#}")))?;
            run_x11(&config, window)
        }
        None => run_simulated(&config),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn print_notifications<Q: WindowStackQuery, P: PlacementSink>(dock: &mut DockController<Q, P>) {
    dock.subscribe(|notification| println!("notify {notification:?}"));
}

fn insert_signal_source<D: 'static>(
    handle: &LoopHandle<'static, D>,
    signal: LoopSignal,
) -> Result<()> {
    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .map_err(|err| DockError::EventLoop(format!("failed to watch signals: {err}")))?;
    handle
        .insert_source(signals, move |event, _, _| {
            tracing::info!(signal = ?event.signal(), "shutting down");
            signal.stop();
        })
        .map_err(|err| DockError::EventLoop(format!("failed to insert signal source: {err}")))?;
    Ok(())
}

fn run_simulated(config: &DockConfig) -> Result<()> {
    let mut event_loop: EventLoop<SimulatedDriver> =
        EventLoop::try_new().map_err(|e| DockError::EventLoop(e.to_string()))?;
    let handle = event_loop.handle();

    let screen = simulated_screen();
    let dock_geometry = rect(0, 0, screen.size.w, 64);

    let mut registry = ToplevelRegistry::new();
    registry.map(
        SIMULATED_DOCK,
        WindowInfo::new(dock_geometry).with_type(WindowType::Dock),
    );

    let content = SimulatedContent {
        geometry: rect(0, 0, screen.size.w / 2, 64),
        maximum_size: Size::from((screen.size.w, 64)),
    };

    let mut dock = DockController::new(SIMULATED_DOCK, config, registry, LayerPlacement::new())
        .with_transient(content);
    print_notifications(&mut dock);
    dock.handle_event(DockEvent::ScreenChanged(screen));
    dock.handle_event(DockEvent::GeometryChanged(dock_geometry));
    dock.initialize();
    settle(&mut dock);

    let mut driver = Driver {
        dock,
        timer: DeadlineTimer::new(),
        signal: event_loop.get_signal(),
    };

    insert_signal_source(&handle, event_loop.get_signal())?;
    insert_stdin_source(&handle)?;
    driver.tick(&handle);

    tracing::info!("simulated desktop ready; reading commands from stdin");

    event_loop
        .run(None, &mut driver, |driver| {
            driver.tick(&handle);
            settle(&mut driver.dock);
            // settling may have armed a timer
            driver.tick(&handle);
        })
        .map_err(|e| DockError::EventLoop(e.to_string()))?;

    Ok(())
}

/// Applies queued placement requests to the simulated window stack until the
/// controller stops producing new ones.
fn settle(dock: &mut DockController<ToplevelRegistry, LayerPlacement>) {
    loop {
        let requests = dock.sink_mut().take_requests();
        if requests.is_empty() {
            break;
        }

        let dock_window = dock.dock();
        for request in requests {
            tracing::trace!(?request, "applying placement request");
            let events = dock.query_mut().apply_request(dock_window, request);
            for event in events {
                dock.handle_event(event);
            }
        }
    }
}

fn insert_stdin_source(handle: &LoopHandle<'static, SimulatedDriver>) -> Result<()> {
    let stdin = std::io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map(fs::File::from)
        .map_err(|err| DockError::Backend(format!("failed to open stdin: {err}")))?;

    let mut pending = String::new();
    handle
        .insert_source(
            Generic::new(stdin, Interest::READ, Mode::Level),
            move |_, stdin, driver| {
                let mut buf = [0u8; 4096];
                let mut reader: &fs::File = stdin;
                let read = match reader.read(&mut buf) {
                    Ok(read) => read,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {
                        return Ok(PostAction::Continue);
                    }
                    Err(err) => {
                        tracing::warn!("failed to read stdin: {err}");
                        0
                    }
                };

                if read == 0 {
                    tracing::info!("stdin closed");
                    driver.signal.stop();
                    return Ok(PostAction::Remove);
                }

                pending.push_str(&String::from_utf8_lossy(&buf[..read]));
                while let Some(end) = pending.find('\n') {
                    let line: String = pending.drain(..=end).collect();
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(command) => run_command(driver, command),
                        Err(err) => tracing::warn!(line, "bad command: {err:#}"),
                    }
                }
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| DockError::EventLoop(format!("failed to init stdin source: {err}")))?;

    Ok(())
}

fn run_command(driver: &mut SimulatedDriver, command: Command) {
    let dock = &mut driver.dock;
    let events: Vec<DockEvent> = match command {
        Command::Map {
            window,
            geometry,
            states,
            window_type,
        } => vec![dock.query_mut().map(
            window,
            WindowInfo::new(geometry)
                .with_states(states)
                .with_type(window_type),
        )],
        Command::Unmap(window) => dock.query_mut().unmap(window).unwrap_or_default(),
        Command::Activate(window) => dock.query_mut().activate(window).into_iter().collect(),
        Command::States(window, states) => {
            dock.query_mut().set_states(window, states).into_iter().collect()
        }
        Command::Toplevel(window, states) => dock.query_mut().apply_protocol_states(window, &states),
        Command::Move(window, x, y) => {
            let mut events: Vec<DockEvent> = dock
                .query_mut()
                .move_window(window, Point::from((x, y)))
                .into_iter()
                .collect();
            if window == dock.dock()
                && let Some(info) = dock.query().window_info(window)
            {
                events.push(DockEvent::GeometryChanged(info.geometry));
            }
            events
        }
        Command::Raise(window) => {
            dock.query_mut().raise(window);
            Vec::new()
        }
        Command::Lower(window) => {
            dock.query_mut().lower(window);
            Vec::new()
        }
        Command::HoverEnter => vec![DockEvent::HoverEnter],
        Command::HoverLeave => vec![DockEvent::HoverLeave],
        Command::MenuOpen => vec![DockEvent::ContextMenuOpened],
        Command::MenuClose => vec![DockEvent::ContextMenuClosed],
        Command::Screen(screen) => vec![DockEvent::ScreenChanged(screen)],
        Command::Mask(mask) => vec![DockEvent::MaskChanged(mask)],
        Command::Mode(mode) => {
            dock.set_visibility_mode(mode);
            Vec::new()
        }
        Command::Location(location) => {
            dock.set_location(location);
            Vec::new()
        }
        Command::AutoHidden(auto_hidden) => {
            dock.set_is_auto_hidden(auto_hidden);
            Vec::new()
        }
        Command::Evaluate => {
            dock.evaluate();
            Vec::new()
        }
        Command::Status => {
            print_status(dock);
            Vec::new()
        }
        Command::Quit => {
            driver.signal.stop();
            return;
        }
    };

    for event in events {
        driver.dock.handle_event(event);
    }
    settle(&mut driver.dock);
}

fn print_status(dock: &DockController<ToplevelRegistry, LayerPlacement>) {
    let stacking: Vec<String> = dock
        .query()
        .stacking_order()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!(
        "status mode={} location={} geometry={:?} layer={:?} hovered={} attention={:?} pending={} stack=[{}]",
        dock.visibility_mode(),
        dock.location(),
        dock.geometry(),
        dock.sink().layer(),
        dock.is_hovered(),
        dock.attention_window(),
        dock.is_update_pending(),
        stacking.join(" "),
    );
}

#[cfg(feature = "x11")]
fn run_x11(config: &DockConfig, window: WindowId) -> Result<()> {
    use std::{cell::RefCell, rc::Rc};

    use nowdock::backend::x11::{X11Events, X11Placement, X11Session, X11Stack};

    type X11Driver = Driver<X11Stack, X11Placement>;

    let session = X11Session::connect()?;
    let mut event_loop: EventLoop<X11Driver> =
        EventLoop::try_new().map_err(|e| DockError::EventLoop(e.to_string()))?;
    let handle = event_loop.handle();

    let events = Rc::new(RefCell::new(X11Events::new(session.clone(), window)));
    let initial = events.borrow_mut().initial_events()?;

    let mut dock = DockController::new(
        window,
        config,
        X11Stack::new(session.clone()),
        X11Placement::new(session.clone(), window),
    );
    print_notifications(&mut dock);
    for event in initial {
        dock.handle_event(event);
    }
    dock.initialize();

    let mut driver = Driver {
        dock,
        timer: DeadlineTimer::new(),
        signal: event_loop.get_signal(),
    };

    insert_signal_source(&handle, event_loop.get_signal())?;

    let source_events = events.clone();
    handle
        .insert_source(
            Generic::new(session.event_fd()?, Interest::READ, Mode::Level),
            move |_, _, driver: &mut X11Driver| {
                drain_x11(&source_events, driver);
                Ok(PostAction::Continue)
            },
        )
        .map_err(|err| DockError::EventLoop(format!("failed to init X11 source: {err}")))?;

    driver.tick(&handle);
    tracing::info!(dock = %window, "watching X11 dock window");

    event_loop
        .run(None, &mut driver, |driver| {
            // replies read while evaluating can leave events queued in the connection
            drain_x11(&events, driver);
            driver.tick(&handle);
        })
        .map_err(|e| DockError::EventLoop(e.to_string()))?;

    Ok(())
}

#[cfg(feature = "x11")]
fn drain_x11(
    events: &std::cell::RefCell<nowdock::backend::x11::X11Events>,
    driver: &mut Driver<nowdock::backend::x11::X11Stack, nowdock::backend::x11::X11Placement>,
) {
    let batch = events.borrow_mut().dispatch();
    match batch {
        Ok(batch) => {
            for event in batch {
                driver.dock.handle_event(event);
            }
        }
        Err(err) => {
            tracing::error!("{err}");
            driver.signal.stop();
        }
    }
}

#[cfg(not(feature = "x11"))]
fn run_x11(_config: &DockConfig, _window: WindowId) -> Result<()> {
    Err(DockError::Backend(
        "nowdock was built without the x11 feature".to_owned(),
    ))
}

fn init_backtrace_defaults() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "0") };
    }
}

const DEFAULT_LOG_FILTER: &str = "nowdock=debug";

fn init_logging() -> Result<()> {
    let log_dir: PathBuf = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("log");
    fs::create_dir_all(&log_dir).map_err(|err| {
        DockError::Backend(format!(
            "failed to create log directory {}: {err}",
            log_dir.display()
        ))
    })?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "nowdock.log");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .init();

    let log_file = log_dir.join("nowdock.log");
    tracing::info!(path = %log_file.display(), "logging initialized");

    Ok(())
}
