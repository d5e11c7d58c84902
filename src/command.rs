//! Line protocol understood by the `nowdock` driver on stdin.
//!
//! ```text
//! map 0x2a 0 900 800 180 maximized attention
//! activate 0x2a
//! toplevel 0x2a maximized activated
//! hover enter
//! mode let-windows-cover
//! ```

use std::str::FromStr;

use anyhow::{Context, anyhow, bail};
use smithay::reexports::wayland_protocols_wlr::foreign_toplevel::v1::server::zwlr_foreign_toplevel_handle_v1::State;

use crate::{
    geometry::{Location, Rect, rect},
    visibility::VisibilityMode,
    window::{WindowId, WindowStates, WindowType},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Map {
        window: WindowId,
        geometry: Rect,
        states: WindowStates,
        window_type: WindowType,
    },
    Unmap(WindowId),
    Activate(Option<WindowId>),
    States(WindowId, WindowStates),
    /// Foreign-toplevel `state` array as the compositor would send it.
    Toplevel(WindowId, Vec<u32>),
    Move(WindowId, i32, i32),
    Raise(WindowId),
    Lower(WindowId),
    HoverEnter,
    HoverLeave,
    MenuOpen,
    MenuClose,
    Screen(Rect),
    Mask(Option<Rect>),
    Mode(VisibilityMode),
    Location(Location),
    AutoHidden(bool),
    Evaluate,
    Status,
    Quit,
}

pub fn parse_window_id(raw: &str) -> anyhow::Result<WindowId> {
    let id = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    }
    .with_context(|| format!("invalid window id {raw:?}"))?;
    Ok(WindowId(id))
}

fn parse_int(raw: Option<&str>, what: &str) -> anyhow::Result<i32> {
    let raw = raw.ok_or_else(|| anyhow!("missing {what}"))?;
    raw.parse::<i32>()
        .with_context(|| format!("invalid {what} {raw:?}"))
}

fn parse_rect<'a>(args: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<Rect> {
    let x = parse_int(args.next(), "x")?;
    let y = parse_int(args.next(), "y")?;
    let w = parse_int(args.next(), "width")?;
    let h = parse_int(args.next(), "height")?;
    Ok(rect(x, y, w, h))
}

fn parse_window<'a>(args: &mut impl Iterator<Item = &'a str>) -> anyhow::Result<WindowId> {
    parse_window_id(args.next().ok_or_else(|| anyhow!("missing window id"))?)
}

/// Window state and type keywords.
fn parse_flags<'a>(
    args: impl Iterator<Item = &'a str>,
) -> anyhow::Result<(WindowStates, WindowType)> {
    let mut states = WindowStates::empty();
    let mut window_type = WindowType::Normal;
    for flag in args {
        match flag {
            "above" => states |= WindowStates::KEEP_ABOVE,
            "below" => states |= WindowStates::KEEP_BELOW,
            "maximized" => states |= WindowStates::MAXIMIZED,
            "minimized" => states |= WindowStates::MINIMIZED,
            "attention" => states |= WindowStates::DEMANDS_ATTENTION,
            "desktop" => window_type = WindowType::Desktop,
            "dock" => window_type = WindowType::Dock,
            "dialog" => window_type = WindowType::Dialog,
            other => bail!("unknown window flag {other:?}"),
        }
    }
    Ok((states, window_type))
}

fn parse_protocol_states<'a>(args: impl Iterator<Item = &'a str>) -> anyhow::Result<Vec<u32>> {
    args.map(|state| {
        let state = match state {
            "maximized" => State::Maximized,
            "minimized" => State::Minimized,
            "activated" => State::Activated,
            "fullscreen" => State::Fullscreen,
            other => bail!("unknown toplevel state {other:?}"),
        };
        Ok(state as u32)
    })
    .collect()
}

fn expect_end<'a>(mut args: impl Iterator<Item = &'a str>) -> anyhow::Result<()> {
    match args.next() {
        Some(extra) => bail!("unexpected argument {extra:?}"),
        None => Ok(()),
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut args = line.split_whitespace();
        let verb = args.next().ok_or_else(|| anyhow!("empty command"))?;

        let command = match verb {
            "map" => {
                let window = parse_window(&mut args)?;
                let geometry = parse_rect(&mut args)?;
                let (states, window_type) = parse_flags(args.by_ref())?;
                Command::Map {
                    window,
                    geometry,
                    states,
                    window_type,
                }
            }
            "unmap" => Command::Unmap(parse_window(&mut args)?),
            "activate" => match args.next() {
                Some("none") => Command::Activate(None),
                Some(raw) => Command::Activate(Some(parse_window_id(raw)?)),
                None => bail!("missing window id"),
            },
            "state" => {
                let window = parse_window(&mut args)?;
                let (states, _) = parse_flags(args.by_ref())?;
                Command::States(window, states)
            }
            "toplevel" => {
                let window = parse_window(&mut args)?;
                Command::Toplevel(window, parse_protocol_states(args.by_ref())?)
            }
            "move" => {
                let window = parse_window(&mut args)?;
                let x = parse_int(args.next(), "x")?;
                let y = parse_int(args.next(), "y")?;
                Command::Move(window, x, y)
            }
            "raise" => Command::Raise(parse_window(&mut args)?),
            "lower" => Command::Lower(parse_window(&mut args)?),
            "hover" => match args.next() {
                Some("enter") => Command::HoverEnter,
                Some("leave") => Command::HoverLeave,
                other => bail!("expected enter or leave, got {other:?}"),
            },
            "menu" => match args.next() {
                Some("open") => Command::MenuOpen,
                Some("close") => Command::MenuClose,
                other => bail!("expected open or close, got {other:?}"),
            },
            "screen" => Command::Screen(parse_rect(&mut args)?),
            "mask" => match args.clone().next() {
                Some("none") => {
                    args.next();
                    Command::Mask(None)
                }
                _ => Command::Mask(Some(parse_rect(&mut args)?)),
            },
            "mode" => {
                let raw = args.next().ok_or_else(|| anyhow!("missing mode"))?;
                Command::Mode(raw.parse()?)
            }
            "location" => {
                let raw = args.next().ok_or_else(|| anyhow!("missing location"))?;
                Command::Location(raw.parse()?)
            }
            "autohidden" => match args.next() {
                Some("on" | "true" | "1") => Command::AutoHidden(true),
                Some("off" | "false" | "0") => Command::AutoHidden(false),
                other => bail!("expected on or off, got {other:?}"),
            },
            "evaluate" => Command::Evaluate,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command {other:?}"),
        };

        expect_end(args)?;
        Ok(command)
    }
}
