//! Screen-relative bookkeeping for the dock window: its own rectangle, the
//! optional input mask, the edge it is docked to and the layouts handed to
//! the transient child.

use std::{fmt, str::FromStr};

use smithay::utils::{Logical, Point, Rectangle, Size};

use crate::DockError;

pub type Rect = Rectangle<i32, Logical>;

pub fn rect(x: i32, y: i32, w: i32, h: i32) -> Rect {
    Rectangle::new(Point::from((x, y)), Size::from((w, h)))
}

pub fn is_empty(area: Rect) -> bool {
    area.size.w <= 0 || area.size.h <= 0
}

/// Strict overlap: rectangles that only share an edge do not intersect.
pub fn intersects(a: Rect, b: Rect) -> bool {
    if is_empty(a) || is_empty(b) {
        return false;
    }

    a.loc.x < b.loc.x + b.size.w
        && b.loc.x < a.loc.x + a.size.w
        && a.loc.y < b.loc.y + b.size.h
        && b.loc.y < a.loc.y + a.size.h
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Location {
    pub fn orientation(self) -> Orientation {
        match self {
            Location::Left | Location::Right => Orientation::Vertical,
            Location::Top | Location::Bottom => Orientation::Horizontal,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Location::Top => "top",
            Location::Bottom => "bottom",
            Location::Left => "left",
            Location::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Location {
    type Err = DockError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" | "topedge" => Ok(Location::Top),
            "bottom" | "bottomedge" => Ok(Location::Bottom),
            "left" | "leftedge" => Ok(Location::Left),
            "right" | "rightedge" => Ok(Location::Right),
            _ => Err(DockError::Config(format!(
                "invalid location `{raw}` (expected top, bottom, left or right)"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DockGeometry {
    location: Location,
    screen: Rect,
    window: Rect,
    mask: Option<Rect>,
}

impl DockGeometry {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            screen: rect(0, 0, 0, 0),
            window: rect(0, 0, 0, 0),
            mask: None,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn orientation(&self) -> Orientation {
        self.location.orientation()
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    /// Mask in window-local coordinates, as it was handed to us.
    pub fn mask(&self) -> Option<Rect> {
        self.mask
    }

    /// The screen-relative rectangle used for occlusion tests. An unset or
    /// empty mask falls back to the whole window.
    pub fn effective_mask(&self) -> Rect {
        match self.mask {
            Some(mask) if !is_empty(mask) => Rectangle::new(
                Point::from((self.window.loc.x + mask.loc.x, self.window.loc.y + mask.loc.y)),
                mask.size,
            ),
            _ => self.window,
        }
    }

    pub fn set_location(&mut self, location: Location) -> bool {
        if self.location == location {
            return false;
        }
        self.location = location;
        true
    }

    pub fn set_screen(&mut self, screen: Rect) -> bool {
        if self.screen == screen {
            return false;
        }
        self.screen = screen;
        true
    }

    pub fn set_window(&mut self, window: Rect) -> bool {
        if self.window == window {
            return false;
        }
        self.window = window;
        true
    }

    pub fn set_mask(&mut self, mask: Option<Rect>) -> bool {
        if self.mask == mask {
            return false;
        }
        self.mask = mask;
        true
    }

    /// Length of the screen edge the dock sits on.
    pub fn screen_length(&self) -> i32 {
        match self.orientation() {
            Orientation::Horizontal => self.screen.size.w,
            Orientation::Vertical => self.screen.size.h,
        }
    }

    /// Top-left corner the dock window must be moved to so that it hugs its edge.
    pub fn docked_position(&self) -> Point<i32, Logical> {
        let screen = self.screen;
        let size = self.window.size;
        let (x, y) = match self.location {
            Location::Bottom => (screen.loc.x, screen.loc.y + screen.size.h - size.h),
            Location::Top | Location::Left => (screen.loc.x, screen.loc.y),
            Location::Right => (screen.loc.x + screen.size.w - size.w, screen.loc.y),
        };
        Point::from((x, y))
    }

    /// Collapsed layout for the transient child: a thin strip along the edge,
    /// centred on the dock window.
    pub fn shrunk_transient(
        &self,
        child: Rect,
        thickness: i32,
        children_length: i32,
    ) -> TransientLayout {
        let screen = self.screen;
        let length = (self.screen_length() / 2).max(children_length);
        let center_x = self.window.loc.x + self.window.size.w / 2;
        let center_y = self.window.loc.y + self.window.size.h / 2;

        let geometry = match self.location {
            Location::Bottom => rect(
                center_x - child.size.w / 2,
                screen.loc.y + screen.size.h - thickness,
                length,
                thickness,
            ),
            Location::Top => rect(center_x - child.size.w / 2, screen.loc.y, length, thickness),
            Location::Left => rect(screen.loc.x, center_y - child.size.h / 2, thickness, length),
            Location::Right => rect(
                screen.loc.x + screen.size.w - thickness,
                center_y - child.size.h / 2,
                thickness,
                length,
            ),
        };

        TransientLayout {
            geometry,
            min_thickness: 0,
            max_thickness: None,
            min_length: Some(length),
        }
    }

    /// Layout pinning the transient child's thickness along the dock edge.
    pub fn thick_transient(&self, child: Rect, thickness: i32) -> TransientLayout {
        let screen = self.screen;
        let geometry = match self.location {
            Location::Bottom => rect(
                child.loc.x,
                screen.loc.y + screen.size.h - thickness,
                child.size.w,
                thickness,
            ),
            Location::Top => rect(child.loc.x, screen.loc.y, child.size.w, thickness),
            Location::Left => rect(screen.loc.x, child.loc.y, thickness, child.size.h),
            Location::Right => rect(
                screen.loc.x + screen.size.w - thickness,
                child.loc.y,
                thickness,
                child.size.h,
            ),
        };

        TransientLayout {
            geometry,
            min_thickness: thickness,
            max_thickness: Some(thickness),
            min_length: None,
        }
    }
}

/// Size constraints are expressed relative to the dock edge: thickness is
/// the extent perpendicular to it, length the extent along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransientLayout {
    pub geometry: Rect,
    pub min_thickness: i32,
    /// `None` leaves the current maximum untouched.
    pub max_thickness: Option<i32>,
    pub min_length: Option<i32>,
}
