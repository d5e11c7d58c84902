use smithay::utils::{Logical, Point, Size};

use crate::{
    geometry::{Rect, TransientLayout},
    window::WindowId,
};

/// Effectful side of the window manager: stacking hints for the dock window.
pub trait PlacementSink {
    fn request_raise(&mut self);
    fn request_lower(&mut self);
    fn pin_above_normal(&mut self);
    fn pin_below_normal(&mut self);
    fn declare_always_on_top_type(&mut self);
    fn show_on_all_desktops(&mut self);
    fn move_dock(&mut self, position: Point<i32, Logical>);
}

/// The dock's content window. Its handle is excluded from occlusion checks.
pub trait TransientChild {
    fn handle(&self) -> WindowId;
    fn geometry(&self) -> Rect;
    fn maximum_size(&self) -> Size<i32, Logical>;
    fn apply_layout(&mut self, layout: TransientLayout);
}
