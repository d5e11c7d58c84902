pub mod attention;
pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod errors;
pub mod evaluator;
pub mod geometry;
pub mod notify;
pub mod placement;
pub mod runtime;
pub mod visibility;
pub mod window;

pub use controller::{DockController, DockEvent};
pub use errors::{DockError, Result};
pub use notify::DockNotification;
pub use visibility::VisibilityMode;
pub use window::{WindowId, WindowInfo, WindowStackQuery, WindowStates};
