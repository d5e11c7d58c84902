pub mod toplevel;
#[cfg(feature = "x11")]
pub mod x11;
