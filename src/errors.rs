use std::fmt;

#[derive(Debug)]
pub enum DockError {
    Config(String),
    EventLoop(String),
    Backend(String),
}

impl fmt::Display for DockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockError::Config(msg) => write!(f, "config error: {msg}"),
            DockError::EventLoop(msg) => write!(f, "event loop error: {msg}"),
            DockError::Backend(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for DockError {}

pub type Result<T, E = DockError> = std::result::Result<T, E>;
