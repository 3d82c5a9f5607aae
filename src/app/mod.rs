//! Application wiring: the builder options, the startup sequence and the
//! hot-reload task.

mod builder;
mod reload;
mod service;

pub use builder::{AppBuilder, DEFAULT_LOCATIONS, DEFAULT_RELOAD_DEBOUNCE};
pub use service::AppService;
