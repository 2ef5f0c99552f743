pub mod logging;
pub mod target;
