pub mod console;
pub mod logging;
pub mod overlay;
