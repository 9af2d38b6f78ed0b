pub mod capture;
pub mod controller;
pub mod display;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod layers;
pub mod magnifier;
pub mod messages;
pub mod platform;
pub mod sampler;
pub mod settings;
pub mod settings_store;
pub mod state;
pub mod transform;

pub use engine::{Overlay, TickOutcome};
pub use messages::{MainToOverlay, OverlayCommand, OverlayToMain};
pub use sampler::{spawn_overlay, FramePacer, OverlayRuntime};
pub use settings::OverlaySettings;
