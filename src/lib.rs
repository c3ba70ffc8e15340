pub mod camera;
pub mod config;
pub mod overlay;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod smoother;
pub mod transport;
pub mod ui;
