// Presentation layer - HTTP surface and plot geometry
pub mod app_state;
pub mod handlers;
pub mod renderer;
