// Domain layer - core types and pure logic
pub mod selection;
pub mod signal;
pub mod view;
