// Domain-driven module structure for the Docker control panel.

// Core infrastructure
pub mod exec;
pub mod docker;

// Interaction layer
pub mod gate;
pub mod nav;
