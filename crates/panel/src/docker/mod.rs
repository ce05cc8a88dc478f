//! Docker facade: container operations behind one backend trait.
//!
//! `socket` talks to the daemon through bollard, `shell` drives the Docker
//! CLI through any [`CommandExecutor`](crate::exec::CommandExecutor), and
//! `fake` is an in-memory double for tests.

pub mod backend;
pub mod error;
pub mod fake;
pub mod model;
pub mod parse;
pub mod shell;
pub mod socket;

pub use backend::RuntimeBackend;
pub use error::{DockerError, ParseError};
pub use model::{ContainerDetail, ContainerStatus, ContainerSummary, ContainerUsage, ImageSummary, ServerStats};
