//! Where image tags come from: the local Docker daemon and a remote registry.

pub mod docker;
pub mod registry;
pub mod source;

pub use docker::{DockerCli, LocalImageInspector};
pub use registry::{HttpRegistry, RegistryClient};
pub use source::TagEntry;
