pub mod commands;
pub mod config;
pub mod errors;
pub mod git;
pub mod images;
pub mod notifier;
pub mod reconciler;
pub mod runner;
pub mod sources;

pub use commands::{Backends, CommandHandler};
pub use git::{LazyGitTags, TagResolver};
pub use images::ImageRef;
pub use notifier::Notifier;
pub use reconciler::ReconciledRow;
pub use runner::{CommandExecutor, ProcessRunner};
pub use sources::{DockerCli, HttpRegistry, LocalImageInspector, RegistryClient, TagEntry};
