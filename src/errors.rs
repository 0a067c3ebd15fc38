use thiserror::Error;

/// Failures the command layer needs to tell apart.
///
/// Everything else travels as a plain [`anyhow::Error`]; these variants are
/// wrapped into it and recovered with `downcast_ref` where the distinction
/// matters (exit codes, the registry "not found" case).
#[derive(Debug, Error)]
pub enum SkipperError {
    #[error("Invalid value for IMAGE: '{name}' is not a project image (known: {known})")]
    UnknownImage { name: String, known: String },

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid environment entry '{0}', expected KEY=VALUE")]
    InvalidEnv(String),

    #[error("Dockerfile not found: {0}")]
    MissingDockerfile(String),

    #[error("Command {command:?} exited with code {code}")]
    CommandFailed { command: Vec<String>, code: i32 },

    #[error("Registry error {code}: {message}")]
    Registry { code: String, message: String },

    #[error("Unexpected registry response: {0}")]
    RegistryResponse(String),

    #[error("Failed to delete manifest {digest} of {image}: HTTP {status}")]
    RemoteDelete {
        image: String,
        digest: String,
        status: u16,
    },

    #[error("Registry returned no Docker-Content-Digest for {image}:{reference}")]
    MissingDigest { image: String, reference: String },

    #[error("Couldn't find build container image {0} locally or in the registry")]
    BuildContainerNotFound(String),
}

impl SkipperError {
    /// Parameter problems detected before any external call was made.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            SkipperError::UnknownImage { .. }
                | SkipperError::MissingParameter(_)
                | SkipperError::InvalidEnv(_)
                | SkipperError::MissingDockerfile(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_usage() {
            2
        } else {
            1
        }
    }
}

/// Exit code for an arbitrary error coming out of a command handler.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<SkipperError>()
        .map(SkipperError::exit_code)
        .unwrap_or(1)
}
