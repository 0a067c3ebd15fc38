use anyhow::{Context, Result};
use git2::Repository;
use std::path::{Path, PathBuf};

use crate::config::EffectiveConfig;
use crate::images::ImageRef;

/// Length of the abbreviated commit hash used as image tag.
pub const SHORT_HASH_LEN: usize = 7;

/// Provides the tag given to freshly built project images.
pub trait TagResolver {
    fn current_tag(&self) -> Result<String>;
}

pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Opens the repository containing `path`, searching parent directories.
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).context(format!(
            "Failed to find a git repository at {}",
            path.display()
        ))?;
        Ok(Self { repo })
    }

    pub fn head_hash(&self) -> Result<String> {
        let commit = self
            .repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("Failed to get head commit")?;
        Ok(commit.id().to_string())
    }

    pub fn short_hash(&self) -> Result<String> {
        let mut hash = self.head_hash()?;
        hash.truncate(SHORT_HASH_LEN);
        Ok(hash)
    }
}

impl TagResolver for GitRepo {
    fn current_tag(&self) -> Result<String> {
        self.short_hash()
    }
}

/// Discovers the repository containing `path` each time a tag is requested.
pub struct LazyGitTags {
    path: PathBuf,
}

impl LazyGitTags {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl TagResolver for LazyGitTags {
    fn current_tag(&self) -> Result<String> {
        GitRepo::discover(&self.path)?.current_tag()
    }
}

/// The configured build container, or `None` when no tag is configured.
///
/// Callers treat `None` as "build the container locally and use the bare
/// image name".
pub fn resolve_build_container_ref(
    image: &str,
    config: &EffectiveConfig,
) -> Option<ImageRef> {
    config
        .build_container_tag
        .as_ref()
        .map(|tag| ImageRef::new(image, tag.clone()).with_registry(config.registry.clone()))
}
