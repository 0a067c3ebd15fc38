//! Project images and how they are referenced.
//!
//! A project image is declared by a `Dockerfile.<name>` file in the project
//! root. [`discover`] lists those names; [`ImageRef`] joins a name with a tag
//! and an optional registry host.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::SkipperError;

pub const DOCKERFILE_PREFIX: &str = "Dockerfile.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
    pub registry: Option<String>,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Option<String>) -> Self {
        self.registry = registry;
        self
    }

    /// `registry/name:tag`, or `name:tag` without a registry.
    pub fn fqdn(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}:{}", registry, self.name, self.tag),
            None => format!("{}:{}", self.name, self.tag),
        }
    }

    /// The same image without its registry host.
    pub fn local(&self) -> Self {
        Self {
            registry: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqdn())
    }
}

pub fn dockerfile_name(image: &str) -> String {
    format!("{}{}", DOCKERFILE_PREFIX, image)
}

pub fn dockerfile_path(project_root: &Path, image: &str) -> PathBuf {
    project_root.join(dockerfile_name(image))
}

/// Names of all images with a `Dockerfile.<name>` directly in `project_root`, sorted.
pub fn discover(project_root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(project_root)
        .context(format!("Failed to read project directory {}", project_root.display()))?;

    let mut images = BTreeSet::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(image) = file_name
            .to_str()
            .and_then(|name| name.strip_prefix(DOCKERFILE_PREFIX))
        {
            if !image.is_empty() {
                images.insert(image.to_string());
            }
        }
    }

    log::debug!("Discovered {} project images: {:?}", images.len(), images);
    Ok(images.into_iter().collect())
}

/// Rejects `name` unless it is one of the discovered `images`.
pub fn validate(name: &str, images: &[String]) -> Result<(), SkipperError> {
    if images.iter().any(|image| image == name) {
        Ok(())
    } else {
        Err(SkipperError::UnknownImage {
            name: name.to_string(),
            known: images.join(", "),
        })
    }
}
