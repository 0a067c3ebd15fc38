//! Joins what the local daemon holds with what the registry holds.
//!
//! [`ImageReconciler::list_images`] produces the rows of the `images` table:
//! local rows first, then registry rows, each group in image discovery order.
//! A `name:tag` present in both places shows up twice, once per origin.

use anyhow::{Context, Result};
use tabled::Tabled;

use crate::errors::SkipperError;
use crate::images::ImageRef;
use crate::notifier::Notifier;
use crate::sources::{LocalImageInspector, RegistryClient};

/// Registry column value for images that only exist in the local cache.
pub const LOCAL_ORIGIN: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ReconciledRow {
    #[tabled(rename = "REGISTRY")]
    pub registry: String,
    #[tabled(rename = "IMAGE")]
    pub name: String,
    #[tabled(rename = "TAG")]
    pub tag: String,
}

impl ReconciledRow {
    pub fn new(registry: &str, name: &str, tag: &str) -> Self {
        Self {
            registry: registry.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        }
    }
}

pub struct ImageReconciler<'a, L: ?Sized, R: ?Sized> {
    local: &'a L,
    remote: &'a R,
    registry: Option<&'a str>,
    notifier: &'a Notifier,
}

impl<'a, L, R> ImageReconciler<'a, L, R>
where
    L: LocalImageInspector + ?Sized,
    R: RegistryClient + ?Sized,
{
    pub fn new(
        local: &'a L,
        remote: &'a R,
        registry: Option<&'a str>,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            local,
            remote,
            registry,
            notifier,
        }
    }

    fn require_registry(&self) -> Result<&'a str, SkipperError> {
        self.registry
            .ok_or(SkipperError::MissingParameter("--registry"))
    }

    /// Lists every known `name:tag` of `images`.
    ///
    /// The registry is only contacted when `include_remote` is set. A registry
    /// that does not know an image contributes no rows for it; any other
    /// registry fault fails the whole listing.
    pub fn list_images(&self, images: &[String], include_remote: bool) -> Result<Vec<ReconciledRow>> {
        let registry = if include_remote {
            Some(self.require_registry()?)
        } else {
            None
        };

        self.notifier.info("Looking up local images...");
        let mut rows: Vec<ReconciledRow> = self
            .local
            .list_local(images)?
            .into_iter()
            .map(|entry| ReconciledRow::new(LOCAL_ORIGIN, &entry.name, &entry.tag))
            .collect();

        if let Some(registry) = registry {
            for image in images {
                self.notifier
                    .info(&format!("Looking up tags of {} in {}...", image, registry));
                let tags = self
                    .remote
                    .list_tags(registry, image)
                    .context(format!("Failed to list tags of {} in {}", image, registry))?;
                rows.extend(
                    tags.iter()
                        .map(|tag| ReconciledRow::new(registry, image, tag)),
                );
            }
        }

        Ok(rows)
    }

    /// Deletes `image:tag` from the local cache, or from the registry when
    /// `remote` is set. Remote deletion goes through the manifest digest.
    pub fn remove_image(&self, image: &str, tag: &str, remote: bool) -> Result<()> {
        if !remote {
            self.notifier.clear();
            return self.local.remove(&ImageRef::new(image, tag));
        }

        let registry = self.require_registry()?;
        self.notifier
            .info(&format!("Resolving {}:{} in {}...", image, tag, registry));
        let digest = self.remote.resolve_digest(registry, image, tag)?;

        self.notifier
            .info(&format!("Deleting {}@{} from {}...", image, digest, registry));
        self.remote.delete_manifest(registry, image, &digest)
    }

    /// Picks where to run a tagged build container from: the local cache if
    /// it has the tag, otherwise the registry if it lists it.
    pub fn locate(&self, image: &ImageRef) -> Result<ImageRef> {
        self.notifier
            .info(&format!("Looking for build container {}...", image.local()));
        if self.local.has_tag(&image.name, &image.tag)? {
            return Ok(image.local());
        }

        if let Some(registry) = image.registry.as_deref() {
            let tags = self.remote.list_tags(registry, &image.name)?;
            if tags.iter().any(|tag| *tag == image.tag) {
                return Ok(image.clone());
            }
        }

        Err(SkipperError::BuildContainerNotFound(image.local().fqdn()).into())
    }
}
