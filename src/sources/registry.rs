use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::errors::SkipperError;

pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";
/// Error code a registry answers with for a repository it has never seen.
pub const NAME_UNKNOWN: &str = "NAME_UNKNOWN";

/// The subset of the Docker Registry v2 API needed to list and delete tags.
pub trait RegistryClient {
    /// Tags of `image`, in registry order. Unknown repositories have no tags.
    fn list_tags(&self, registry: &str, image: &str) -> Result<Vec<String>>;

    /// Digest of the manifest `reference` (usually a tag) points at.
    fn resolve_digest(&self, registry: &str, image: &str, reference: &str) -> Result<String>;

    /// Deletes a manifest. Registries only accept digests here, never tags.
    fn delete_manifest(&self, registry: &str, image: &str, digest: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
pub struct RegistryErrorEntry {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    Errors {
        errors: Vec<RegistryErrorEntry>,
    },
    Tags {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        tags: Option<Vec<String>>,
    },
}

/// Interprets a `GET /v2/<image>/tags/list` answer.
///
/// `NAME_UNKNOWN` means the repository was never pushed and yields no tags.
/// Any other error, or a body that is neither shape, is a registry fault.
pub fn interpret_tag_list(image: &str, status: u16, body: &str) -> Result<Vec<String>> {
    let reply: TagList = serde_json::from_str(body).map_err(|e| {
        SkipperError::RegistryResponse(format!(
            "tag list of {} (HTTP {}): {}",
            image, status, e
        ))
    })?;

    match reply {
        TagList::Errors { errors } => {
            if errors.iter().any(|error| error.code == NAME_UNKNOWN) {
                debug!("Registry does not know {}", image);
                return Ok(Vec::new());
            }
            let error = errors.into_iter().next().ok_or_else(|| {
                SkipperError::RegistryResponse(format!(
                    "empty error list for {} (HTTP {})",
                    image, status
                ))
            })?;
            Err(SkipperError::Registry {
                code: error.code,
                message: error.message,
            }
            .into())
        }
        TagList::Tags { .. } if !(200..300).contains(&status) => Err(SkipperError::RegistryResponse(
            format!("tag list of {} failed with HTTP {}", image, status),
        )
        .into()),
        TagList::Tags { tags, .. } => Ok(tags.unwrap_or_default()),
    }
}

/// Registry v2 client. Hosts are reached over HTTPS without certificate
/// verification.
pub struct HttpRegistry {
    client: Client,
    scheme: &'static str,
}

impl HttpRegistry {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("skipper/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create registry HTTP client")?;
        Ok(Self {
            client,
            scheme: "https",
        })
    }

    fn tags_url(&self, registry: &str, image: &str) -> String {
        format!("{}://{}/v2/{}/tags/list", self.scheme, registry, image)
    }

    fn manifest_url(&self, registry: &str, image: &str, reference: &str) -> String {
        format!(
            "{}://{}/v2/{}/manifests/{}",
            self.scheme, registry, image, reference
        )
    }
}

impl RegistryClient for HttpRegistry {
    fn list_tags(&self, registry: &str, image: &str) -> Result<Vec<String>> {
        let url = self.tags_url(registry, image);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .context(format!("Failed to query {}", url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .context(format!("Failed to read response from {}", url))?;
        interpret_tag_list(image, status, &body)
    }

    fn resolve_digest(&self, registry: &str, image: &str, reference: &str) -> Result<String> {
        let url = self.manifest_url(registry, image, reference);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE)
            .send()
            .context(format!("Failed to query {}", url))?;

        let digest = response
            .headers()
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match digest {
            Some(digest) => {
                debug!("{}:{} resolved to {}", image, reference, digest);
                Ok(digest)
            }
            None if !response.status().is_success() => Err(SkipperError::RegistryResponse(
                format!("manifest {}:{} returned HTTP {}", image, reference, response.status()),
            )
            .into()),
            None => Err(SkipperError::MissingDigest {
                image: image.to_string(),
                reference: reference.to_string(),
            }
            .into()),
        }
    }

    fn delete_manifest(&self, registry: &str, image: &str, digest: &str) -> Result<()> {
        let url = self.manifest_url(registry, image, digest);
        debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .context(format!("Failed to delete {}", url))?;

        if !response.status().is_success() {
            return Err(SkipperError::RemoteDelete {
                image: image.to_string(),
                digest: digest.to_string(),
                status: response.status().as_u16(),
            }
            .into());
        }

        info!("Deleted {}@{} from {}", image, digest, registry);
        Ok(())
    }
}
