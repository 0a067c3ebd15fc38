use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use std::process::Command;

use super::TagEntry;
use crate::errors::SkipperError;
use crate::images::ImageRef;

/// `docker images` output format producing one JSON record per line.
pub const IMAGES_FORMAT: &str = r#"{"name": "{{.Repository}}", "tag": "{{.Tag}}"}"#;

/// Read and delete access to the images cached by the local daemon.
pub trait LocalImageInspector {
    /// Tags the daemon holds for one repository, in the order it reports them.
    fn list_tags(&self, image: &str) -> Result<Vec<TagEntry>>;

    /// Removes `image` (its `name:tag`) from the local cache.
    fn remove(&self, image: &ImageRef) -> Result<()>;

    /// Queries every image separately and concatenates the results in order.
    fn list_local(&self, images: &[String]) -> Result<Vec<TagEntry>> {
        let mut entries = Vec::new();
        for image in images {
            entries.extend(self.list_tags(image)?);
        }
        Ok(entries)
    }

    fn has_tag(&self, image: &str, tag: &str) -> Result<bool> {
        Ok(self.list_tags(image)?.iter().any(|entry| entry.tag == tag))
    }
}

/// Talks to the daemon through the `docker` command line.
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    fn run_command(&self, args: &[&str]) -> Result<String> {
        debug!("Running docker {:?}", args);
        let output = Command::new("docker")
            .args(args)
            .output()
            .context(format!("Failed to execute docker command: {:?}", args))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Docker command failed: {}", error));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalImageInspector for DockerCli {
    fn list_tags(&self, image: &str) -> Result<Vec<TagEntry>> {
        let output = self.run_command(&["images", "--format", IMAGES_FORMAT, image])?;
        Ok(parse_image_records(image, &output))
    }

    fn remove(&self, image: &ImageRef) -> Result<()> {
        let reference = image.local().fqdn();
        let command = ["docker", "rmi", reference.as_str()];
        let status = Command::new(command[0])
            .args(&command[1..])
            .status()
            .context(format!("Failed to execute docker command: {:?}", command))?;

        if !status.success() {
            return Err(SkipperError::CommandFailed {
                command: command.iter().map(|arg| arg.to_string()).collect(),
                code: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }
}

/// Parses newline-delimited `{"name", "tag"}` records.
///
/// Output that does not parse as a whole yields no entries for `image`.
pub fn parse_image_records(image: &str, output: &str) -> Vec<TagEntry> {
    let parsed: Result<Vec<TagEntry>, _> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str::<TagEntry>)
        .collect();

    match parsed {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring unreadable docker images output for {}: {}", image, e);
            Vec::new()
        }
    }
}
