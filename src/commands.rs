//! Subcommand handlers.
//!
//! [`CommandHandler`] turns an [`EffectiveConfig`] plus subcommand arguments
//! into command vectors for the [`CommandExecutor`], consulting the project
//! images, the tag resolver and the [`ImageReconciler`] on the way. Parameter
//! problems are detected before any external call is made.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::Table;

use crate::config::EffectiveConfig;
use crate::errors::SkipperError;
use crate::git::{resolve_build_container_ref, TagResolver};
use crate::images::{self, dockerfile_name, dockerfile_path, ImageRef};
use crate::notifier::Notifier;
use crate::reconciler::{ImageReconciler, ReconciledRow};
use crate::runner::CommandExecutor;
use crate::sources::{LocalImageInspector, RegistryClient};

/// External collaborators used by the handlers.
pub struct Backends<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub local: &'a dyn LocalImageInspector,
    pub registry: &'a dyn RegistryClient,
    pub tags: &'a dyn TagResolver,
    pub notifier: &'a Notifier,
}

pub struct CommandHandler<'a> {
    project_root: PathBuf,
    config: EffectiveConfig,
    backends: Backends<'a>,
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

impl<'a> CommandHandler<'a> {
    pub fn new(project_root: &Path, config: EffectiveConfig, backends: Backends<'a>) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            backends,
        }
    }

    fn reconciler(
        &self,
    ) -> ImageReconciler<'_, dyn LocalImageInspector + 'a, dyn RegistryClient + 'a> {
        ImageReconciler::new(
            self.backends.local,
            self.backends.registry,
            self.config.registry.as_deref(),
            self.backends.notifier,
        )
    }

    fn project_images(&self) -> Result<Vec<String>> {
        images::discover(&self.project_root)
    }

    fn validated_image(&self, image: &str) -> Result<()> {
        images::validate(image, &self.project_images()?)?;
        Ok(())
    }

    /// Runs a host command and turns a non-zero exit into an error.
    fn execute(&self, command: Vec<String>) -> Result<()> {
        self.backends.notifier.clear();
        let code = self.backends.executor.run(&command, None, &[], false)?;
        if code != 0 {
            return Err(SkipperError::CommandFailed { command, code }.into());
        }
        Ok(())
    }

    /// Builds the requested images, or every project image when none is given.
    ///
    /// All Dockerfiles are checked before the first build starts. Builds run
    /// in order and stop at the first failure.
    pub fn build(&self, requested: &[String]) -> Result<()> {
        let targets = if requested.is_empty() {
            self.project_images()?
        } else {
            requested.to_vec()
        };

        for image in &targets {
            if !dockerfile_path(&self.project_root, image).exists() {
                return Err(SkipperError::MissingDockerfile(dockerfile_name(image)).into());
            }
        }

        if targets.is_empty() {
            self.backends.notifier.warn("No Dockerfile.<image> found, nothing to build");
            return Ok(());
        }

        let tag = self.backends.tags.current_tag()?;
        for (index, image) in targets.iter().enumerate() {
            let reference = ImageRef::new(image.as_str(), tag.as_str());
            self.backends.notifier.info(&format!(
                "Building {} ({}/{})",
                reference,
                index + 1,
                targets.len()
            ));
            let dockerfile = dockerfile_name(image);
            let fqdn = reference.fqdn();
            self.execute(argv(&["docker", "build", "-f", &dockerfile, "-t", &fqdn, "."]))?;
        }
        Ok(())
    }

    /// Tags the current build of `image` for the registry, pushes it and drops
    /// the registry alias again.
    pub fn push(&self, image: &str) -> Result<()> {
        let registry = self.config.require_registry()?.to_string();
        self.validated_image(image)?;

        let tag = self.backends.tags.current_tag()?;
        let local = ImageRef::new(image, tag.as_str());
        let remote = local.clone().with_registry(Some(registry));
        let local_fqdn = local.fqdn();
        let remote_fqdn = remote.fqdn();

        self.backends
            .notifier
            .info(&format!("Pushing {}", remote_fqdn));
        self.execute(argv(&["docker", "tag", &local_fqdn, &remote_fqdn]))?;
        let pushed = self.execute(argv(&["docker", "push", &remote_fqdn]));
        let untagged = self.execute(argv(&["docker", "rmi", &remote_fqdn]));
        pushed?;
        untagged
    }

    /// Rows of the images table for every project image.
    pub fn images(&self, include_remote: bool) -> Result<Vec<ReconciledRow>> {
        if include_remote {
            self.config.require_registry()?;
        }
        let project_images = self.project_images()?;
        let rows = self.reconciler().list_images(&project_images, include_remote)?;
        self.backends.notifier.clear();
        Ok(rows)
    }

    pub fn rmi(&self, image: &str, tag: &str, remote: bool) -> Result<()> {
        if remote {
            self.config.require_registry()?;
        }
        self.validated_image(image)?;
        let result = self.reconciler().remove_image(image, tag, remote);
        self.backends.notifier.clear();
        result
    }

    /// Runs `command` inside the build container and returns its exit code.
    pub fn run(&self, command: &[String], interactive: bool) -> Result<i32> {
        if command.is_empty() {
            return Err(SkipperError::MissingParameter("COMMAND").into());
        }
        self.run_in_build_container(command, interactive)
    }

    pub fn make(&self, targets: &[String]) -> Result<i32> {
        if targets.is_empty() {
            return Err(SkipperError::MissingParameter("TARGET").into());
        }
        let mut command = argv(&["make", "-f", &self.config.makefile]);
        command.extend(targets.iter().cloned());
        self.run_in_build_container(&command, false)
    }

    pub fn shell(&self) -> Result<i32> {
        self.run_in_build_container(&argv(&["bash"]), true)
    }

    fn run_in_build_container(&self, command: &[String], interactive: bool) -> Result<i32> {
        let image = self.config.require_build_container_image()?;
        let fqdn = self.build_container(image)?;

        self.backends.notifier.clear();
        self.backends.executor.run(
            command,
            Some(&fqdn),
            &self.config.environment(),
            interactive,
        )
    }

    /// The reference to run the build container from.
    ///
    /// Without a configured tag the container is rebuilt locally from its own
    /// Dockerfile and referenced by its bare name.
    fn build_container(&self, image: &str) -> Result<String> {
        match resolve_build_container_ref(image, &self.config) {
            Some(reference) => Ok(self.reconciler().locate(&reference)?.fqdn()),
            None => {
                self.backends
                    .notifier
                    .info(&format!("No build container tag, building {} locally", image));
                let dockerfile = dockerfile_name(image);
                self.execute(argv(&["docker", "build", "-t", image, "-f", &dockerfile, "."]))?;
                Ok(image.to_string())
            }
        }
    }
}

/// Renders the images table with `REGISTRY | IMAGE | TAG` headers.
pub fn render_images_table(rows: &[ReconciledRow]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::ascii());
    table.to_string()
}
