use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Executes fully resolved command vectors.
///
/// With `fqdn_image` the command runs inside a container of that image,
/// otherwise directly on the host. Returns the exit code of the command.
pub trait CommandExecutor {
    fn run(
        &self,
        command: &[String],
        fqdn_image: Option<&str>,
        environment: &[String],
        interactive: bool,
    ) -> Result<i32>;
}

/// Spawns host processes with inherited stdio.
pub struct ProcessRunner {
    workspace: PathBuf,
}

impl ProcessRunner {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
        }
    }

    /// The `docker run` invocation that executes `command` inside `image`.
    pub fn container_command(
        &self,
        command: &[String],
        image: &str,
        environment: &[String],
        interactive: bool,
    ) -> Vec<String> {
        let workspace = self.workspace.display().to_string();
        let mut args: Vec<String> = vec!["docker".into(), "run".into(), "--rm".into()];
        if interactive {
            args.push("-i".into());
            args.push("-t".into());
        }
        for entry in environment {
            args.push("-e".into());
            args.push(entry.clone());
        }
        args.extend([
            "-v".to_string(),
            format!("{}:{}", workspace, workspace),
            "-v".to_string(),
            format!("{}:{}", DOCKER_SOCKET, DOCKER_SOCKET),
            "-w".to_string(),
            workspace,
            image.to_string(),
        ]);
        args.extend(command.iter().cloned());
        args
    }
}

impl CommandExecutor for ProcessRunner {
    fn run(
        &self,
        command: &[String],
        fqdn_image: Option<&str>,
        environment: &[String],
        interactive: bool,
    ) -> Result<i32> {
        let argv = match fqdn_image {
            Some(image) => self.container_command(command, image, environment, interactive),
            None => command.to_vec(),
        };
        let (program, args) = argv.split_first().context("Empty command")?;

        debug!("Executing {:?}", argv);
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.workspace)
            .status()
            .context(format!("Failed to execute {:?}", argv))?;

        // Killed by a signal: report a generic failure
        Ok(status.code().unwrap_or(1))
    }
}
