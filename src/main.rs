use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::debug;
use std::process;

use skipper::commands::render_images_table;
use skipper::config::{self, CliOverrides, ConfigFile, Defaults, EnvSnapshot};
use skipper::errors;
use skipper::notifier::VerbosityLevel;
use skipper::{
    Backends, CommandHandler, DockerCli, HttpRegistry, LazyGitTags, Notifier, ProcessRunner,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Registry host (e.g., registry.io:5000)")]
    registry: Option<String>,

    #[arg(long, global = true, help = "Image to run commands in")]
    build_container_image: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Tag of the build container image; without it the image is built locally"
    )]
    build_container_tag: Option<String>,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build project images (all Dockerfile.<image> files when none is given)
    Build {
        #[arg(help = "Images to build")]
        images: Vec<String>,
    },

    /// Push the current build of an image to the registry
    Push {
        #[arg(help = "Project image to push")]
        image: String,
    },

    /// List local (and optionally registry) tags of the project images
    Images {
        #[arg(short, long, help = "Also list tags from the registry")]
        remote: bool,
    },

    /// Delete an image tag locally or from the registry
    Rmi {
        #[arg(short, long, help = "Delete from the registry instead of the local cache")]
        remote: bool,
        image: String,
        tag: String,
    },

    /// Run a command inside the build container
    Run {
        #[arg(short = 'e', value_name = "KEY=VALUE", help = "Extra environment variable")]
        env: Vec<String>,

        #[arg(long, help = "Keep stdin open and allocate a TTY")]
        interactive: bool,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run make targets inside the build container
    Make {
        #[arg(short = 'f', value_name = "MAKEFILE", help = "Makefile to use")]
        makefile: Option<String>,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        targets: Vec<String>,
    },

    /// Open an interactive shell inside the build container
    Shell,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            registry: self.registry.clone(),
            build_container_image: self.build_container_image.clone(),
            build_container_tag: self.build_container_tag.clone(),
            ..CliOverrides::default()
        };
        match &self.command {
            Commands::Run { env, .. } => overrides.env = env.clone(),
            Commands::Make { makefile, .. } => overrides.makefile = makefile.clone(),
            _ => {}
        }
        overrides
    }
}

fn run(cli: Cli) -> Result<i32> {
    let project_root = std::env::current_dir().context("Failed to get current directory")?;
    debug!("Project root: {}", project_root.display());

    let file = ConfigFile::load(&project_root)?;
    let config = config::resolve(
        &Defaults::default(),
        &file,
        &cli.overrides(),
        &EnvSnapshot::from_process(),
    )?;
    debug!("Effective configuration: {:?}", config);

    let notifier = Notifier::new(cli.verbose);
    let executor = ProcessRunner::new(&project_root);
    let docker = DockerCli::new();
    let registry = HttpRegistry::new()?;
    let tags = LazyGitTags::new(&project_root);

    let handler = CommandHandler::new(
        &project_root,
        config,
        Backends {
            executor: &executor,
            local: &docker,
            registry: &registry,
            tags: &tags,
            notifier: &notifier,
        },
    );

    match cli.command {
        Commands::Build { images } => handler.build(&images).map(|_| 0),
        Commands::Push { image } => handler.push(&image).map(|_| 0),
        Commands::Images { remote } => {
            let rows = handler.images(remote)?;
            println!("{}", render_images_table(&rows));
            Ok(0)
        }
        Commands::Rmi { remote, image, tag } => handler.rmi(&image, &tag, remote).map(|_| 0),
        Commands::Run {
            interactive,
            command,
            ..
        } => handler.run(&command, interactive),
        Commands::Make { targets, .. } => handler.make(&targets),
        Commands::Shell => handler.shell(),
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(VerbosityLevel::from(cli.verbose).to_log_level())
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            errors::exit_code(&e)
        }
    };
    process::exit(code);
}
