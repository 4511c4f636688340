//! aie2xclbin: package lowered AIE device modules into PDI and XCLBIN
//! images.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use commands::build::BuildArgs;
use manifest::Manifest;

#[derive(Parser)]
#[command(name = "aie2xclbin", version, about = "Package lowered AIE device modules")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile core ELFs and package a PDI or XCLBIN
    Build(BuildArgs),
    /// Report which toolchains and helpers can be found
    Doctor {
        /// Hardware family to check the vendor toolchain for (npu1, npu4)
        #[arg(long)]
        family: Option<String>,
    },
    /// Remove memoized vendor objects from the object cache
    Clean {
        /// Cache directory (default: manifest [paths] object_cache, else the current directory)
        #[arg(long)]
        object_cache_dir: Option<PathBuf>,
    },
    /// Write the host instruction stream of a device module as hex words
    DumpInstructions {
        /// Device module (JSON)
        input: PathBuf,
        /// Output text file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Build(args) => {
            let manifest = load_manifest_optional(&cwd)?;
            commands::build::run(&cwd, manifest.as_ref(), &args)
        }
        Commands::Doctor { family } => commands::doctor::run(&cwd, family.as_deref()),
        Commands::Clean { object_cache_dir } => {
            let manifest = load_manifest_optional(&cwd)?;
            let dir = object_cache_dir
                .or_else(|| manifest.and_then(|m| m.paths.object_cache))
                .unwrap_or(cwd);
            commands::clean::run(&dir)
        }
        Commands::DumpInstructions { input, output } => {
            commands::dump::run(&input, &output)
        }
    }
}

fn load_manifest_optional(cwd: &Path) -> anyhow::Result<Option<Manifest>> {
    Ok(Manifest::find_and_load(cwd)?.map(|(manifest, _)| manifest))
}
