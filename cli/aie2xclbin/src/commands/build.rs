//! `aie2xclbin build`: run the full packaging pipeline.

use std::path::{Path, PathBuf};

use aie_device::{DeviceModule, HardwareFamily};
use aie_toolchain::ProcessEnvironment;
use aie_xclbin::{
    aie2xclbin, external_collaborators, Backend, BuildConfig, DeploymentTarget, IrPrinting,
    Microkernel,
};
use anyhow::{bail, Context, Result};
use clap::Args;
use log::info;

use crate::manifest::Manifest;

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Lowered device module (JSON)
    pub input: PathBuf,
    /// Output PDI or XCLBIN (default: the input with a .pdi or .xclbin extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Hardware family (npu1, npu4)
    #[arg(long)]
    pub family: Option<String>,
    /// Core compiler (chess, peano)
    #[arg(long)]
    pub backend: Option<String>,
    /// Deployment target (xrt-lite, xrt)
    #[arg(long)]
    pub target: Option<String>,
    /// Microkernels to link into every core (none, mm, all)
    #[arg(long)]
    pub microkernel: Option<String>,
    /// Directory for intermediates (default: a temporary directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Keep the temporary work directory
    #[arg(long)]
    pub keep_temps: bool,
    #[arg(long)]
    pub vitis_dir: Option<PathBuf>,
    #[arg(long)]
    pub peano_dir: Option<PathBuf>,
    /// Directory searched first for the packaging helpers
    #[arg(long)]
    pub install_dir: Option<PathBuf>,
    /// Existing XCLBIN to add the new PDI to
    #[arg(long)]
    pub input_xclbin: Option<PathBuf>,
    /// Cache for memoized vendor objects
    #[arg(long)]
    pub object_cache_dir: Option<PathBuf>,
    /// Extra opt flags, wrapped in double quotes
    #[arg(long)]
    pub peano_opt_flags: Option<String>,
    /// Also write the host instruction stream to this file
    #[arg(long)]
    pub npu_insts: Option<PathBuf>,
    /// Generate control packets
    #[arg(long)]
    pub emit_ctrlpkt: bool,
    /// Echo every tool invocation and its output
    #[arg(long)]
    pub print_commands: bool,
    #[arg(long)]
    pub print_ir_before_all: bool,
    #[arg(long)]
    pub print_ir_after_all: bool,
    #[arg(long)]
    pub print_ir_module_scope: bool,
    /// Time pass pipelines
    #[arg(long)]
    pub timing: bool,
}

fn parse_or<T: std::str::FromStr>(flag: Option<&str>, fallback: Option<T>) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    flag.map(str::parse::<T>)
        .transpose()
        .map(|parsed| parsed.or(fallback))
        .map_err(anyhow::Error::from)
}

/// Merge flags over manifest values.
pub fn build_config(
    cwd: &Path,
    manifest: Option<&Manifest>,
    args: &BuildArgs,
    work_dir: PathBuf,
) -> Result<BuildConfig> {
    let defaults = Manifest::default();
    let manifest = manifest.unwrap_or(&defaults);
    let section = &manifest.build;

    let Some(family) = parse_or::<HardwareFamily>(args.family.as_deref(), section.family)? else {
        bail!("no hardware family given; pass --family or set family in [build]");
    };
    let backend = parse_or::<Backend>(args.backend.as_deref(), section.backend)?.unwrap_or_default();
    let target =
        parse_or::<DeploymentTarget>(args.target.as_deref(), section.target)?.unwrap_or_default();
    let microkernel = parse_or::<Microkernel>(args.microkernel.as_deref(), section.microkernel)?
        .unwrap_or_default();

    let output = args.output.clone().unwrap_or_else(|| {
        args.input.with_extension(match target {
            DeploymentTarget::XrtLite => "pdi",
            DeploymentTarget::Xrt => "xclbin",
        })
    });

    let mut config = BuildConfig::new(family, work_dir, output);
    config.backend = backend;
    config.target = target;
    config.microkernel = microkernel;
    config.vitis_dir = args.vitis_dir.clone().or_else(|| manifest.paths.vitis.clone());
    config.peano_dir = args.peano_dir.clone().or_else(|| manifest.paths.peano.clone());
    config.install_dir = args.install_dir.clone().or_else(|| manifest.paths.install.clone());
    config.object_cache_dir = args
        .object_cache_dir
        .clone()
        .or_else(|| manifest.paths.object_cache.clone())
        .unwrap_or_else(|| cwd.to_path_buf());
    config.input_xclbin = args.input_xclbin.clone();
    config.additional_peano_opt_flags = args
        .peano_opt_flags
        .clone()
        .or_else(|| section.peano_opt_flags.clone())
        .unwrap_or_default();
    config.npu_instructions_output = args.npu_insts.clone();
    config.emit_control_packets = args.emit_ctrlpkt || section.emit_control_packets;
    config.verbose = args.print_commands;
    config.ir_printing = IrPrinting {
        before_all: args.print_ir_before_all || section.print_ir.before_all,
        after_all: args.print_ir_after_all || section.print_ir.after_all,
        module_scope: args.print_ir_module_scope || section.print_ir.module_scope,
    };
    config.timing = args.timing || section.timing;
    config.xclbin = manifest.xclbin.clone();
    Ok(config)
}

/// Run the packaging pipeline.
pub fn run(cwd: &Path, manifest: Option<&Manifest>, args: &BuildArgs) -> Result<()> {
    let module = DeviceModule::load(&args.input)
        .with_context(|| format!("loading device module {}", args.input.display()))?;

    // Held until the end of the build so the directory outlives the pipeline.
    let mut temp = None;
    let work_dir = match &args.work_dir {
        Some(dir) => dir.clone(),
        None => {
            let dir = tempfile::Builder::new()
                .prefix("aie2xclbin-")
                .tempdir()
                .context("creating work directory")?;
            let path = dir.path().to_path_buf();
            if args.keep_temps {
                let _ = dir.keep();
            } else {
                temp = Some(dir);
            }
            path
        }
    };
    info!("work directory {}", work_dir.display());

    let config = build_config(cwd, manifest, args, work_dir)?;
    let env = ProcessEnvironment;
    let collab = external_collaborators(config.install_dir.as_deref(), &config.work_dir, &env, config.verbose)
        .context("locating packaging helpers")?;

    let output = aie2xclbin(&module, &config, &collab, &env)
        .with_context(|| format!("packaging {}", args.input.display()))?;

    println!("{}", output.report);
    if temp.is_none() {
        println!("Intermediates kept in {}", config.work_dir.display());
    }
    Ok(())
}
