//! End-to-end packaging pipeline.

use std::path::{Path, PathBuf};
use std::time::Instant;

use aie_device::instructions::dump_npu_instructions;
use aie_device::{DeviceError, DeviceModule};
use aie_toolchain::{find_peano, find_tool, Environment};
use log::info;

use crate::cdo::{generate_cdo, generate_pdi};
use crate::collab::{Collaborators, PassRunner};
use crate::compiler::{ChessCompiler, ChessToolchain, CoreCompiler, PeanoCompiler};
use crate::config::{Backend, BuildConfig, DeploymentTarget};
use crate::elf::{generate_core_elfs, prepare_microkernel, ElfAssignments};
use crate::error::{PackagingError, Result, Stage};
use crate::passes::control_packet_pipeline;
use crate::report::{PackagingReport, StageTiming};
use crate::unified::generate_unified_object;
use crate::xclbin::{generate_xclbin, XclbinRequest, XCLBINUTIL};

/// Output of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The PDI or XCLBIN at the configured output path.
    pub artifact: PathBuf,
    pub elfs: ElfAssignments,
    /// Serialized control-packet module, when requested.
    pub control_packets: Option<PathBuf>,
    pub report: PackagingReport,
}

/// How the final artifact is produced.
enum ArtifactWriter {
    CopyPdi,
    Xclbin { xclbinutil: PathBuf },
}

/// Everything resolved up front, so that no compiler runs before the
/// whole toolchain is known to be present.
struct Toolchains {
    compiler: Box<dyn CoreCompiler>,
    /// Present whenever microkernels or the vendor backend are requested.
    chess: Option<ChessToolchain>,
    writer: ArtifactWriter,
}

fn resolve_toolchains(config: &BuildConfig, env: &dyn Environment) -> Result<Toolchains> {
    let resolve_chess = || {
        ChessToolchain::resolve(
            config.vitis_dir.as_deref(),
            config.family,
            env,
            config.verbose,
        )
    };

    let (compiler, chess): (Box<dyn CoreCompiler>, Option<ChessToolchain>) = match config.backend {
        Backend::Chess => {
            let chess = resolve_chess()?;
            let compiler: Box<dyn CoreCompiler> =
                Box::new(ChessCompiler::new(chess.clone(), &config.object_cache_dir));
            (compiler, Some(chess))
        }
        Backend::Peano => {
            // Microkernels are only ever compiled with the vendor compiler.
            let chess = config.needs_chess().then(resolve_chess).transpose()?;
            let dir = find_peano(config.peano_dir.as_deref(), env)?;
            let compiler: Box<dyn CoreCompiler> = Box::new(
                PeanoCompiler::new(dir, config.family)
                    .with_opt_flags(config.additional_peano_opt_flags.clone())
                    .verbose(config.verbose),
            );
            (compiler, chess)
        }
    };

    let writer = match config.target {
        DeploymentTarget::XrtLite => ArtifactWriter::CopyPdi,
        DeploymentTarget::Xrt => ArtifactWriter::Xclbin {
            xclbinutil: find_tool(XCLBINUTIL, config.install_dir.as_deref(), env)?,
        },
    };

    Ok(Toolchains {
        compiler,
        chess,
        writer,
    })
}

fn run_stage<T>(
    timings: &mut Vec<StageTiming>,
    stage: Stage,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    info!("{stage}");
    let start = Instant::now();
    let value = f().map_err(|e| PackagingError::StageFailed {
        stage,
        source: Box::new(e),
    })?;
    timings.push(StageTiming {
        stage,
        duration_ms: start.elapsed().as_millis() as u64,
    });
    Ok(value)
}

/// Apply the control-packet passes to a copy of `module` carrying the ELF
/// names, and save the result as `control_packets.json`.
fn generate_control_packets(
    module: &DeviceModule,
    elfs: &ElfAssignments,
    config: &BuildConfig,
    passes: &dyn PassRunner,
) -> Result<(DeviceModule, PathBuf)> {
    let mut copy = module.clone();
    elfs.apply_to(&mut copy);
    let pipeline = control_packet_pipeline(&config.work_dir)
        .instrumented(config.ir_printing, config.timing);
    passes
        .run(&pipeline, &mut copy)
        .map_err(|message| PackagingError::ControlPacketsFailed { message })?;
    let path = config.work_dir.join("control_packets.json");
    copy.save(&path)?;
    Ok((copy, path))
}

fn emit_npu_instructions(module: &DeviceModule, path: &Path) -> Result<()> {
    dump_npu_instructions(module, path)
        .map(|count| info!("wrote {count} npu instructions to {}", path.display()))
        .map_err(|e| match e {
            DeviceError::Attribute { detail, .. } => PackagingError::MissingInstructions { detail },
            other => other.into(),
        })
}

/// Package `module` according to `config`.
///
/// Stages run strictly in order and the first failure aborts the run,
/// tagged with its [`Stage`]. Intermediates stay in the work directory; the
/// output path is only written by the last stage.
pub fn aie2xclbin(
    module: &DeviceModule,
    config: &BuildConfig,
    collab: &Collaborators,
    env: &dyn Environment,
) -> Result<PipelineOutput> {
    let start = Instant::now();
    let mut stages = Vec::new();
    let work_dir = config.work_dir.as_path();

    let tools = run_stage(&mut stages, Stage::ResolveToolchain, || {
        let tools = resolve_toolchains(config, env)?;
        std::fs::create_dir_all(work_dir).map_err(|e| PackagingError::io(work_dir, e))?;
        Ok(tools)
    })?;

    if let Some(path) = &config.npu_instructions_output {
        run_stage(&mut stages, Stage::NpuInstructions, || {
            emit_npu_instructions(module, path)
        })?;
    }

    let unified = run_stage(&mut stages, Stage::UnifiedObject, || {
        generate_unified_object(
            module,
            config,
            tools.compiler.as_ref(),
            collab.passes.as_ref(),
            collab.translator.as_ref(),
        )
    })?;

    let elfs = run_stage(&mut stages, Stage::CoreElfs, || {
        let microkernel = if config.microkernel.includes_matmul() {
            let chess = tools
                .chess
                .as_ref()
                .ok_or(PackagingError::MicrokernelRequiresChess)?;
            Some(prepare_microkernel(
                chess,
                config.family,
                &config.object_cache_dir,
                work_dir,
            )?)
        } else {
            None
        };
        generate_core_elfs(
            module,
            tools.compiler.as_ref(),
            &unified,
            microkernel.as_deref(),
            work_dir,
        )
    })?;

    let control_packets = if config.emit_control_packets {
        Some(run_stage(&mut stages, Stage::ControlPackets, || {
            generate_control_packets(module, &elfs, config, collab.passes.as_ref())
        })?)
    } else {
        None
    };

    let cdo_source = control_packets.as_ref().map_or(module, |(m, _)| m);
    run_stage(&mut stages, Stage::Cdo, || {
        generate_cdo(cdo_source, &elfs, collab.cdo.as_ref(), work_dir)
    })?;

    let pdi = work_dir.join("design.pdi");
    run_stage(&mut stages, Stage::Pdi, || {
        generate_pdi(&pdi, work_dir, collab.bootgen.as_ref())
    })?;

    let partition_uuid = run_stage(&mut stages, Stage::Artifact, || match &tools.writer {
        ArtifactWriter::CopyPdi => {
            std::fs::copy(&pdi, &config.output_path)
                .map_err(|e| PackagingError::io(&config.output_path, e))?;
            Ok(None)
        }
        ArtifactWriter::Xclbin { xclbinutil } => {
            let request = XclbinRequest {
                output: &config.output_path,
                work_dir,
                names: &config.xclbin,
                xclbinutil,
                input_xclbin: config.input_xclbin.as_deref(),
                verbose: config.verbose,
            };
            generate_xclbin(&request, collab.ids.as_ref()).map(|out| Some(out.uuid))
        }
    })?;

    let control_packets = control_packets.map(|(_, path)| path);
    let report = PackagingReport {
        family: config.family,
        backend: config.backend,
        target: config.target,
        duration_ms: start.elapsed().as_millis() as u64,
        stages,
        unified_object: unified,
        elfs: elfs.iter().map(|(_, name)| name.to_string()).collect(),
        control_packets: control_packets.clone(),
        pdi,
        artifact: config.output_path.clone(),
        partition_uuid,
    };
    info!("wrote {}", config.output_path.display());

    Ok(PipelineOutput {
        artifact: config.output_path.clone(),
        elfs,
        control_packets,
        report,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    use aie_device::module::NPU_INSTRUCTIONS_ATTR;
    use aie_device::{Attribute, HardwareFamily, Tile, TileCoord};
    use aie_toolchain::{MapEnvironment, ToolchainError};
    use serde_json::Value;

    use crate::cdo::CDO_BLOBS;
    use crate::collab::{BootImageGenerator, CdoEmitter, LlvmTranslator};
    use crate::config::Microkernel;
    use crate::passes::PassPipeline;
    use crate::xclbin::IdGenerator;

    const FIXED_UUID: &str = "00000000-1111-2222-3333-444444444444";

    fn executable(path: &Path, script: &str) {
        std::fs::write(path, script).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Records its arguments and creates the file after `-o`.
    fn fake_compiler_tool(bin: &Path, name: &str) {
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> \"{log}\"\nout=\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = -o ]; then out=\"$2\"; fi\n  shift\ndone\n[ -n \"$out\" ] && : > \"$out\"\nexit 0\n",
            log = bin.join(format!("{name}.log")).display()
        );
        executable(&bin.join(name), &script);
    }

    /// Dumps a partition with two PDIs on `--dump-section` and creates the
    /// file after `--output`.
    fn fake_xclbinutil(dir: &Path) {
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
while [ $# -gt 0 ]; do
  case "$1" in
    --dump-section)
      path="${{2#AIE_PARTITION:JSON:}}"
      printf '%s' '{{"aie_partition":{{"name":"QoS","PDIs":[{{"uuid":"a"}},{{"uuid":"b"}}]}}}}' > "$path"
      shift ;;
    --output)
      : > "$2"
      shift ;;
  esac
  shift
done
exit 0
"#,
            log = dir.join("xclbinutil.log").display()
        );
        executable(&dir.join(XCLBINUTIL), &script);
    }

    struct Fixture {
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let bin = root.path().join("peano").join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            for tool in ["opt", "llc", "clang"] {
                fake_compiler_tool(&bin, tool);
            }
            let install = root.path().join("install");
            std::fs::create_dir_all(&install).unwrap();
            fake_xclbinutil(&install);
            Self { root }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }

        fn config(&self, target: DeploymentTarget) -> BuildConfig {
            let mut config =
                BuildConfig::new(HardwareFamily::Npu1, self.path("work"), self.path("out.bin"));
            config.target = target;
            config.peano_dir = Some(self.path("peano"));
            config.install_dir = Some(self.path("install"));
            config.object_cache_dir = self.path("cache");
            config
        }

        fn log(&self, tool: &str) -> Option<String> {
            std::fs::read_to_string(self.path("peano").join("bin").join(format!("{tool}.log"))).ok()
        }
    }

    struct FakePasses;

    impl PassRunner for FakePasses {
        fn run(&self, pipeline: &PassPipeline, module: &mut DeviceModule) -> std::result::Result<(), String> {
            let last = pipeline.pass_names().last().unwrap_or_default().to_string();
            module.set_attribute("last_pass", Attribute::String(last));
            Ok(())
        }
    }

    struct FakeTranslator;

    impl LlvmTranslator for FakeTranslator {
        fn translate(&self, _module: &DeviceModule) -> std::result::Result<String, String> {
            Ok("define void @core_0_2() {\n  ret void\n}\n".to_string())
        }
    }

    /// Writes the blobs after checking every named ELF exists.
    struct FakeCdo;

    impl CdoEmitter for FakeCdo {
        fn emit(&self, module: &DeviceModule, work_dir: &Path) -> std::result::Result<(), String> {
            for (_, core) in module.core_tiles() {
                let elf = core.elf_file.as_deref().ok_or("core without elf")?;
                if !work_dir.join(elf).is_file() {
                    return Err(format!("missing {elf}"));
                }
            }
            for blob in CDO_BLOBS {
                std::fs::write(work_dir.join(blob), blob).map_err(|e| e.to_string())?;
            }
            Ok(())
        }
    }

    struct FakeBootgen;

    impl BootImageGenerator for FakeBootgen {
        fn run(&self, argv: &[String]) -> i32 {
            match argv.iter().position(|a| a == "-o") {
                Some(i) => match std::fs::write(&argv[i + 1], "PDI") {
                    Ok(()) => 0,
                    Err(_) => 2,
                },
                None => 1,
            }
        }
    }

    struct FixedId;

    impl IdGenerator for FixedId {
        fn generate(&self) -> String {
            FIXED_UUID.to_string()
        }
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            passes: Box::new(FakePasses),
            translator: Box::new(FakeTranslator),
            cdo: Box::new(FakeCdo),
            bootgen: Box::new(FakeBootgen),
            ids: Box::new(FixedId),
        }
    }

    fn two_core_module() -> DeviceModule {
        let mut m = DeviceModule::new(vec![
            Tile::new(0, 0),
            Tile::with_core(0, 2),
            Tile::with_core(2, 5),
        ]);
        m.set_attribute(NPU_INSTRUCTIONS_ATTR, Attribute::DenseU32(vec![0x06030100, 0x0]));
        m
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn lite_target_copies_pdi() {
        let fx = Fixture::new();
        let config = fx.config(DeploymentTarget::XrtLite);
        let out = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap();

        assert_eq!(std::fs::read_to_string(&out.artifact).unwrap(), "PDI");
        let work = fx.path("work");
        assert!(work.join("core_0_2.elf").is_file());
        assert!(work.join("core_2_5.elf").is_file());
        assert!(work.join("input.o").is_file());
        assert!(!work.join("kernels.json").exists());
        assert!(!work.join("aie_partition.json").exists());
        assert_eq!(out.elfs.len(), 2);
        assert!(out.control_packets.is_none());
        assert!(out.report.partition_uuid.is_none());
        // opt, then llc, then one clang run per core.
        assert_eq!(fx.log("opt").unwrap().lines().count(), 1);
        assert_eq!(fx.log("clang").unwrap().lines().count(), 2);
    }

    #[test]
    fn stages_are_reported_in_order() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::XrtLite);
        config.npu_instructions_output = Some(fx.path("insts.txt"));
        let out = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap();
        let stages: Vec<_> = out.report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            [
                Stage::ResolveToolchain,
                Stage::NpuInstructions,
                Stage::UnifiedObject,
                Stage::CoreElfs,
                Stage::Cdo,
                Stage::Pdi,
                Stage::Artifact,
            ]
        );
        assert_eq!(
            std::fs::read_to_string(fx.path("insts.txt")).unwrap(),
            "06030100\n00000000"
        );
    }

    #[test]
    fn xrt_target_writes_metadata() {
        let fx = Fixture::new();
        let config = fx.config(DeploymentTarget::Xrt);
        let out = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap();

        assert!(out.artifact.is_file());
        assert_eq!(out.report.partition_uuid.as_deref(), Some(FIXED_UUID));
        let work = fx.path("work");
        let partition = read_json(&work.join("aie_partition.json"));
        let pdis = partition["aie_partition"]["PDIs"].as_array().unwrap();
        assert_eq!(pdis.len(), 1);
        assert_eq!(pdis[0]["uuid"], FIXED_UUID);

        let kernels = read_json(&work.join("kernels.json"));
        let args = kernels["ps-kernels"]["kernels"][0]["arguments"].as_array().unwrap();
        let offsets: Vec<_> = args.iter().map(|a| a["offset"].as_str().unwrap()).collect();
        assert_eq!(
            offsets,
            ["0x00", "0x08", "0x10", "0x14", "0x1c", "0x24", "0x2c", "0x34", "0x3c"]
        );

        let log = std::fs::read_to_string(fx.path("install").join("xclbinutil.log")).unwrap();
        assert!(log.contains("--add-replace-section MEM_TOPOLOGY:JSON:"));
        assert!(!log.contains("--dump-section"));
    }

    #[test]
    fn xrt_target_extends_input_container() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::Xrt);
        let base = fx.path("base.xclbin");
        std::fs::write(&base, "").unwrap();
        config.input_xclbin = Some(base);
        aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new()).unwrap();

        let partition = read_json(&fx.path("work").join("aie_partition.json"));
        let uuids: Vec<_> = partition["aie_partition"]["PDIs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["uuid"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(uuids, ["a", "b", FIXED_UUID]);
        let log = std::fs::read_to_string(fx.path("install").join("xclbinutil.log")).unwrap();
        assert!(!log.contains("MEM_TOPOLOGY"));
    }

    #[test]
    fn preset_elf_names_are_kept() {
        let fx = Fixture::new();
        let mut module = two_core_module();
        module.tiles[1].core.as_mut().unwrap().elf_file = Some("custom.elf".to_string());
        let config = fx.config(DeploymentTarget::XrtLite);
        let out = aie2xclbin(&module, &config, &collaborators(), &MapEnvironment::new()).unwrap();
        assert_eq!(out.elfs.get(TileCoord::new(0, 2)), Some("custom.elf"));
        assert_eq!(out.elfs.get(TileCoord::new(2, 5)), Some("core_2_5.elf"));
        assert!(fx.path("work").join("custom.elf").is_file());
    }

    #[test]
    fn control_packets_feed_cdo() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::XrtLite);
        config.emit_control_packets = true;
        let out = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap();
        let path = out.control_packets.unwrap();
        let saved = DeviceModule::load(&path).unwrap();
        assert_eq!(
            saved.attribute("last_pass"),
            Some(&Attribute::String("amdaie-split-control-packet-data".to_string()))
        );
        assert_eq!(
            saved.tiles[1].core.as_ref().unwrap().elf_file.as_deref(),
            Some("core_0_2.elf")
        );
    }

    #[test]
    fn missing_instructions_fail_before_compiling() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::XrtLite);
        config.npu_instructions_output = Some(fx.path("insts.txt"));
        let module = DeviceModule::new(vec![Tile::with_core(0, 2)]);
        let err = aie2xclbin(&module, &config, &collaborators(), &MapEnvironment::new())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::NpuInstructions));
        assert!(matches!(err.root(), PackagingError::MissingInstructions { .. }));
        assert!(fx.log("opt").is_none());
    }

    #[test]
    fn chess_backend_without_vitis_fails_up_front() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::XrtLite);
        config.backend = Backend::Chess;
        let err = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ResolveToolchain));
        assert!(matches!(
            err.toolchain_error(),
            Some(ToolchainError::ToolchainNotFound { toolchain: "vitis", .. })
        ));
        assert!(fx.log("opt").is_none());
        assert!(!fx.path("out.bin").exists());
    }

    #[test]
    fn microkernel_needs_vendor_toolchain() {
        let fx = Fixture::new();
        let mut config = fx.config(DeploymentTarget::XrtLite);
        config.microkernel = Microkernel::Mm;
        let err = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap_err();
        assert!(matches!(
            err.toolchain_error(),
            Some(ToolchainError::ToolchainNotFound { toolchain: "vitis", .. })
        ));
        assert!(fx.log("opt").is_none());
    }

    #[test]
    fn missing_xclbinutil_fails_up_front() {
        let fx = Fixture::new();
        let config = fx.config(DeploymentTarget::Xrt);
        std::fs::remove_file(fx.path("install").join(XCLBINUTIL)).unwrap();
        let err = aie2xclbin(&two_core_module(), &config, &collaborators(), &MapEnvironment::new())
            .unwrap_err();
        assert!(matches!(
            err.toolchain_error(),
            Some(ToolchainError::ToolNotFound { .. })
        ));
        assert!(fx.log("opt").is_none());
    }

    #[test]
    fn failing_bootgen_leaves_no_output() {
        struct Failing;
        impl BootImageGenerator for Failing {
            fn run(&self, _argv: &[String]) -> i32 {
                3
            }
        }

        let fx = Fixture::new();
        let config = fx.config(DeploymentTarget::XrtLite);
        let mut collab = collaborators();
        collab.bootgen = Box::new(Failing);
        let err = aie2xclbin(&two_core_module(), &config, &collab, &MapEnvironment::new())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Pdi));
        assert!(matches!(err.root(), PackagingError::BootImageFailed { status: 3 }));
        assert!(!fx.path("out.bin").exists());
    }
}
