//! XCLBIN container packaging.
//!
//! Three JSON documents describe the container: the memory topology, the AIE
//! partition (with one PDI entry per design, identified by a UUID) and the
//! kernel ABI. `iree-aie-xclbinutil` combines them with the PDI.

use std::path::{Path, PathBuf};

use aie_toolchain::{run_tool, ToolInvocation};
use log::{debug, info};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::XclbinNames;
use crate::error::{PackagingError, Result};

/// Name of the container packaging tool.
pub const XCLBINUTIL: &str = "iree-aie-xclbinutil";

/// Source of partition identifiers.
pub trait IdGenerator {
    /// A fresh identifier in 36-character hyphenated form.
    fn generate(&self) -> String;
}

/// Random (version 4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuid;

impl IdGenerator for RandomUuid {
    fn generate(&self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}

pub fn mem_topology() -> Value {
    json!({
        "mem_topology": {
            "m_count": "2",
            "m_mem_data": [
                {
                    "m_type": "MEM_DRAM",
                    "m_used": "1",
                    "m_sizeKB": "0x10000",
                    "m_tag": "HOST",
                    "m_base_address": "0x4000000"
                },
                {
                    "m_type": "MEM_DRAM",
                    "m_used": "1",
                    "m_sizeKB": "0xc000",
                    "m_tag": "SRAM",
                    "m_base_address": "0x4000000"
                }
            ]
        }
    })
}

/// Partition document with a single PDI entry.
pub fn aie_partition(uuid: &str, kernel_id: &str) -> Value {
    json!({
        "aie_partition": {
            "name": "QoS",
            "operations_per_cycle": "2048",
            "inference_fingerprint": "23423",
            "pre_post_fingerprint": "12345",
            "partition": {
                "column_width": 4,
                "start_columns": [1]
            },
            "PDIs": [
                {
                    "uuid": uuid,
                    "file_name": "./design.pdi",
                    "cdo_groups": [
                        {
                            "name": "DPU",
                            "type": "PRIMARY",
                            "pdi_id": "0x01",
                            "dpu_kernel_ids": [kernel_id],
                            "pre_cdo_groups": ["0xC1"]
                        }
                    ]
                }
            ]
        }
    })
}

fn kernel_argument(name: &str, qualifier: &str, ty: &str, offset: &str, memory: Option<&str>) -> Value {
    let mut arg = json!({
        "name": name,
        "address-qualifier": qualifier,
        "type": ty,
        "offset": offset,
    });
    if let Some(memory) = memory {
        arg["memory-connection"] = json!(memory);
    }
    arg
}

/// Kernel document: one DPU kernel with the fixed argument ABI.
pub fn kernels(names: &XclbinNames) -> Value {
    let mut arguments = vec![
        kernel_argument("opcode", "SCALAR", "uint64_t", "0x00", None),
        kernel_argument("instr", "GLOBAL", "char *", "0x08", Some("SRAM")),
        kernel_argument("ninstr", "SCALAR", "uint32_t", "0x10", None),
    ];
    for i in 0..6u32 {
        let offset = format!("0x{:x}", 0x14 + 8 * i);
        arguments.push(kernel_argument(&format!("bo{i}"), "GLOBAL", "void*", &offset, Some("HOST")));
    }

    json!({
        "ps-kernels": {
            "kernels": [
                {
                    "name": names.kernel_name,
                    "type": "dpu",
                    "extended-data": {
                        "subtype": "DPU",
                        "functional": "0",
                        "dpu_kernel_id": names.kernel_id
                    },
                    "arguments": arguments,
                    "instances": [{ "name": names.instance_name }]
                }
            ]
        }
    })
}

fn pdis_mut<'a>(doc: &'a mut Value, what: &str) -> Result<&'a mut Vec<Value>> {
    doc.get_mut("aie_partition")
        .and_then(|p| p.get_mut("PDIs"))
        .and_then(Value::as_array_mut)
        .ok_or_else(|| packaging_failed(format!("{what} has no aie_partition.PDIs array")))
}

/// Append the PDI entries of `generated` to those of `base`; the rest of
/// `base` is kept as is.
pub fn merge_partition_pdis(mut base: Value, generated: &Value) -> Result<Value> {
    let mut generated = generated.clone();
    let new_pdis = std::mem::take(pdis_mut(&mut generated, "generated partition")?);
    pdis_mut(&mut base, "base partition")?.extend(new_pdis);
    Ok(base)
}

fn packaging_failed(message: impl Into<String>) -> PackagingError {
    PackagingError::PackagingFailed {
        message: message.into(),
        source: None,
    }
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| packaging_failed(format!("failed to serialize {}: {e}", path.display())))?;
    std::fs::write(path, text).map_err(|e| PackagingError::io(path, e))
}

/// Inputs for one container build.
#[derive(Debug, Clone)]
pub struct XclbinRequest<'a> {
    pub output: &'a Path,
    pub work_dir: &'a Path,
    pub names: &'a XclbinNames,
    pub xclbinutil: &'a Path,
    /// Existing container whose PDIs are kept.
    pub input_xclbin: Option<&'a Path>,
    pub verbose: bool,
}

/// Paths of the generated metadata and the new partition id.
#[derive(Debug, Clone)]
pub struct XclbinOutput {
    pub uuid: String,
    pub mem_topology: PathBuf,
    pub aie_partition: PathBuf,
    pub kernels: PathBuf,
}

/// Write the metadata documents into the work directory and run the
/// packaging tool. `design.pdi` must already be in the work directory.
pub fn generate_xclbin(request: &XclbinRequest<'_>, ids: &dyn IdGenerator) -> Result<XclbinOutput> {
    let work = request.work_dir;
    let mem_topology_path = work.join("mem_topology.json");
    write_json(&mem_topology_path, &mem_topology())?;

    let uuid = ids.generate();
    debug!("partition uuid {uuid}");
    let partition = aie_partition(&uuid, &request.names.kernel_id);
    let partition_path = work.join("aie_partition.json");
    write_json(&partition_path, &partition)?;

    let kernels_path = work.join("kernels.json");
    write_json(&kernels_path, &kernels(request.names))?;

    let run = |args: Vec<String>, what: &str| {
        let inv = ToolInvocation::new(request.xclbinutil)
            .args(args)
            .verbose(request.verbose);
        run_tool(&inv).map_err(|source| PackagingError::PackagingFailed {
            message: format!("failed to execute xclbinutil ({what})"),
            source: Some(source),
        })
    };

    let mut args = Vec::new();
    match request.input_xclbin {
        None => {
            args.push("--add-replace-section".to_string());
            args.push(format!("MEM_TOPOLOGY:JSON:{}", mem_topology_path.display()));
        }
        Some(base) => {
            let dumped = work.join("aie_input_partition.json");
            run(
                vec![
                    "--dump-section".to_string(),
                    format!("AIE_PARTITION:JSON:{}", dumped.display()),
                    "--force".to_string(),
                    "--input".to_string(),
                    base.display().to_string(),
                ],
                "dump partition",
            )?;
            let text = std::fs::read_to_string(&dumped)
                .map_err(|e| packaging_failed(format!("failed to open {}: {e}", dumped.display())))?;
            let base_partition: Value = serde_json::from_str(&text)
                .map_err(|e| packaging_failed(format!("invalid JSON in {}: {e}", dumped.display())))?;
            let merged = merge_partition_pdis(base_partition, &partition)?;
            write_json(&partition_path, &merged)?;

            args.push("--input".to_string());
            args.push(base.display().to_string());
        }
    }
    args.extend([
        "--add-kernel".to_string(),
        kernels_path.display().to_string(),
        "--add-replace-section".to_string(),
        format!("AIE_PARTITION:JSON:{}", partition_path.display()),
        "--force".to_string(),
        "--output".to_string(),
        request.output.display().to_string(),
    ]);

    info!("packaging xclbin {}", request.output.display());
    run(args, "package")?;

    Ok(XclbinOutput {
        uuid,
        mem_topology: mem_topology_path,
        aie_partition: partition_path,
        kernels: kernels_path,
    })
}
