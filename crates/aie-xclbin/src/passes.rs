//! Transformation pass pipelines, described as data.
//!
//! The pipelines themselves run in an external [`PassRunner`]; this module
//! only fixes which passes run, in which order, with which options.
//!
//! [`PassRunner`]: crate::collab::PassRunner

use std::fmt;
use std::path::Path;

use crate::config::{Backend, IrPrinting};

/// One pass with its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub name: String,
    pub options: Vec<(String, String)>,
}

impl Pass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((key.into(), value.to_string()));
        self
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.options.is_empty() {
            let opts: Vec<String> = self
                .options
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "{{{}}}", opts.join(" "))?;
        }
        Ok(())
    }
}

/// An ordered pass list anchored on the top-level module, plus
/// instrumentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPipeline {
    pub anchor: String,
    pub passes: Vec<Pass>,
    pub ir_printing: IrPrinting,
    pub timing: bool,
}

impl PassPipeline {
    pub fn new(passes: Vec<Pass>) -> Self {
        Self {
            anchor: "builtin.module".to_string(),
            passes,
            ir_printing: IrPrinting::default(),
            timing: false,
        }
    }

    pub fn instrumented(mut self, ir_printing: IrPrinting, timing: bool) -> Self {
        self.ir_printing = ir_printing;
        self.timing = timing;
        self
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name.as_str())
    }
}

impl fmt::Display for PassPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passes: Vec<String> = self.passes.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.anchor, passes.join(","))
    }
}

fn canonicalize_and_cse(passes: &mut Vec<Pass>) {
    passes.push(Pass::new("canonicalize"));
    passes.push(Pass::new("cse"));
}

/// Lowering from the device dialects to the LLVM dialect.
pub fn lowering_pipeline(backend: Backend) -> PassPipeline {
    let mut passes = vec![
        Pass::new("amdaie-core-to-standard").option("lower-to-chess", backend == Backend::Chess),
        Pass::new("finalize-memref-to-llvm"),
    ];
    canonicalize_and_cse(&mut passes);
    passes.push(Pass::new("convert-func-to-llvm").option("use-bare-ptr-memref-call-conv", true));
    passes.push(Pass::new("convert-arith-to-llvm"));
    canonicalize_and_cse(&mut passes);
    passes.push(Pass::new("convert-cf-to-llvm"));
    canonicalize_and_cse(&mut passes);
    PassPipeline::new(passes)
}

/// Conversion of device configuration into control packets, reading core
/// ELFs from `elf_dir`.
pub fn control_packet_pipeline(elf_dir: &Path) -> PassPipeline {
    PassPipeline::new(vec![
        Pass::new("amdaie-convert-device-to-control-packets")
            .option("path-to-elfs", elf_dir.display()),
        Pass::new("amdaie-split-control-packet-data"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowering_pipeline_order() {
        let p = lowering_pipeline(Backend::Peano);
        let names: Vec<_> = p.pass_names().collect();
        assert_eq!(
            names,
            [
                "amdaie-core-to-standard",
                "finalize-memref-to-llvm",
                "canonicalize",
                "cse",
                "convert-func-to-llvm",
                "convert-arith-to-llvm",
                "canonicalize",
                "cse",
                "convert-cf-to-llvm",
                "canonicalize",
                "cse",
            ]
        );
    }

    #[test]
    fn lowering_pipeline_text() {
        let text = lowering_pipeline(Backend::Chess).to_string();
        assert!(text.starts_with(
            "builtin.module(amdaie-core-to-standard{lower-to-chess=true},finalize-memref-to-llvm,"
        ));
        assert!(text.contains("convert-func-to-llvm{use-bare-ptr-memref-call-conv=true}"));
        assert!(text.ends_with("convert-cf-to-llvm,canonicalize,cse)"));
    }

    #[test]
    fn control_packet_pipeline_carries_elf_dir() {
        let text = control_packet_pipeline(Path::new("/tmp/work")).to_string();
        assert_eq!(
            text,
            "builtin.module(amdaie-convert-device-to-control-packets{path-to-elfs=/tmp/work},\
             amdaie-split-control-packet-data)"
        );
    }
}
