//! Argument composition for the open backend's `opt`.

use std::path::Path;

use log::debug;

use crate::error::{PackagingError, Result};

/// Default `opt` flags, in order. Most are taken from the AIE clang driver.
pub const DEFAULT_OPT_FLAGS: [&str; 9] = [
    // No vectorization cost model for AIE.
    "-vectorize-loops=false",
    "-vectorize-slp=false",
    // An if-then-else cascade has enough delay slots to speculate 10 instructions.
    "--two-entry-phi-node-folding-threshold=10",
    // Optimize before mandatory inlining so noalias attributes survive.
    "-mandatory-inlining-before-opt=false",
    "-basic-aa-full-phi-analysis=true",
    "-basic-aa-max-lookup-search-depth=10",
    "-O3",
    "--inline-threshold=10",
    // memset is missing from libc.
    "--disable-builtin=memset",
];

/// Whether `flag` selects an optimization level, like `-O2`.
fn is_opt_level_flag(flag: &str) -> bool {
    flag.len() == 3 && flag.starts_with("-O")
}

/// Two flags that `opt` rejects when given together.
fn conflicts(a: &str, b: &str) -> bool {
    is_opt_level_flag(a) && is_opt_level_flag(b)
}

/// Build the `opt` argument list for optimizing `input` into `output`.
///
/// `additional` is either empty or a whitespace-separated flag list wrapped
/// in a pair of double quotes. Each extra flag is appended, unless it
/// conflicts with a flag already present, in which case it takes that
/// flag's place.
pub fn compose_opt_args(input: &Path, output: &Path, additional: &str) -> Result<Vec<String>> {
    let mut args: Vec<String> = DEFAULT_OPT_FLAGS.iter().map(|f| f.to_string()).collect();
    args.extend([
        "-S".to_string(),
        input.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ]);

    if additional.is_empty() {
        return Ok(args);
    }

    let stripped = additional
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| PackagingError::MalformedFlagString {
            flags: additional.to_string(),
        })?;

    for flag in stripped.split_whitespace() {
        match args.iter_mut().find(|existing| conflicts(existing, flag)) {
            Some(existing) => {
                debug!("opt flag {flag} replaces {existing}");
                *existing = flag.to_string();
            }
            None => args.push(flag.to_string()),
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(additional: &str) -> Result<Vec<String>> {
        compose_opt_args(Path::new("in.ll"), Path::new("out.ll"), additional)
    }

    #[test]
    fn empty_flags_yield_defaults() {
        let args = compose("").unwrap();
        assert_eq!(args.len(), DEFAULT_OPT_FLAGS.len() + 4);
        assert_eq!(&args[..DEFAULT_OPT_FLAGS.len()], &DEFAULT_OPT_FLAGS[..]);
        assert_eq!(&args[DEFAULT_OPT_FLAGS.len()..], &["-S", "in.ll", "-o", "out.ll"]);
    }

    #[test]
    fn opt_level_replaced_in_place() {
        let defaults = compose("").unwrap();
        let o3 = defaults.iter().position(|a| a == "-O3").unwrap();

        let args = compose("\"-O2\"").unwrap();
        assert_eq!(args.len(), defaults.len());
        assert_eq!(args[o3], "-O2");
        assert_eq!(args.iter().filter(|a| *a == "-O2").count(), 1);
        assert!(!args.iter().any(|a| a == "-O3"));
    }

    #[test]
    fn other_flags_appended_in_order() {
        let args = compose("\"-time-passes  -debug-pass-manager\"").unwrap();
        let n = args.len();
        assert_eq!(args[n - 2], "-time-passes");
        assert_eq!(args[n - 1], "-debug-pass-manager");
    }

    #[test]
    fn unquoted_flags_rejected() {
        for bad in ["-O2", "\"-O2", "-O2\"", "\""] {
            let err = compose(bad).unwrap_err();
            assert!(matches!(err, PackagingError::MalformedFlagString { .. }), "{bad}");
        }
    }

    #[test]
    fn quoted_empty_string_is_defaults() {
        assert_eq!(compose("\"\"").unwrap(), compose("").unwrap());
    }

    #[test]
    fn long_o_flags_are_not_levels() {
        let args = compose("\"-Os -O\"").unwrap();
        // -Os is three characters, so it replaces -O3; -O is appended.
        assert!(args.contains(&"-Os".to_string()));
        assert!(!args.contains(&"-O3".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-O"));
    }
}
