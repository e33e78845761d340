//! Symbolication engine.
//!
//! Two strategies, chosen by [`Crash::symbolicate_method`]:
//!
//! * full-report rewrite through `symbolicatecrash`, which receives the
//!   report via a temporary file plus every dSYM as a `-d` option;
//! * per-address lookup through `atos`, one run per usable binary image,
//!   splicing resolved symbols back into the report text by byte range.
//!
//! Both strategies degrade to returning the original content when the
//! external tool fails. The single hard error is failing to stage the
//! temporary file for `symbolicatecrash`.
//!
//! [`Crash::symbolicate_method`]: crate::report::Crash

mod doctor;
pub mod process;
pub mod task;

pub use process::{CommandRunner, SystemRunner, ToolOutput, ToolPaths};
pub use task::{SymbolicateTask, TaskStatus, TaskTable};

use std::io::Write;
use std::ops::Range;

use log::{debug, warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::dsym::DsymFile;
use crate::report::{Crash, SymbolicateMethod};

#[derive(Debug, Error)]
pub enum SymbolicationError {
    #[error("failed to stage report for symbolicatecrash: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives the external tools against a parsed report.
pub struct Symbolicator<R = SystemRunner> {
    runner: R,
    tools: ToolPaths,
}

impl Symbolicator<SystemRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for Symbolicator<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Symbolicator<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            tools: ToolPaths::default(),
        }
    }

    pub fn tools_mut(&mut self) -> &mut ToolPaths {
        &mut self.tools
    }

    /// Symbolicate `crash` against the given dSYMs and return the (possibly
    /// rewritten) report text.
    pub fn symbolicate(
        &self,
        crash: &Crash,
        dsyms: &[DsymFile],
    ) -> Result<String, SymbolicationError> {
        match crash.symbolicate_method {
            SymbolicateMethod::SymbolicateCrash => self.run_symbolicatecrash(crash, dsyms),
            SymbolicateMethod::Atos => Ok(self.run_atos(crash, dsyms)),
        }
    }

    fn run_symbolicatecrash(
        &self,
        crash: &Crash,
        dsyms: &[DsymFile],
    ) -> Result<String, SymbolicationError> {
        let mut staged = NamedTempFile::new()?;
        staged.write_all(crash.content.as_bytes())?;
        staged.flush()?;

        let crash_path = staged.path().to_string_lossy().into_owned();
        let dsym_paths: Vec<String> = dsyms
            .iter()
            .map(|d| d.path.to_string_lossy().into_owned())
            .collect();

        match process::symbolicatecrash(&self.runner, &self.tools, &crash_path, &dsym_paths) {
            Some(rewritten) => Ok(rewritten),
            None => {
                warn!("symbolicatecrash produced no output, keeping original report");
                Ok(crash.content.clone())
            }
        }
    }

    /// Resolve each usable image independently and splice the results back
    /// into the report. An image whose lookup fails is skipped; the rest of
    /// the report still gets its symbols.
    fn run_atos(&self, crash: &Crash, dsyms: &[DsymFile]) -> String {
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();

        let images: Vec<_> = crash.binary_images.iter().filter(|b| b.is_valid()).collect();
        for (position, image) in images.iter().enumerate() {
            let Some(dsym) = pair_dsym(dsyms, image.uuid.as_deref(), position) else {
                debug!("no dSYM for image {}", image.name);
                continue;
            };

            let mut fixed = (*image).clone();
            fixed.fix();

            let arch = fixed
                .arch
                .as_deref()
                .or(crash.arch.as_deref())
                .unwrap_or("arm64");
            // is_valid guarantees both.
            let load_address = fixed.load_address.as_deref().unwrap_or_default();
            let frames = fixed.backtrace.as_deref().unwrap_or_default();
            let addresses: Vec<String> = frames.iter().map(|f| f.address.clone()).collect();

            let binary_path = dsym.binary_path.to_string_lossy();
            let Some(symbols) = process::atos(
                &self.runner,
                &self.tools,
                arch,
                &binary_path,
                load_address,
                &addresses,
            ) else {
                continue;
            };
            if symbols.len() != addresses.len() {
                warn!(
                    "atos returned {} lines for {} addresses of {}, skipping image",
                    symbols.len(),
                    addresses.len(),
                    image.name
                );
                continue;
            }

            for (frame, symbol) in frames.iter().zip(symbols) {
                let mut resolved = frame.clone();
                resolved.symbol = Some(symbol);
                edits.push((frame.range.clone(), resolved.to_line()));
            }
        }

        apply_edits(&crash.content, edits)
    }
}

/// Pick the dSYM for an image: match by debug-id when possible, otherwise
/// fall back to pairing by position.
fn pair_dsym<'a>(
    dsyms: &'a [DsymFile],
    uuid: Option<&str>,
    position: usize,
) -> Option<&'a DsymFile> {
    if let Some(uuid) = uuid {
        if let Some(found) = dsyms.iter().find(|d| d.contains_uuid(uuid)) {
            return Some(found);
        }
    }
    dsyms.get(position)
}

/// Replace byte ranges of `content` with new text, back-to-front so earlier
/// offsets stay valid. Out-of-bounds or overlapping edits are dropped.
fn apply_edits(content: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));

    let mut output = content.to_string();
    let mut floor = content.len();
    for (range, text) in edits {
        if range.start >= range.end || range.end > floor {
            continue;
        }
        floor = range.start;
        output.replace_range(range, &text);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::process::tests::FakeRunner;
    use super::*;
    use crate::parser;
    use std::path::PathBuf;

    const REPORT: &str = "\
Process:               demo [1001]
Hardware Model:        iPhone9,1
OS Version:            iPhone OS 13.3 (17C54)

Thread 0 name:  Dispatch queue: com.apple.main-thread
Thread 0 Crashed:
0   demo                          \t0x00000001000effdc 0x1000e4000 + 49116
1   demo                          \t0x00000001000f0123 0x1000e4000 + 49443
2   libdyld.dylib                 \t0x00000001930e0360 start + 4

Binary Images:
0x1000e4000 - 0x1000ebfff demo arm64  <42fd89f730be3ac5a40a4c1a99438dfb> /var/containers/Bundle/Application/demo.app/demo
";

    fn dsym(name: &str, uuid: &str) -> DsymFile {
        DsymFile {
            name: name.to_string(),
            path: PathBuf::from(format!("/tmp/{name}.dSYM")),
            binary_path: PathBuf::from(format!(
                "/tmp/{name}.dSYM/Contents/Resources/DWARF/{name}"
            )),
            uuids: vec![uuid.to_string()],
            is_app: true,
        }
    }

    #[test]
    fn atos_splices_resolved_symbols_by_range() {
        let mut crash = parser::parse(REPORT);
        crash.symbolicate_method = SymbolicateMethod::Atos;
        assert!(crash.needs_symbolicate());

        let runner = FakeRunner::succeeding("viewDidLoad (in demo) + 100\nmain (in demo) + 40\n");
        let engine = Symbolicator::with_runner(runner);
        let out = engine
            .symbolicate(&crash, &[dsym("demo", "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB")])
            .unwrap();

        assert!(out.contains("0x00000001000effdc viewDidLoad (in demo) + 100"));
        assert!(out.contains("0x00000001000f0123 main (in demo) + 40"));
        // Untouched lines survive verbatim.
        assert!(out.contains("start + 4"));
        assert!(out.contains("Binary Images:"));
        // Old offset annotations are gone from the crashed thread.
        assert!(!out.contains("0x00000001000effdc 0x1000e4000 + 49116"));
    }

    #[test]
    fn atos_invocation_uses_dwarf_binary_and_load_address() {
        let mut crash = parser::parse(REPORT);
        crash.symbolicate_method = SymbolicateMethod::Atos;

        let runner = FakeRunner::succeeding("a\nb\n");
        let engine = Symbolicator::with_runner(runner);
        let _ = engine
            .symbolicate(&crash, &[dsym("demo", "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB")])
            .unwrap();

        let calls = engine.runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        let args = &calls[0].1;
        assert_eq!(
            args[0..6],
            [
                "-arch".to_string(),
                "arm64".to_string(),
                "-o".to_string(),
                "/tmp/demo.dSYM/Contents/Resources/DWARF/demo".to_string(),
                "-l".to_string(),
                "0x1000e4000".to_string(),
            ]
        );
        assert_eq!(args[6..], ["0x00000001000effdc", "0x00000001000f0123"]);
    }

    #[test]
    fn atos_line_count_mismatch_leaves_report_unchanged() {
        let mut crash = parser::parse(REPORT);
        crash.symbolicate_method = SymbolicateMethod::Atos;

        let runner = FakeRunner::succeeding("only one line\n");
        let engine = Symbolicator::with_runner(runner);
        let out = engine
            .symbolicate(&crash, &[dsym("demo", "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB")])
            .unwrap();
        assert_eq!(out, crash.content);
    }

    #[test]
    fn atos_without_dsym_skips_image_entirely() {
        let mut crash = parser::parse(REPORT);
        crash.symbolicate_method = SymbolicateMethod::Atos;

        let runner = FakeRunner::new(vec![]);
        let engine = Symbolicator::with_runner(runner);
        let out = engine.symbolicate(&crash, &[]).unwrap();
        assert_eq!(out, crash.content);
        assert!(engine.runner.calls.borrow().is_empty());
    }

    #[test]
    fn dsym_pairing_prefers_uuid_over_position() {
        let other = dsym("other", "EE327708-9D2B-310C-8126-3E5FBCBB3138");
        let right = dsym("demo", "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB");
        let dsyms = vec![other, right];

        let picked = pair_dsym(&dsyms, Some("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB"), 0).unwrap();
        assert_eq!(picked.name, "demo");

        // Unknown uuid falls back to position.
        let picked = pair_dsym(&dsyms, Some("00000000-0000-0000-0000-000000000000"), 1).unwrap();
        assert_eq!(picked.name, "demo");

        assert!(pair_dsym(&dsyms, None, 5).is_none());
    }

    #[test]
    fn symbolicatecrash_returns_rewritten_report() {
        let crash = parser::parse(REPORT);

        let runner = FakeRunner::succeeding("rewritten report body\n");
        let engine = Symbolicator::with_runner(runner);
        let out = engine
            .symbolicate(&crash, &[dsym("demo", "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB")])
            .unwrap();
        assert_eq!(out, "rewritten report body\n");

        // The report was staged to a file, each dSYM passed with -d.
        let calls = engine.runner.calls.borrow();
        let args = &calls[0].1;
        assert!(!args[0].is_empty());
        assert_eq!(args[1], "-d");
        assert_eq!(args[2], "/tmp/demo.dSYM");
    }

    #[test]
    fn symbolicatecrash_failure_keeps_original_content() {
        let crash = parser::parse(REPORT);

        let runner = FakeRunner::new(vec![Ok(ToolOutput {
            status: 1,
            stdout: String::new(),
            stderr: "perl not found".into(),
        })]);
        let engine = Symbolicator::with_runner(runner);
        let out = engine.symbolicate(&crash, &[]).unwrap();
        assert_eq!(out, crash.content);
    }

    #[test]
    fn apply_edits_is_back_to_front_and_bounds_checked() {
        let content = "aaa bbb ccc";
        let edits = vec![(0..3, "XXXX".to_string()), (8..11, "Y".to_string())];
        assert_eq!(apply_edits(content, edits), "XXXX bbb Y");

        // Out-of-bounds and empty ranges are dropped.
        let edits = vec![(4..200, "nope".to_string()), (2..2, "nope".to_string())];
        assert_eq!(apply_edits(content, edits), content);
    }
}
