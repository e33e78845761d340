//! External tool invocation.
//!
//! Every call into the developer-tools binaries (`atos`, `symbolicatecrash`,
//! `dwarfdump`) goes through [`CommandRunner`] so the engine can be tested
//! without the tools installed. [`SystemRunner`] is the production
//! implementation backed by [`std::process::Command`].

use std::io;
use std::process::Command;

use log::warn;

use crate::dsym::{parse_dwarfdump_output, DwarfUuid};

/// Captured result of one tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Seam for spawning external tools.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput>;
}

/// Runs tools on the host system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Locations of the developer tools.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub atos: String,
    pub symbolicatecrash: String,
    pub dwarfdump: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            atos: "/usr/bin/atos".into(),
            symbolicatecrash: "symbolicatecrash".into(),
            dwarfdump: "/usr/bin/dwarfdump".into(),
        }
    }
}

/// Resolve a batch of addresses against one loaded image.
///
/// Returns one symbol line per input address, or `None` when the tool
/// fails or produces nothing. Callers must treat a line-count mismatch
/// as a failed lookup for the whole image.
pub fn atos(
    runner: &dyn CommandRunner,
    paths: &ToolPaths,
    arch: &str,
    dsym_path: &str,
    load_address: &str,
    addresses: &[String],
) -> Option<Vec<String>> {
    if addresses.is_empty() {
        return None;
    }

    let mut args: Vec<String> = vec![
        "-arch".into(),
        arch.into(),
        "-o".into(),
        dsym_path.into(),
        "-l".into(),
        load_address.into(),
    ];
    args.extend(addresses.iter().cloned());

    let output = match runner.run(&paths.atos, &args) {
        Ok(output) => output,
        Err(e) => {
            warn!("atos failed to launch: {e}");
            return None;
        }
    };
    if !output.success() {
        warn!("atos exited with {}: {}", output.status, output.stderr.trim());
        return None;
    }

    let lines: Vec<String> = output
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines)
}

/// Rewrite a whole report through `symbolicatecrash`.
///
/// `dsym_paths` are passed as repeated `-d` options. Returns the rewritten
/// report, or `None` when the tool fails or emits nothing.
pub fn symbolicatecrash(
    runner: &dyn CommandRunner,
    paths: &ToolPaths,
    crash_path: &str,
    dsym_paths: &[String],
) -> Option<String> {
    let mut args: Vec<String> = Vec::with_capacity(1 + dsym_paths.len() * 2);
    args.push(crash_path.into());
    for dsym in dsym_paths {
        args.push("-d".into());
        args.push(dsym.clone());
    }

    let output = match runner.run(&paths.symbolicatecrash, &args) {
        Ok(output) => output,
        Err(e) => {
            warn!("symbolicatecrash failed to launch: {e}");
            return None;
        }
    };
    if !output.success() {
        warn!(
            "symbolicatecrash exited with {}: {}",
            output.status,
            output.stderr.trim()
        );
        return None;
    }
    if output.stdout.trim().is_empty() {
        return None;
    }
    Some(output.stdout)
}

/// List the UUIDs recorded in a dSYM bundle or Mach-O file.
pub fn dwarfdump_uuids(
    runner: &dyn CommandRunner,
    paths: &ToolPaths,
    path: &str,
) -> Vec<DwarfUuid> {
    let args = vec!["--uuid".to_string(), path.to_string()];
    match runner.run(&paths.dwarfdump, &args) {
        Ok(output) if output.success() => parse_dwarfdump_output(&output.stdout),
        Ok(output) => {
            warn!("dwarfdump exited with {}", output.status);
            Vec::new()
        }
        Err(e) => {
            warn!("dwarfdump failed to launch: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Scripted runner recording every invocation.
    pub(crate) struct FakeRunner {
        pub calls: RefCell<Vec<(String, Vec<String>)>>,
        pub responses: RefCell<Vec<io::Result<ToolOutput>>>,
    }

    impl FakeRunner {
        pub fn new(responses: Vec<io::Result<ToolOutput>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                calls: RefCell::new(Vec::new()),
                responses: RefCell::new(responses),
            }
        }

        pub fn succeeding(stdout: &str) -> Self {
            Self::new(vec![Ok(ToolOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })])
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(io::Error::other("no scripted response")))
        }
    }

    #[test]
    fn atos_builds_expected_arguments() {
        let runner = FakeRunner::succeeding("main (in demo) + 880\n");
        let paths = ToolPaths::default();
        let out = atos(
            &runner,
            &paths,
            "arm64",
            "/tmp/demo.dSYM/Contents/Resources/DWARF/demo",
            "0x100070000",
            &["0x1000effdc".to_string()],
        )
        .unwrap();
        assert_eq!(out, vec!["main (in demo) + 880"]);

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].0, "/usr/bin/atos");
        assert_eq!(
            calls[0].1,
            vec![
                "-arch",
                "arm64",
                "-o",
                "/tmp/demo.dSYM/Contents/Resources/DWARF/demo",
                "-l",
                "0x100070000",
                "0x1000effdc",
            ]
        );
    }

    #[test]
    fn atos_rejects_failure_and_empty_output() {
        let runner = FakeRunner::new(vec![Ok(ToolOutput {
            status: 1,
            stdout: String::new(),
            stderr: "cannot load symbols".into(),
        })]);
        let paths = ToolPaths::default();
        assert!(atos(&runner, &paths, "arm64", "d", "0x0", &["0x1".into()]).is_none());

        let runner = FakeRunner::succeeding("\n  \n");
        assert!(atos(&runner, &paths, "arm64", "d", "0x0", &["0x1".into()]).is_none());

        // No addresses means no invocation at all.
        let runner = FakeRunner::new(vec![]);
        assert!(atos(&runner, &paths, "arm64", "d", "0x0", &[]).is_none());
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn symbolicatecrash_passes_each_dsym() {
        let runner = FakeRunner::succeeding("rewritten report\n");
        let paths = ToolPaths::default();
        let out = symbolicatecrash(
            &runner,
            &paths,
            "/tmp/crash.crash",
            &["/a.dSYM".to_string(), "/b.dSYM".to_string()],
        )
        .unwrap();
        assert_eq!(out, "rewritten report\n");

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].1,
            vec!["/tmp/crash.crash", "-d", "/a.dSYM", "-d", "/b.dSYM"]
        );
    }

    #[test]
    fn symbolicatecrash_empty_stdout_is_failure() {
        let runner = FakeRunner::succeeding("   \n");
        let paths = ToolPaths::default();
        assert!(symbolicatecrash(&runner, &paths, "/tmp/c", &[]).is_none());
    }

    #[test]
    fn dwarfdump_parses_uuid_listing() {
        let runner = FakeRunner::succeeding(
            "UUID: 42FD89F7-30BE-3AC5-A40A-4C1A99438DFB (arm64) /tmp/demo.dSYM/Contents/Resources/DWARF/demo\n",
        );
        let paths = ToolPaths::default();
        let uuids = dwarfdump_uuids(&runner, &paths, "/tmp/demo.dSYM");
        assert_eq!(uuids.len(), 1);
        assert_eq!(uuids[0].uuid, "42FD89F7-30BE-3AC5-A40A-4C1A99438DFB");
        assert_eq!(uuids[0].arch.as_deref(), Some("arm64"));
    }
}
