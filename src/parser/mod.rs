//! Crash report dialect detection and parser dispatch.
//!
//! Raw report text comes in several incompatible vendor formats. The
//! detector classifies the text by its dialect signature and hands it to the
//! matching parser; JSON inputs are first converted to canonical Apple
//! plaintext by the convertors. Parsing never fails: a field whose pattern
//! does not match is simply left unset, since truncated and malformed
//! reports are the norm, and partial information beats an error.

mod apple;
mod cpu_usage;
mod fabric;
mod umeng;

use std::ops::Range;

use log::debug;

use crate::convertor;
use crate::pattern;
use crate::report::{uuid_format, Binary, Crash, Frame};

/// The supported plaintext report dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ParserKind {
    /// Apple-style plaintext report; the fallback for anything unrecognized.
    #[default]
    Apple,
    /// CPU-usage / power ("Powerstats") report.
    CpuUsage,
    /// Fabric/Crashlytics plaintext stacktrace.
    Fabric,
    /// Umeng crash report.
    Umeng,
}

impl ParserKind {
    /// Classify report text by its dialect signature.
    ///
    /// Checked in strict priority order because the signatures are not
    /// mutually exclusive; first match wins, and Apple matches anything.
    pub fn detect(content: &str) -> ParserKind {
        if content.contains("dSYM UUID") && content.contains("Slide Address") {
            ParserKind::Umeng
        } else if (content.contains("Wakeups limit") || content.contains("CPU limit"))
            && content.contains("Limit duration:")
        {
            ParserKind::CpuUsage
        } else if content.contains("# Crashlytics - plaintext stacktrace") {
            ParserKind::Fabric
        } else {
            ParserKind::Apple
        }
    }
}

/// Parse raw report text into a [`Crash`].
///
/// JSON inputs are converted to Apple plaintext first; the detector then
/// picks the dialect parser. Never fails.
pub fn parse(content: &str) -> Crash {
    let content = convertor::preprocess(content);
    let kind = ParserKind::detect(&content);
    debug!("detected dialect {:?}", kind);
    match kind {
        ParserKind::Apple => apple::parse(&content),
        ParserKind::CpuUsage => cpu_usage::parse(&content),
        ParserKind::Fabric => fabric::parse(&content),
        ParserKind::Umeng => umeng::parse(&content),
    }
}

/// First capture group of `re`, trimmed, or `None` when the pattern misses.
fn capture_field(re: &regex::Regex, content: &str) -> Option<String> {
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// All frame lines attributed to `binary`, in order of appearance.
fn frames_for_binary(content: &str, binary: &str) -> Vec<Frame> {
    let re = pattern::frame_for(binary);
    re.captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            let symbol = caps[4].trim();
            Frame {
                raw: whole.as_str().to_string(),
                index: caps[1].to_string(),
                image: caps[2].to_string(),
                address: caps[3].to_string(),
                symbol: (!symbol.is_empty()).then(|| symbol.to_string()),
                range: whole.range(),
            }
        })
        .collect()
}

/// Every binary image line in the report, in order of appearance.
///
/// The image whose name equals `app_name` is tagged executable.
fn all_images(content: &str, app_name: Option<&str>) -> Vec<Binary> {
    pattern::IMAGE
        .captures_iter(content)
        .map(|caps| {
            let name = caps[2].to_string();
            let path = caps[5].trim();
            Binary {
                executable: Some(name.as_str()) == app_name,
                uuid: Some(uuid_format(&caps[4])),
                arch: Some(caps[3].to_string()),
                load_address: Some(caps[1].to_string()),
                path: (!path.is_empty()).then(|| path.to_string()),
                backtrace: None,
                name,
            }
        })
        .collect()
}

/// Byte range of the `Thread N Crashed:` header and its contiguous frames.
fn crashed_thread_range(content: &str) -> Option<Range<usize>> {
    pattern::CRASHED_THREAD.find(content).map(|m| m.range())
}

/// Byte ranges of all frame lines belonging to any of the given binaries.
///
/// Every known image's frames are collected, not just the crashing
/// binary's, so the caller can highlight multi-binary backtraces. Duplicate
/// names are searched once.
fn backtrace_ranges(content: &str, binaries: &[String]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    for name in unique_names(binaries) {
        let re = pattern::frame_for(&name);
        ranges.extend(re.find_iter(content).map(|m| m.range()));
    }
    ranges
}

fn unique_names(names: &[String]) -> Vec<String> {
    let mut unique = names.to_vec();
    unique.sort();
    unique.dedup();
    unique
}
