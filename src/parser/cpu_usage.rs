//! Parser for CPU-usage / power ("Powerstats") reports.
//!
//! Same skeleton as the Apple parser, with three differences: the frame
//! syntax puts the address in a trailing bracket, the image line drops the
//! arch column and may append a version suffix to the name, and the app's
//! own image is identified by exact `Path:` match rather than by name,
//! because the name column can collide with unrelated system binaries.

use super::{capture_field, ParserKind};
use crate::pattern;
use crate::report::{uuid_format, Binary, Crash, Frame, SymbolicateMethod};

pub(crate) fn parse(content: &str) -> Crash {
    let mut crash = Crash::new(content);
    crash.brand = ParserKind::CpuUsage;
    crash.symbolicate_method = SymbolicateMethod::SymbolicateCrash;

    crash.app_name = capture_field(&pattern::POWERSTATS, content);
    crash.device = capture_field(&pattern::HARDWARE, content);
    crash.os_version = capture_field(&pattern::OS_VERSION, content);
    crash.arch = capture_field(&pattern::ARCHITECTURE, content);
    crash.app_version = app_version(content);

    let app_path = capture_field(&pattern::PATH, content);

    crash.binary_images = pattern::CPU_IMAGE
        .captures_iter(content)
        .map(|caps| {
            let name = caps[2].to_string();
            let path = caps[4].to_string();
            let executable = match &app_path {
                Some(p) => *p == path,
                None => Some(name.as_str()) == crash.app_name.as_deref(),
            };
            Binary {
                uuid: Some(uuid_format(&caps[3])),
                arch: executable.then(|| crash.arch.clone()).flatten(),
                load_address: Some(caps[1].to_string()),
                path: Some(path),
                backtrace: None,
                executable,
                name,
            }
        })
        .collect();

    let app_uuid = crash.binary_image().and_then(|b| b.uuid.clone());
    crash.uuid = app_uuid;

    if let Some(name) = crash.app_name.clone() {
        let frames = frames_for(content, &name);
        if !frames.is_empty() {
            if let Some(binary) = crash.binary_image_mut() {
                binary.backtrace = Some(frames);
            }
        }
    }

    let names: Vec<String> = crash.binary_images.iter().map(|b| b.name.clone()).collect();
    for name in super::unique_names(&names) {
        let re = pattern::cpu_frame_for(&name);
        crash
            .app_backtrace_ranges
            .extend(re.find_iter(content).map(|m| m.range()));
    }

    crash
}

/// `App version:` and `Build version:` when present, else the generic
/// `Version:` tag.
fn app_version(content: &str) -> Option<String> {
    let app = capture_field(&pattern::APP_VERSION, content);
    let build = capture_field(&pattern::BUILD_VERSION, content);
    match (app, build) {
        (Some(app), Some(build)) => Some(format!("{app} ({build})")),
        (Some(app), None) => Some(app),
        (None, _) => capture_field(&pattern::VERSION, content),
    }
}

/// Frames attributed to `binary` in the bracketed-address syntax.
fn frames_for(content: &str, binary: &str) -> Vec<Frame> {
    let re = pattern::cpu_frame_for(binary);
    re.captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            let description = caps[2].trim();
            Frame {
                raw: whole.as_str().to_string(),
                index: caps[1].to_string(),
                image: caps[3].to_string(),
                address: caps[5].to_string(),
                symbol: (description != "???").then(|| description.to_string()),
                range: whole.range(),
            }
        })
        .collect()
}
