//! Parser for Fabric/Crashlytics plaintext stacktraces.
//!
//! Header metadata lives in `# `-prefixed comment lines; the backtrace and
//! any image lines use the Apple syntax, so the shared skeleton applies.
//! These downloads frequently omit the process line and the binary image
//! table, in which case the corresponding fields just stay unset.

use super::{
    all_images, backtrace_ranges, capture_field, crashed_thread_range, frames_for_binary,
    ParserKind,
};
use crate::pattern;
use crate::report::{uuid_format, Crash, SymbolicateMethod};

pub(crate) fn parse(content: &str) -> Crash {
    let mut crash = Crash::new(content);
    crash.brand = ParserKind::Fabric;
    crash.symbolicate_method = SymbolicateMethod::SymbolicateCrash;

    crash.device = capture_field(&pattern::FABRIC_DEVICE, content);
    crash.os_version = capture_field(&pattern::FABRIC_OS_VERSION, content);
    crash.app_version = capture_field(&pattern::FABRIC_VERSION, content);
    crash.bundle_id = capture_field(&pattern::FABRIC_BUNDLE_ID, content);
    // Some exports still carry an Apple-style process line.
    crash.app_name = capture_field(&pattern::PROCESS, content);

    if let Some(name) = crash.app_name.clone() {
        if let Some(caps) = pattern::image_for(&name).captures(content) {
            crash.uuid = Some(uuid_format(&caps[4]));
            crash.arch = Some(caps[3].to_string());
        }
    }

    crash.binary_images = all_images(content, crash.app_name.as_deref());

    if let Some(name) = crash.app_name.clone() {
        let frames = frames_for_binary(content, &name);
        if !frames.is_empty() {
            if let Some(binary) = crash.binary_image_mut() {
                binary.backtrace = Some(frames);
            }
        }
    }

    crash.crashed_thread_range = crashed_thread_range(content);

    let names: Vec<String> = crash.binary_images.iter().map(|b| b.name.clone()).collect();
    crash.app_backtrace_ranges = backtrace_ranges(content, &names);

    crash
}
