//! Parser for Apple-style plaintext crash reports.
//!
//! This is the canonical dialect: the convertors emit it, the other
//! plaintext dialects are variations on it, and it is the fallback when no
//! other signature matches.

use super::{
    all_images, backtrace_ranges, capture_field, crashed_thread_range, frames_for_binary,
    ParserKind,
};
use crate::pattern;
use crate::report::{uuid_format, Crash, SymbolicateMethod};

pub(crate) fn parse(content: &str) -> Crash {
    let mut crash = Crash::new(content);
    crash.brand = ParserKind::Apple;
    crash.symbolicate_method = SymbolicateMethod::SymbolicateCrash;

    // Independent single-pattern searches; one miss never blocks another.
    crash.app_name = capture_field(&pattern::PROCESS, content);
    crash.bundle_id = capture_field(&pattern::IDENTIFIER, content);
    crash.device = capture_field(&pattern::HARDWARE, content);
    crash.os_version = capture_field(&pattern::OS_VERSION, content);
    crash.app_version = capture_field(&pattern::VERSION, content);

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

#[cfg(test)]
mod tests {
    use super::*;

    // 18 frames attributed to `demo`, split across two threads.
    const APPLE_DEMO: &str = "\
Incident Identifier: B8B43E1C-DEMO-DEMO-DEMO-E383B2D4EFC6
CrashReporter Key:   7b9ab7a0316d3169ab49e1c6e3b32ada72b8f494
Hardware Model:      iPhone5,2
Process:             demo [1111]
Path:                /var/containers/Bundle/Application/1F9S/demo.app/demo
Identifier:          im.zorro.demo
Version:             521 (5.7.8)
Code Type:           ARM-64
OS Version:          iPhone OS 11.4 (15F79)

Exception Type:  EXC_CRASH (SIGABRT)
Exception Codes: 0x0000000000000000, 0x0000000000000000
Triggered by Thread:  0

Thread 0 name:  Dispatch queue: com.apple.main-thread
Thread 0 Crashed:
0   demo                          0x00000001000effdc 0x100070000 + 524252
1   demo                          0x00000001000effa0 0x100070000 + 524192
2   demo                          0x00000001000eff64 0x100070000 + 524132
3   demo                          0x00000001000eff28 0x100070000 + 524072
4   demo                          0x00000001000efeec 0x100070000 + 524012
5   demo                          0x00000001000efeb0 0x100070000 + 523952
6   demo                          0x00000001000efe74 0x100070000 + 523892
7   demo                          0x00000001000efe38 0x100070000 + 523832
8   demo                          0x00000001000efdfc 0x100070000 + 523772
9   libsystem_m.dylib             0x000000019a8d9000 cos + 16

Thread 1:
0   demo                          0x00000001000efdc0 0x100070000 + 523712
1   demo                          0x00000001000efd84 0x100070000 + 523652
2   demo                          0x00000001000efd48 0x100070000 + 523592
3   demo                          0x00000001000efd0c 0x100070000 + 523532
4   demo                          0x00000001000efcd0 0x100070000 + 523472
5   demo                          0x00000001000efc94 0x100070000 + 523412
6   demo                          0x00000001000efc58 0x100070000 + 523352
7   demo                          0x00000001000efc1c 0x100070000 + 523292
8   demo                          0x00000001000efbe0 0x100070000 + 523232

Binary Images:
0x100070000 - 0x1001effff demo arm64  <42fd89f730be3ac5a40a4c1a99438dfb> /var/containers/Bundle/Application/1F9S/demo.app/demo
0x19a8d8000 - 0x19a8f4fff libsystem_m.dylib arm64  <ee3277089d2b310c81263e5fbcbb3138> /usr/lib/system/libsystem_m.dylib
";

    #[test]
    fn parses_header_fields() {
        let crash = parse(APPLE_DEMO);
        assert_eq!(crash.app_name.as_deref(), Some("demo"));
        assert_eq!(crash.bundle_id.as_deref(), Some("im.zorro.demo"));
        assert_eq!(crash.device.as_deref(), Some("iPhone5,2"));
        assert_eq!(crash.os_version.as_deref(), Some("iPhone OS 11.4 (15F79)"));
        assert_eq!(crash.app_version.as_deref(), Some("521 (5.7.8)"));
        assert_eq!(crash.symbolicate_method, SymbolicateMethod::SymbolicateCrash);
    }

    #[test]
    fn recovers_the_app_binary() {
        let crash = parse(APPLE_DEMO);
        assert_eq!(crash.arch.as_deref(), Some("arm64"));
        assert_eq!(crash.uuid.as_deref(), Some("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB"));

        let binary = crash.binary_image().expect("app binary");
        assert_eq!(binary.name, "demo");
        assert!(binary.executable);
        assert_eq!(binary.arch.as_deref(), Some("arm64"));
        assert_eq!(binary.uuid.as_deref(), Some("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB"));
        assert_eq!(binary.load_address.as_deref(), Some("0x100070000"));
        assert_eq!(binary.backtrace.as_ref().map(Vec::len), Some(18));
    }

    #[test]
    fn collects_every_image() {
        let crash = parse(APPLE_DEMO);
        assert_eq!(crash.binary_images.len(), 2);
        assert_eq!(crash.binary_images[0].name, "demo");
        assert_eq!(crash.binary_images[1].name, "libsystem_m.dylib");
        assert!(!crash.binary_images[1].executable);
        assert!(crash.binary_images[1].backtrace.is_none());

        let embedded = crash.embedded_binaries();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].name, "demo");
    }

    #[test]
    fn records_highlight_ranges() {
        let crash = parse(APPLE_DEMO);

        let range = crash.crashed_thread_range.clone().expect("crashed thread");
        let block = &APPLE_DEMO[range];
        assert!(block.starts_with("Thread 0 Crashed:"));
        assert!(block.contains("cos + 16"));
        assert!(!block.contains("Thread 1"));

        // 18 demo frames plus the libsystem_m.dylib one: every known
        // image's frames are highlighted, not just the app's.
        assert_eq!(crash.app_backtrace_ranges.len(), 19);
        for range in &crash.app_backtrace_ranges {
            let line = &APPLE_DEMO[range.clone()];
            assert!(pattern::FRAME.is_match(line), "not a frame line: {line}");
        }
    }

    #[test]
    fn frames_keep_original_text() {
        let crash = parse(APPLE_DEMO);
        let frames = crash.binary_image().unwrap().backtrace.as_ref().unwrap();
        assert_eq!(frames[0].index, "0");
        assert_eq!(frames[0].image, "demo");
        assert_eq!(frames[0].address, "0x00000001000effdc");
        assert_eq!(frames[0].symbol.as_deref(), Some("0x100070000 + 524252"));
        assert_eq!(&APPLE_DEMO[frames[0].range.clone()], frames[0].raw);
    }

    #[test]
    fn truncated_reports_parse_partially() {
        let crash = parse("Process: demo [1]\nIdentifier: im.zorro.demo\n");
        assert_eq!(crash.app_name.as_deref(), Some("demo"));
        assert!(crash.uuid.is_none());
        assert!(crash.binary_images.is_empty());
        assert!(crash.crashed_thread_range.is_none());
    }
}
