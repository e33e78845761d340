//! Parser for Umeng crash reports.
//!
//! Structurally unlike the other dialects: there is no binary image table.
//! The single (app) binary's identity is spread over independent one-value
//! tags, and the load address arrives as a `Slide Address:` tag. The real
//! installation path is never present, so a synthetic bundle path is
//! recorded instead.

use super::{capture_field, frames_for_binary, ParserKind};
use crate::pattern;
use crate::report::{uuid_format, Binary, Crash, SymbolicateMethod};

pub(crate) fn parse(content: &str) -> Crash {
    let mut crash = Crash::new(content);
    crash.brand = ParserKind::Umeng;
    crash.symbolicate_method = SymbolicateMethod::Atos;

    crash.app_name = capture_field(&pattern::UMENG_BINARY, content);
    crash.arch = capture_field(&pattern::UMENG_CPU_TYPE, content);
    crash.uuid = capture_field(&pattern::UMENG_UUID, content).map(|u| uuid_format(&u));

    let load_address = capture_field(&pattern::UMENG_SLIDE, content);

    if let Some(name) = crash.app_name.clone() {
        let frames = frames_for_binary(content, &name);
        crash.app_backtrace_ranges = frames.iter().map(|f| f.range.clone()).collect();

        let mut binary = Binary::new(name.clone());
        binary.executable = true;
        binary.uuid.clone_from(&crash.uuid);
        binary.arch.clone_from(&crash.arch);
        binary.load_address = load_address;
        binary.path = Some(format!("/var/containers/Bundle/Application/{name}"));
        binary.backtrace = (!frames.is_empty()).then_some(frames);
        crash.binary_images.push(binary);
    }

    crash
}

#[cfg(test)]
mod tests {
    use super::*;

    const UMENG_DEMO: &str = "\
Application received signal SIGSEGV
(null)
(
0   CoreFoundation                      0x0000000181f1a0b0 <redacted> + 148
1   libobjc.A.dylib                     0x00000001969c423c objc_exception_throw + 56
2   CoreFoundation                      0x0000000181f19f80 <redacted> + 0
3   DemoApp                             0x100b32844 UmengSignalHandler (in DemoApp) + 128
4   DemoApp                             0x100b2f764 main (in DemoApp) + 880
)
dSYM UUID: E5B0A378-6816-3D90-86FD-2AEF15894A85
CPU Type: arm64
Slide Address: 0x0000000100000000
Binary Image: DemoApp
Base Address: 0x100a80000
";

    #[test]
    fn derives_the_single_binary_from_tags() {
        let crash = parse(UMENG_DEMO);
        assert_eq!(crash.app_name.as_deref(), Some("DemoApp"));
        assert_eq!(crash.arch.as_deref(), Some("arm64"));
        assert_eq!(crash.device, None);
        // Already dashed; passes through without reformatting.
        assert_eq!(crash.uuid.as_deref(), Some("E5B0A378-6816-3D90-86FD-2AEF15894A85"));

        assert_eq!(crash.binary_images.len(), 1);
        let binary = &crash.binary_images[0];
        assert_eq!(binary.name, "DemoApp");
        assert!(binary.executable);
        assert_eq!(binary.load_address.as_deref(), Some("0x0000000100000000"));
        assert_eq!(
            binary.path.as_deref(),
            Some("/var/containers/Bundle/Application/DemoApp")
        );
    }

    #[test]
    fn extracts_only_the_app_binary_frames() {
        let crash = parse(UMENG_DEMO);
        let frames = crash.binary_images[0].backtrace.as_ref().unwrap();
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].index, "3");
        assert_eq!(frames[0].image, "DemoApp");
        assert_eq!(frames[0].address, "0x100b32844");
        assert_eq!(
            frames[0].symbol.as_deref(),
            Some("UmengSignalHandler (in DemoApp) + 128")
        );

        assert_eq!(crash.app_backtrace_ranges.len(), 2);
    }

    #[test]
    fn has_no_canonical_form() {
        let crash = parse(UMENG_DEMO);
        assert_eq!(crash.symbolicate_method, SymbolicateMethod::Atos);
        assert!(crash.to_standard().is_none());
    }
}
