//! Compiled text patterns for the supported crash report dialects.
//!
//! Every dialect the parsers understand is driven by the patterns in this
//! module. They are compiled once into statics; the frame and image patterns
//! also exist in a parameterized form that interpolates a binary name, since
//! the app name is only known mid-parse.

use std::sync::LazyLock;

use regex::Regex;

/// A numbered backtrace frame line.
///
/// `0   BinaryName   0x00000001000effdc 0x1000e4000 + 49116`
///
/// Captures: index, image name, address, trailing symbol description.
pub static FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\d{1,3})\s+(\S+)\s+(0[xX][0-9a-fA-F]+)\s+(.*?)\s*$").unwrap()
});

/// A binary image line.
///
/// `0x19a8d8000 - 0x19a8f4fff libsystem_m.dylib arm64  <ee3277089d2b310c81263e5fbcbb3138> /usr/lib/system/libsystem_m.dylib`
///
/// Captures: load address, name, arch, debug-id (32 hex chars, no dashes),
/// path. The name may carry a leading `+` marker on some reports.
pub static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(0[xX][0-9a-fA-F]+)\s*-\s*0[xX][0-9a-fA-F]+\s+\+?(\S+)\s+(\w+)\s+<([0-9a-fA-F]{32})>\s*(\S*)",
    )
    .unwrap()
});

/// A thread section header: `Thread 0 Crashed:` or `Thread 0:`.
pub static THREAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Thread\s+(\d+)\s*(Crashed)?:\s*$").unwrap());

/// A thread name line: `Thread 0 name:  com.apple.main-thread`.
pub static THREAD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Thread\s+(\d+)\s+name:\s*(.*?)\s*$").unwrap());

/// The crashed thread header plus its contiguous run of frame lines.
pub static CRASHED_THREAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^Thread\s+\d+\s+Crashed:[^\n]*\n(?:\s*\d{1,3}\s+\S+\s+0[xX][0-9a-fA-F]+[^\n]*\n?)+",
    )
    .unwrap()
});

/// `Process: demo [1111]`. The bracketed pid is optional, some
/// projections drop it.
pub static PROCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Process:\s*([^\s\[]+)").unwrap());

/// `Identifier: im.zorro.demo`
pub static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Identifier:\s*(\S+)").unwrap());

/// `Hardware Model: iPhone5,2`
pub static HARDWARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Hardware Model:\s*(\S+)").unwrap());

/// `OS Version: iPhone OS 11.4 (15F79)`
pub static OS_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^OS Version:\s*(.+?)\s*$").unwrap());

/// `Version: 521 (5.7.8)`
pub static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Version:\s*(.+?)\s*$").unwrap());

/// A dashed debug-id literal, case-insensitive.
///
/// `E5B0A378-6816-3D90-86FD-2AEF15894A85`
pub static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

// CPU-usage / power report dialect.

/// `Powerstats for:  demo`
pub static POWERSTATS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Powerstats for:\s*(\S+)").unwrap());

/// `Architecture:     arm64`
pub static ARCHITECTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Architecture:\s*(\S+)").unwrap());

/// `App version:      5.7.8`
pub static APP_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^App version:\s*(.+?)\s*$").unwrap());

/// `Build version:    521`
pub static BUILD_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Build version:\s*(.+?)\s*$").unwrap());

/// `Path: /private/var/containers/Bundle/Application/xxx/demo.app/demo`
pub static PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Path:\s*(\S+)").unwrap());

/// A CPU-usage report frame line; the address sits in a trailing bracket.
///
/// `2   -[NSRunLoop run] + 87 (Foundation + 512424) [0x182f721a8]`
///
/// Captures: index, symbol description, image name, decimal offset, address.
pub static CPU_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\d+)\s+(.+?)\s+\((\S+)\s+\+\s+(\d+)\)\s+\[(0[xX][0-9a-fA-F]+)\]")
        .unwrap()
});

/// A CPU-usage report image line; no arch column, and the binary name may
/// carry a parenthesized version suffix.
///
/// `0x100e68000 - 0x100ef3fff demo (1.0 - 1) <42fd89f730be3ac5a40a4c1a99438dfb> /path/to/demo`
///
/// Captures: load address, name, debug-id, path.
pub static CPU_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(0[xX][0-9a-fA-F]+)\s*-\s*(?:0[xX][0-9a-fA-F]+|\?+)\s+(\S+)(?:\s+\([^)]*\))?\s+<([0-9a-fA-F]{32})>\s+(\S+)",
    )
    .unwrap()
});

// Fabric / Crashlytics dialect.

/// `# Device: iPhone 5c`
pub static FABRIC_DEVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# Device:\s*(.+?)\s*$").unwrap());

/// `# Version: 5.7.8 (521)`
pub static FABRIC_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# Version:\s*(.+?)\s*$").unwrap());

/// `# Platform: ios`
pub static FABRIC_PLATFORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# Platform:\s*(.+?)\s*$").unwrap());

/// `# OS Version: 11.4.0`
pub static FABRIC_OS_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# OS Version:\s*(.+?)\s*$").unwrap());

/// `# Bundle Identifier: im.zorro.demo`
pub static FABRIC_BUNDLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^# Bundle Identifier:\s*(\S+)").unwrap());

// Umeng dialect.

/// `Binary Image: demo`
pub static UMENG_BINARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Binary Image:\s*(\S+)").unwrap());

/// `dSYM UUID: E5B0A378-6816-3D90-86FD-2AEF15894A85`
pub static UMENG_UUID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^dSYM UUID:\s*(\S+)").unwrap());

/// `Slide Address: 0x0000000100000000`
pub static UMENG_SLIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Slide Address:\s*(\S+)").unwrap());

/// `CPU Type: arm64`
pub static UMENG_CPU_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^CPU Type:\s*(\S+)").unwrap());

/// Frame pattern restricted to a single binary name.
///
/// The name is escaped, so binaries with regex metacharacters in their
/// names (`libc++.dylib`) match literally.
pub fn frame_for(binary: &str) -> Regex {
    let escaped = regex::escape(binary);
    Regex::new(&format!(
        r"(?m)^\s*(\d{{1,3}})\s+({escaped})\s+(0[xX][0-9a-fA-F]+)\s+(.*?)\s*$"
    ))
    .unwrap()
}

/// Image pattern restricted to a single binary name.
pub fn image_for(binary: &str) -> Regex {
    let escaped = regex::escape(binary);
    Regex::new(&format!(
        r"(?m)^\s*(0[xX][0-9a-fA-F]+)\s*-\s*0[xX][0-9a-fA-F]+\s+\+?({escaped})\s+(\w+)\s+<([0-9a-fA-F]{{32}})>\s*(\S*)"
    ))
    .unwrap()
}

/// CPU-usage frame pattern restricted to a single binary name.
pub fn cpu_frame_for(binary: &str) -> Regex {
    let escaped = regex::escape(binary);
    Regex::new(&format!(
        r"(?m)^\s*(\d+)\s+(.+?)\s+\(({escaped})\s+\+\s+(\d+)\)\s+\[(0[xX][0-9a-fA-F]+)\]"
    ))
    .unwrap()
}
