//! The normalized in-memory representation of a parsed crash report.
//!
//! A [`Crash`] holds the report text plus everything the parsers managed to
//! extract from it: scalar header fields, the list of loaded binary images,
//! and byte ranges used for highlighting. All fields are best-effort; a
//! pattern that does not match simply leaves its field `None`.

use std::ops::Range;

use serde::Serialize;

use crate::parser::ParserKind;

/// Parse a `0x`-prefixed hex literal. Returns `None` for malformed input.
pub fn hex_to_u64(s: &str) -> Option<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).ok()
}

/// Canonicalize a raw 32-hex-char debug-id into dashed uppercase form.
///
/// Dashes are inserted at offsets 8, 12, 16 and 20, then the whole string is
/// uppercased: `42fd89f730be3ac5a40a4c1a99438dfb` becomes
/// `42FD89F7-30BE-3AC5-A40A-4C1A99438DFB`. Anything that is not a raw
/// 32-character hex token is returned unchanged, so already-dashed ids pass
/// through as-is.
pub fn uuid_format(s: &str) -> String {
    if s.len() != 32 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return s.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &s[0..8],
        &s[8..12],
        &s[12..16],
        &s[16..20],
        &s[20..32]
    )
    .to_uppercase()
}

/// Which external strategy [`Crash::symbolicate`] should use.
///
/// [`Crash::symbolicate`]: crate::symbolication::Symbolicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SymbolicateMethod {
    /// Full-report rewrite through the external `symbolicatecrash` script.
    #[default]
    SymbolicateCrash,
    /// Per-address lookup through `atos`.
    Atos,
}

/// One stack-trace line, kept verbatim alongside its parsed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// The exact original text of the line.
    pub raw: String,
    /// Frame number as it appeared; not guaranteed numeric across dialects.
    pub index: String,
    /// Owning binary image name.
    pub image: String,
    /// `0x`-prefixed hex address, original casing and padding preserved.
    pub address: String,
    /// Resolved symbol, or an unresolved annotation like `0x1000e4000 + 49116`.
    pub symbol: Option<String>,
    /// Byte span of the line within the report content.
    pub range: Range<usize>,
}

impl Frame {
    /// Render the frame as an Apple-format report line with the columns
    /// `symbolicatecrash` and the Apple parsers expect.
    pub fn to_line(&self) -> String {
        format!(
            "{:<4}{:<39}{} {}",
            self.index,
            self.image,
            self.address,
            self.symbol.as_deref().unwrap_or("")
        )
    }
}

/// One loaded executable or library mentioned in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binary {
    pub name: String,
    /// Canonical dashed-uppercase debug-id, when the report carried one.
    pub uuid: Option<String>,
    pub arch: Option<String>,
    /// Load address as a hex string, original formatting preserved.
    pub load_address: Option<String>,
    pub path: Option<String>,
    /// True iff this image is the app's own binary.
    pub executable: bool,
    /// Frames attributed to this image, for the images the parser extracted
    /// frames for (typically just the app binary).
    pub backtrace: Option<Vec<Frame>>,
}

impl Binary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            arch: None,
            load_address: None,
            path: None,
            executable: false,
            backtrace: None,
        }
    }

    /// An image is usable for per-address symbolication once it has a load
    /// address and at least one extracted frame.
    pub fn is_valid(&self) -> bool {
        self.load_address.is_some() && self.backtrace.as_ref().is_some_and(|bt| !bt.is_empty())
    }

    /// True for images installed inside the app bundle, as opposed to system
    /// libraries.
    pub fn is_embedded(&self) -> bool {
        self.executable
            || self
                .path
                .as_deref()
                .is_some_and(|p| p.contains("/var/containers/Bundle/"))
    }
}

/// One parsed crash report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Crash {
    /// Original or canonical report text. Omitted from serialized output,
    /// which is meant for summaries, not round-tripping.
    #[serde(skip)]
    pub content: String,
    /// Dialect the report was parsed as.
    pub brand: ParserKind,
    pub app_name: Option<String>,
    pub bundle_id: Option<String>,
    pub device: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub arch: Option<String>,
    /// Debug-id of the primary binary, dashed uppercase.
    pub uuid: Option<String>,
    /// All binary images, in order of appearance.
    pub binary_images: Vec<Binary>,
    /// Byte span of the `Thread N Crashed:` block, for highlighting.
    pub crashed_thread_range: Option<Range<usize>>,
    /// Byte spans of every frame line attributed to a known image, across
    /// all threads and all images.
    pub app_backtrace_ranges: Vec<Range<usize>>,
    /// Strategy the symbolication engine should use for this report.
    pub symbolicate_method: SymbolicateMethod,
}

impl Crash {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// The app's own binary image, when one was identified.
    pub fn binary_image(&self) -> Option<&Binary> {
        self.binary_images.iter().find(|b| b.executable)
    }

    pub fn binary_image_mut(&mut self) -> Option<&mut Binary> {
        self.binary_images.iter_mut().find(|b| b.executable)
    }

    /// Images shipped inside the app bundle (the app binary plus embedded
    /// frameworks), as opposed to system libraries.
    pub fn embedded_binaries(&self) -> Vec<&Binary> {
        self.binary_images.iter().filter(|b| b.is_embedded()).collect()
    }

    /// Whether any extracted frame still lacks a resolved symbol.
    pub fn needs_symbolicate(&self) -> bool {
        self.binary_images
            .iter()
            .filter_map(|b| b.backtrace.as_ref())
            .flatten()
            .any(|f| match &f.symbol {
                None => true,
                Some(s) => s.starts_with("0x") || s.starts_with('+'),
            })
    }

    /// The canonical Apple-format projection of this report.
    ///
    /// Reports already in (or converted to) the Apple plaintext form return
    /// their content; Umeng reports have no canonical form and return `None`.
    pub fn to_standard(&self) -> Option<&str> {
        match self.brand {
            ParserKind::Umeng => None,
            _ => Some(&self.content),
        }
    }
}
