//! Crash-report parsing, conversion and symbolication for Apple platforms.
//!
//! Takes a crash report in any of the supported shapes, plaintext Apple
//! reports and their CPU-usage, Crashlytics and Umeng cousins, plus the
//! `.ips` and keep JSON payloads, and produces a [`Crash`]: header fields,
//! binary images, extracted stack frames and highlight ranges. The
//! [`symbolication`] module then drives `symbolicatecrash` or `atos` to
//! resolve the frames against dSYM bundles.
//!
//! Parsing is best-effort by construction. A field a report does not carry
//! is simply `None`; malformed input yields a `Crash` with whatever could
//! be extracted, never an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use crashsym::parse;
//!
//! let content = std::fs::read_to_string("demo.crash").unwrap();
//! let crash = parse(&content);
//! println!("{:?} {:?}", crash.app_name, crash.uuid);
//! for binary in crash.embedded_binaries() {
//!     println!("{} {:?}", binary.name, binary.uuid);
//! }
//! ```

pub mod convertor;
pub mod dsym;
pub mod parser;
pub mod pattern;
pub mod report;
pub mod symbolication;

pub use dsym::DsymFile;
pub use parser::{parse, ParserKind};
pub use report::{uuid_format, Binary, Crash, Frame, SymbolicateMethod};
pub use symbolication::{SymbolicationError, Symbolicator};
