//! Convertor for "Keep" JSON crash reports.
//!
//! A single JSON document with the backtrace under `trace.threads` and the
//! system metadata under `trace.systemMsg`. Unlike the Apple JSON form this
//! dialect never reports image sizes, so the image table is written with an
//! all-`f` sentinel as the end address, and images are reconstructed by
//! deduplicating the per-frame image fields across all threads.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{int, pad, text};

/// Boilerplate `line_show_str` values look like `5417385984 5430273043 + 12887059`;
/// anything of that shape is discarded in favor of the computed fallback.
static LINE_SHOW_BOILERPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+ \d+ \+ \d+").unwrap());

/// Converts Keep single-document JSON reports to plaintext.
pub struct KeepJsonConvertor;

fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

/// `value[key]` as a slice, empty when absent. The slice borrows from
/// `value`, so callers can hold elements past their own locals.
fn frames_of<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    field(value, key).as_array().map_or(&[][..], Vec::as_slice)
}

impl KeepJsonConvertor {
    /// Structural membership test: `trace` is an object, `app_package_name`
    /// is a string, and `trace.threads` is an array.
    pub fn matches(content: &str) -> bool {
        let Ok(payload) = serde_json::from_str::<Value>(content) else {
            return false;
        };
        field(&payload, "trace").is_object()
            && field(&payload, "app_package_name").is_string()
            && field(field(&payload, "trace"), "threads").is_array()
    }

    /// Render the canonical plaintext report. Unparseable input is returned
    /// unchanged.
    pub fn convert(&self, content: &str) -> String {
        let Ok(payload) = serde_json::from_str::<Value>(content) else {
            return content.to_string();
        };

        let trace = field(&payload, "trace");
        let system = field(trace, "systemMsg");
        let s = |key: &str| text(field(system, key));

        let mut out: Vec<String> = vec![
            format!("Incident Identifier: {}", text(field(trace, "uuid"))),
            format!("Hardware Model:      {}", s("machine")),
            format!("Process:             {}", s("CFBundleExecutable")),
            format!("Identifier:          {}", s("CFBundleIdentifier")),
            format!(
                "Version:             {} ({})",
                s("CFBundleShortVersionString"),
                s("CFBundleVersion")
            ),
            format!("Code Type:           {}", s("cpu_arch")),
            if field(field(system, "application_stats"), "application_in_foreground")
                .as_bool()
                .unwrap_or(false)
            {
                "Role:                Foreground".to_string()
            } else {
                "Role:                Background".to_string()
            },
            format!("Coalition:           {}", s("CFBundleIdentifier")),
            String::new(),
            format!("Date/Time:           {}", s("app_start_time")),
            format!("Launch Time:         {}", s("boot_time")),
            format!(
                "OS Version:          iPhone OS {} ({})",
                s("system_version"),
                s("os_version")
            ),
            "Release Type:        User".to_string(),
            "Report Version:      104".to_string(),
            String::new(),
            format!(
                "Exception Type:  {} ({})",
                text(field(field(field(trace, "errorMsg"), "mach"), "exception_name")),
                text(field(field(field(trace, "errorMsg"), "signal"), "name"))
            ),
            format!(
                "Exception Codes: {} {}",
                text(field(field(field(trace, "errorMsg"), "mach"), "code")),
                text(field(field(field(trace, "errorMsg"), "mach"), "subcode"))
            ),
            format!(
                "Termination Reason: {}",
                text(field(trace, "crash_info_message"))
            ),
            text(field(trace, "diagnosis")),
            String::new(),
        ];

        if let Some(index) = crashed_thread_index(trace) {
            out.push(format!("Triggered by Thread:  {index}"));
        }
        out.push(String::new());

        let empty = Vec::new();
        let key_stack = field(&payload, "key_stack").as_array().unwrap_or(&empty);
        if !key_stack.is_empty() {
            out.push("Last Exception Backtrace".to_string());
            for (index, frame) in key_stack.iter().enumerate() {
                out.push(build_frame(frame, index));
            }
            out.push(String::new());
        }

        for thread in field(trace, "threads").as_array().unwrap_or(&empty) {
            out.push(build_thread(thread));
        }

        let arch = arch_of(trace);
        out.push("Binary Images:".to_string());
        for image in unique_images(trace) {
            out.push(build_image(image, &arch));
        }
        out.push(String::new());
        out.push("EOF".to_string());
        out.push(String::new());

        out.join("\n")
    }
}

fn build_thread(thread: &Value) -> String {
    let index = int(field(thread, "index"));
    let mut out: Vec<String> = Vec::new();

    if field(thread, "thread_name").is_string() {
        out.push(format!(
            "Thread {index} name:  {}",
            text(field(thread, "thread_name"))
        ));
    } else if field(thread, "dispatch_queue").is_string() {
        out.push(format!(
            "Thread {index} name:   Dispatch queue: {}",
            text(field(thread, "dispatch_queue"))
        ));
    }
    out.push(format!(
        "Thread {index} {}:",
        text(field(thread, "thread_type"))
    ));

    let empty = Vec::new();
    for (frame_index, frame) in field(thread, "thread_stack")
        .as_array()
        .unwrap_or(&empty)
        .iter()
        .enumerate()
    {
        out.push(build_frame(frame, frame_index));
    }
    out.push(String::new());
    out.join("\n")
}

fn build_frame(frame: &Value, index: usize) -> String {
    let address = int(field(frame, "load_address"));
    let mut line = String::new();
    line.push_str(&pad(&index.to_string(), 4));
    line.push_str(&pad(&text(field(frame, "image_name")), 38));
    line.push_str(&format!("0x{address:x} "));
    line.push_str(&frame_symbol(frame));
    line
}

/// Pick the symbol text for one frame.
///
/// A human-readable `line_show_str` wins, unless it matches the boilerplate
/// shape, in which case the computed `address + offset` fallback is used.
/// An explicit `log_symbol_name` is trusted except for the `<redacted>`
/// sentinel. A `file:line` suffix is appended when present.
fn frame_symbol(frame: &Value) -> String {
    let address = int(field(frame, "address"));

    if let Some(shown) = field(frame, "line_show_str").as_str() {
        if !LINE_SHOW_BOILERPLATE.is_match(shown) {
            return shown.to_string();
        }
    }

    let mut symbol = match field(frame, "log_symbol_name").as_str() {
        Some(name) if name != "<redacted>" => name.to_string(),
        _ => format!("0x{address:x} + {address}"),
    };

    let file = text(field(frame, "file_name"));
    if !file.is_empty() {
        symbol = format!("{symbol} {file}: {}", text(field(frame, "line_num")));
    }
    symbol
}

// 0x102e10000 - 0xffffffffff demo arm64 <42fd89f730be3ac5a40a4c1a99438dfb> /var/containers/Bundle/Application/demo
fn build_image(image: &Value, arch: &str) -> String {
    let name = text(field(image, "image_name"));
    // This dialect never reports the image size; fake the upper bound.
    let mut line = format!(
        "0x{:x} - 0xffffffffff {} {} <{}> ",
        int(field(image, "address")),
        name,
        arch,
        text(field(image, "uuid")),
    );
    if field(image, "is_key").as_bool().unwrap_or(false) {
        // The real installation path is not reported either.
        line.push_str(&format!("/var/containers/Bundle/Application/{name}"));
    } else {
        line.push('/');
    }
    line
}

fn crashed_thread_index(trace: &Value) -> Option<i64> {
    let threads = field(trace, "threads").as_array()?;
    threads
        .iter()
        .find(|t| field(t, "thread_type").as_str() == Some("Crashed"))
        .map(|t| int(field(t, "index")))
}

/// One representative frame fragment per unique image name, scanning every
/// thread's stack. Later occurrences win.
fn unique_images(trace: &Value) -> Vec<&Value> {
    let threads = frames_of(trace, "threads");

    let mut map: HashMap<String, &Value> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for thread in threads {
        for frame in frames_of(thread, "thread_stack") {
            let name = text(field(frame, "image_name"));
            if !map.contains_key(&name) {
                order.push(name.clone());
            }
            map.insert(name, frame);
        }
    }
    order.into_iter().filter_map(|name| map.remove(&name)).collect()
}

fn arch_of(trace: &Value) -> String {
    let arch = text(field(field(trace, "systemMsg"), "cpu_arch"));
    if arch.contains("armv7") {
        arch
    } else {
        "arm64".to_string()
    }
}
