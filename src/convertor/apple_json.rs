//! Convertor for Apple's JSON (`.ips`) crash reports.
//!
//! The input is two newline-joined JSON documents: a one-line summary
//! header followed by the payload document. The output reconstructs the
//! classic Apple plaintext report so the Apple parser and external tooling
//! can consume it.

use serde_json::Value;

use super::{int, pad, text};

/// Converts Apple two-document JSON reports to plaintext.
pub struct AppleJsonConvertor;

/// `value[key]`, null when absent: field access never fails, it just
/// produces empty output downstream.
fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

fn split(content: &str) -> Option<(Value, Value)> {
    let (first, rest) = content.split_once('\n')?;
    let header = serde_json::from_str(first).ok()?;
    let payload = serde_json::from_str(rest).ok()?;
    Some((header, payload))
}

impl AppleJsonConvertor {
    /// Structural membership test: two parseable documents, and the payload
    /// carries `coalitionName` or `crashReporterKey`.
    pub fn matches(content: &str) -> bool {
        match split(content) {
            Some((_, payload)) => {
                payload.get("coalitionName").is_some() || payload.get("crashReporterKey").is_some()
            }
            None => false,
        }
    }

    /// Render the canonical plaintext report. Input that no longer splits
    /// cleanly is returned unchanged.
    pub fn convert(&self, content: &str) -> String {
        let Some((header, payload)) = split(content) else {
            return content.to_string();
        };

        let p = |key: &str| text(field(&payload, key));
        let h = |key: &str| text(field(&header, key));

        let mut out: Vec<String> = vec![
            format!("Incident Identifier: {}", h("incident_id")),
            format!("CrashReporter Key:   {}", p("crashReporterKey")),
            format!("Hardware Model:      {}", p("modelCode")),
            format!("Process:             {} [{}]", p("procName"), p("pid")),
            format!("Path:                {}", p("procPath")),
            format!("Identifier:          {}", p("coalitionName")),
            format!("Version:             {} ({})", h("app_version"), h("build_version")),
            format!("Code Type:           {}", p("cpuType")),
            format!("Role:                {}", p("procRole")),
            format!("Parent Process:      {} [{}]", p("parentProc"), p("parentPid")),
            format!("Coalition:           {} [{}]", p("coalitionName"), p("coalitionID")),
            String::new(),
            format!("Date/Time:           {}", p("captureTime")),
            format!("Launch Time:         {}", p("procLaunch")),
            format!("OS Version:          {}", h("os_version")),
            format!(
                "Release Type:        {}",
                text(field(field(&payload, "osVersion"), "releaseType"))
            ),
            format!("Baseband Version:    {}", p("basebandVersion")),
            "Report Version:      104".to_string(),
            String::new(),
            format!(
                "Exception Type:  {} ({})",
                text(field(field(&payload, "exception"), "type")),
                text(field(field(&payload, "exception"), "signal"))
            ),
            format!(
                "Exception Codes: {}",
                text(field(field(&payload, "exception"), "codes"))
            ),
            format!(
                "Termination Reason: {} {}",
                text(field(field(&payload, "termination"), "namespace")),
                text(field(field(&payload, "termination"), "code"))
            ),
            text(
                field(field(&payload, "termination"), "details")
                    .get(0)
                    .unwrap_or(&Value::Null),
            ),
        ];

        if let Some(vm) = field(&payload, "vmSummary").as_str() {
            out.push(format!("VM Region Info: {vm}"));
        }
        out.push(String::new());
        out.push(format!("Triggered by Thread:  {}", p("faultingThread")));
        out.push(String::new());
        out.push(build_threads(&payload));
        out.push(String::new());
        out.push(build_registers(&payload));
        out.push(String::new());
        out.push(build_images(&payload));
        out.push(String::new());
        out.push("EOF".to_string());
        out.push(String::new());

        out.join("\n")
    }
}

fn build_threads(payload: &Value) -> String {
    let images = field(payload, "usedImages");
    let empty = Vec::new();
    let threads = field(payload, "threads").as_array().unwrap_or(&empty);

    let mut out: Vec<String> = Vec::new();
    for (index, thread) in threads.iter().enumerate() {
        if let Some(name) = field(thread, "name").as_str() {
            out.push(format!("Thread {index} name:  {name}"));
        } else if let Some(queue) = field(thread, "queue").as_str() {
            out.push(format!("Thread {index} name:   Dispatch queue: {queue}"));
        }
        if field(thread, "triggered").as_bool().unwrap_or(false) {
            out.push(format!("Thread {index} Crashed:"));
        } else {
            out.push(format!("Thread {index}:"));
        }
        for (frame_index, frame) in field(thread, "frames")
            .as_array()
            .unwrap_or(&empty)
            .iter()
            .enumerate()
        {
            out.push(build_frame(frame, frame_index, images));
        }
        out.push(String::new());
    }
    out.join("\n")
}

// 0   Foundation                               0x182348144 NSKeyValueWillChangeWithPerThreadPendingNotifications + 200
fn build_frame(frame: &Value, index: usize, images: &Value) -> String {
    let image = field(frame, "imageIndex")
        .as_u64()
        .and_then(|i| images.get(i as usize))
        .unwrap_or(&Value::Null);
    let base = int(field(image, "base"));
    let offset = int(field(frame, "imageOffset"));
    let address = base.saturating_add(offset);

    let mut line = String::new();
    line.push_str(&pad(&index.to_string(), 4));
    line.push_str(&pad(&text(field(image, "name")), 39));
    line.push_str(&format!("0x{address:x} "));

    match (field(frame, "symbol").as_str(), field(frame, "symbolLocation").as_i64()) {
        (Some(symbol), Some(location)) => line.push_str(&format!("{symbol} + {location}")),
        _ => line.push_str(&format!("0x{base:x} + {offset}")),
    }
    if let (Some(file), Some(source_line)) = (
        field(frame, "sourceFile").as_str(),
        field(frame, "sourceLine").as_i64(),
    ) {
        line.push_str(&format!(" ({file}:{source_line})"));
    }
    line
}

fn build_registers(payload: &Value) -> String {
    let empty = Vec::new();
    let threads = field(payload, "threads").as_array().unwrap_or(&empty);
    let Some(triggered) = threads
        .iter()
        .find(|t| field(t, "triggered").as_bool().unwrap_or(false))
    else {
        return String::new();
    };

    let index = int(field(payload, "faultingThread"));
    let cpu = text(field(payload, "cpuType"));
    let mut content = format!("Thread {index} crashed with ARM Thread State ({cpu}):\n");

    let state = field(triggered, "threadState");
    let x = field(state, "x").as_array().unwrap_or(&empty);
    for (i, reg) in x.iter().enumerate() {
        let id = format!("x{i}");
        content.push_str(&format!("{id:>6}: 0x{:016X}", int(field(reg, "value"))));
        if i % 4 == 3 {
            content.push('\n');
        }
    }

    let mut i = x.len() % 4;
    for name in ["fp", "lr", "sp", "pc", "cpsr", "far", "esr"] {
        let reg = field(state, name);
        content.push_str(&format!("{name:>6}: 0x{:016X}", int(field(reg, "value"))));
        let desc = text(field(reg, "description"));
        if !desc.is_empty() {
            content.push_str(&format!(" {desc}"));
        }
        if i % 3 == 2 {
            content.push('\n');
        }
        i += 1;
    }
    content
}

// 0x18232f000 - 0x182635fff Foundation arm64e  <9618b2f2a4c23e07b7eed8d9e1bdeaec> /System/Library/Frameworks/Foundation.framework/Foundation
fn build_images(payload: &Value) -> String {
    let empty = Vec::new();
    let images = field(payload, "usedImages").as_array().unwrap_or(&empty);

    let mut out = vec!["Binary Images:".to_string()];
    for image in images {
        let base = int(field(image, "base"));
        let size = int(field(image, "size"));
        out.push(format!(
            "0x{:x} - 0x{:x} {} {} <{}> {}",
            base,
            base.saturating_add(size).saturating_sub(1),
            text(field(image, "name")),
            text(field(image, "arch")),
            text(field(image, "uuid")).replace('-', ""),
            text(field(image, "path")),
        ));
    }
    out.join("\n")
}
