//! Operator-facing progress output.

use std::io::{self, Write};

use colored::Colorize;
use parking_lot::Mutex;
use reconflow::events::EventSink;
use serde_json::Value;

/// Prints pipeline and bootstrap progress as colored lines.
///
/// Goes to stderr by default so stdout carries only the summary.
pub struct ConsoleEventSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleEventSink {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl std::fmt::Debug for ConsoleEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleEventSink").finish_non_exhaustive()
    }
}

impl EventSink for ConsoleEventSink {
    fn emit(&self, event_type: &str, data: Option<Value>) {
        let data = data.unwrap_or(Value::Null);
        let lines = render(event_type, &data);
        if lines.is_empty() {
            return;
        }
        let mut out = self.out.lock();
        for line in lines {
            if let Err(e) = writeln!(out, "{line}") {
                tracing::debug!(error = %e, "Console write failed");
                return;
            }
        }
        let _ = out.flush();
    }
}

fn text<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn number(data: &Value, key: &str) -> u64 {
    data.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn seconds(data: &Value) -> String {
    let ms = data.get("duration_ms").and_then(Value::as_f64).unwrap_or(0.0);
    format!("{:.1}s", ms / 1000.0)
}

/// Maps one event onto zero or more console lines.
fn render(event_type: &str, data: &Value) -> Vec<String> {
    match event_type {
        "pipeline.started" => vec![format!(
            "🚀 Running {} stages against {} ({})",
            number(data, "stages"),
            text(data, "target"),
            text(data, "mode")
        )
        .bold()
        .to_string()],
        "wave.started" => {
            let stages: Vec<&str> = data
                .get("stages")
                .and_then(Value::as_array)
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            vec![format!("≡ Wave {}: {}", number(data, "wave"), stages.join(", "))
                .blue()
                .to_string()]
        }
        "stage.started" => vec![
            format!("🔹 Step {}/{}", number(data, "position"), number(data, "total"))
                .cyan()
                .to_string(),
            format!("▶ Running {}...", text(data, "tool")).yellow().to_string(),
        ],
        "stage.completed" => vec![format!("✔ {} done in {}", text(data, "stage"), seconds(data))
            .green()
            .to_string()],
        "stage.failed" => vec![format!(
            "✖ {} failed: {}",
            text(data, "stage"),
            data.get("error").and_then(Value::as_str).unwrap_or("unknown error")
        )
        .red()
        .to_string()],
        "stage.skipped" => vec![format!("- {} skipped ({})", text(data, "stage"), text(data, "reason"))
            .dimmed()
            .to_string()],
        "pipeline.completed" if data.get("cancelled").and_then(Value::as_bool) == Some(true) => {
            vec!["⚠ Run interrupted, remaining stages were skipped".yellow().to_string()]
        }
        "tool.install.started" => vec![format!("⬇ Installing {}...", text(data, "tool"))
            .yellow()
            .to_string()],
        "tool.install.completed" => vec![format!("✔ Installed {}", text(data, "tool")).green().to_string()],
        "tool.install.failed" => vec![format!(
            "✖ Could not install {}: {}",
            text(data, "tool"),
            text(data, "error")
        )
        .red()
        .to_string()],
        _ => Vec::new(),
    }
}
