use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::Value;

/// Appends DAP traffic to a file, one message per line.
#[derive(Clone)]
pub struct FileTracer {
    file: Arc<Mutex<std::fs::File>>,
}

impl FileTracer {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open trace file {}", path.display()))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn outgoing(&self, message: &Value) {
        self.message("->", message)
    }

    pub fn incoming(&self, message: &Value) {
        self.message("<-", message)
    }

    pub fn line(&self, text: &str) {
        if let Ok(mut file) = self.file.lock() {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "{now} {text}");
        }
    }

    fn message(&self, direction: &str, message: &Value) {
        if let Ok(line) = serde_json::to_string(message) {
            self.line(&format!("{direction} {line}"));
        }
    }
}
