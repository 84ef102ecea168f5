// =============================================================================
// EngineLog — tab-separated append-only log, independent of tracing
// =============================================================================
//
// Tab-separated line format (`YYYY-MM-DD HH:MM:SS \t LEVEL \t message`),
// distinct from the structured tracing stream set up in main.rs: a small,
// self-contained writer for the engine's own audit trail. I/O failures here
// are swallowed; the engine must never die because of telemetry.
// =============================================================================

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use tracing::warn;

pub struct EngineLog {
    writer: Option<BufWriter<File>>,
}

impl EngineLog {
    pub fn open(path: &str) -> Self {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Self { writer: Some(BufWriter::new(f)) },
            Err(e) => {
                warn!(path, error = %e, "failed to open engine log, logging will be dropped");
                Self { writer: None }
            }
        }
    }

    pub fn info(&mut self, msg: &str) {
        self.write_line("INFO", msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.write_line("WARN", msg);
    }

    pub fn error(&mut self, msg: &str) {
        self.write_line("ERROR", msg);
    }

    fn write_line(&mut self, level: &str, msg: &str) {
        let Some(w) = self.writer.as_mut() else { return };
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S");
        if writeln!(w, "{ts}\t{level}\t{msg}").is_ok() {
            let _ = w.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tab_separated_line() {
        let dir = std::env::temp_dir();
        let path = dir.join("reaction_engine_test.log");
        let _ = std::fs::remove_file(&path);
        {
            let mut log = EngineLog::open(path.to_str().unwrap());
            log.info("engine started");
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\tINFO\tengine started"));
        let _ = std::fs::remove_file(&path);
    }
}
