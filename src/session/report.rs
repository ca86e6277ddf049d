use std::{fs, path::PathBuf};

use anyhow::Result;
use chrono::Local;

/// Ordered accumulation of streamed report fragments.
///
/// Chunks are concatenated byte-for-byte in arrival order. The terminal
/// `completed` event carries the authoritative full report, which replaces
/// whatever was streamed, so partial delivery before a disconnect never
/// leaves a truncated report on screen. The first finalize wins; later
/// terminal payloads (e.g. a poll result racing the stream) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportBuffer {
    text: String,
    finalized: bool,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_chunk(&mut self, chunk: &str) {
        if self.finalized {
            return;
        }
        self.text.push_str(chunk);
    }

    pub fn finalize(&mut self, report: &str) {
        if self.finalized {
            return;
        }
        self.text.clear();
        self.text.push_str(report);
        self.finalized = true;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Write the final report to `reports/<company>-<date>.md` under the current
/// directory and return the path.
pub fn save_report(company: &str, text: &str) -> Result<PathBuf> {
    let dir = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("reports");
    fs::create_dir_all(&dir)?;
    let day = Local::now().format("%Y-%m-%d").to_string();
    let path = dir.join(format!("{}-{day}.md", slugify(company)));
    fs::write(&path, text)?;
    Ok(path)
}

fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportBuffer, slugify};

    #[test]
    fn chunks_concatenate_in_order() {
        let mut buf = ReportBuffer::new();
        buf.append_chunk("# Acme");
        buf.append_chunk("\n\nFounded ");
        buf.append_chunk("in 1999.");
        assert_eq!(buf.text(), "# Acme\n\nFounded in 1999.");
        assert!(!buf.is_finalized());
    }

    #[test]
    fn finalize_replaces_streamed_content() {
        let mut buf = ReportBuffer::new();
        buf.append_chunk("partial repo");
        buf.finalize("FINAL");
        assert_eq!(buf.text(), "FINAL");
        assert!(buf.is_finalized());
    }

    #[test]
    fn first_finalize_wins() {
        let mut buf = ReportBuffer::new();
        buf.finalize("first");
        buf.finalize("second");
        assert_eq!(buf.text(), "first");
    }

    #[test]
    fn chunks_after_finalize_are_ignored() {
        let mut buf = ReportBuffer::new();
        buf.finalize("FINAL");
        buf.append_chunk(" extra");
        assert_eq!(buf.text(), "FINAL");
    }

    #[test]
    fn slugify_collapses_non_alphanumerics() {
        assert_eq!(slugify("Acme Corp."), "acme-corp");
        assert_eq!(slugify("  Tésla,  Inc  "), "t-sla-inc");
        assert_eq!(slugify("***"), "report");
    }
}
