use std::io::{self, Write};

use crossterm::{
    cursor, execute,
    style::{Color, Print, Stylize},
    terminal::{Clear, ClearType},
};
use unicode_width::UnicodeWidthChar;

use crate::ui::symbols::Symbols;

pub(crate) const TITLE_BANNER: [&str; 5] = [
    "  ____                  _   ____        _   ",
    " / ___|  ___ ___  _   _| |_| __ )  ___ | |_ ",
    " \\___ \\ / __/ _ \\| | | | __|  _ \\ / _ \\| __|",
    "  ___) | (_| (_) | |_| | |_| |_) | (_) | |_ ",
    " |____/ \\___\\___/ \\__,_|\\__|____/ \\___/ \\__|",
];

/// Terminal surface: a scrollback of emitted lines plus a managed area at
/// the bottom (live progress panel, status line, input prompt) that is
/// cleared and redrawn in place.
pub(crate) struct Screen {
    stdout: io::Stdout,
    pub status: String,
    pub input: String,
    pub input_focused: bool,
    pub is_running: bool,
    pub spinner_tick: u64,
    /// Live progress panel rendered above the status line.
    pub panel: Vec<String>,
    managed_lines: usize,
}

impl Screen {
    pub(crate) fn new(api_host: &str) -> io::Result<Self> {
        let mut s = Self {
            stdout: io::stdout(),
            status: String::new(),
            input: String::new(),
            input_focused: true,
            is_running: false,
            spinner_tick: 0,
            panel: Vec::new(),
            managed_lines: 2,
        };
        execute!(s.stdout, cursor::MoveToColumn(0), Print("\r\n"))?;
        for line in TITLE_BANNER {
            execute!(
                s.stdout,
                cursor::MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(format!(
                    "{}\r\n",
                    line.with(Color::Rgb {
                        r: 70,
                        g: 139,
                        b: 255
                    })
                    .bold()
                ))
            )?;
        }

        let version = env!("CARGO_PKG_VERSION");
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| ".".to_string());
        let subtitles = [
            format!("ScoutBot v{version}").bold().to_string(),
            format!("backend {api_host}").grey().to_string(),
            cwd.grey().to_string(),
        ];
        for line in subtitles {
            execute!(
                s.stdout,
                cursor::MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(format!("  {line}\r\n"))
            )?;
        }

        execute!(s.stdout, cursor::MoveToColumn(0), Print("\r\n"))?;
        let _ = execute!(s.stdout, cursor::Hide);
        s.stdout.flush()?;
        s.draw_managed();
        Ok(s)
    }

    /// Append lines to the scrollback above the managed area.
    pub(crate) fn emit(&mut self, lines: &[String]) {
        self.clear_managed();
        for line in lines {
            let _ = execute!(self.stdout, Print(format!("{line}\r\n")));
        }
        self.draw_managed();
    }

    pub(crate) fn refresh(&mut self) {
        self.clear_managed();
        self.draw_managed();
    }

    fn clear_managed(&mut self) {
        let up = self.managed_lines.saturating_sub(1).min(u16::MAX as usize) as u16;
        let _ = execute!(
            self.stdout,
            cursor::MoveToColumn(0),
            cursor::MoveUp(up),
            Clear(ClearType::FromCursorDown),
        );
    }

    fn draw_managed(&mut self) {
        let cols = crossterm::terminal::size()
            .map(|(c, _)| c.max(1) as usize)
            .unwrap_or(80);
        let sym = Symbols::current();
        let mut rows = 0usize;

        for line in &self.panel {
            let fitted = fit_styled_line(line, cols);
            let _ = execute!(self.stdout, Print(format!("{fitted}\r\n")));
            rows += 1;
        }

        let status_display = if self.is_running {
            let frame = sym.spinner_frames[self.spinner_tick as usize % sym.spinner_frames.len()];
            let label = if self.status.is_empty() {
                "Working...".to_string()
            } else {
                self.status.clone()
            };
            format!("{} {label}", frame.cyan().bold())
        } else {
            self.status.clone()
        };
        let status_line = fit_styled_line(&format!("  {status_display}"), cols);
        let _ = execute!(self.stdout, Print(format!("{status_line}\r\n")));
        rows += 1;

        let hint = if self.is_running {
            "Ctrl+C quit".grey().to_string()
        } else if self.input_focused {
            format!(
                "{} {}{}",
                sym.prompt.cyan().bold(),
                self.input,
                "▏".grey()
            )
        } else {
            format!("{} company name {} Enter start {} Esc quit", sym.prompt, sym.dot, sym.dot)
                .grey()
                .to_string()
        };
        let _ = execute!(self.stdout, Print(fit_styled_line(&hint, cols)));
        rows += 1;

        self.managed_lines = rows;
        let _ = self.stdout.flush();
    }
}

/// Fit a possibly-styled line into `max_width` columns, keeping the head.
/// ANSI sequences count as zero width; a line that overflows is cut and
/// terminated with an ellipsis so managed-area rows never wrap.
pub(crate) fn fit_styled_line(s: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if rendered_text_width(&strip_ansi(s)) <= max_width {
        return s.to_string();
    }

    let ellipsis = Symbols::current().ellipsis;
    let budget = max_width.saturating_sub(rendered_text_width(ellipsis));
    let mut out = String::new();
    let mut used = 0usize;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && matches!(chars.peek(), Some('[')) {
            out.push(ch);
            while let Some(c) = chars.next() {
                out.push(c);
                if c != '[' && ('@'..='~').contains(&c) {
                    break;
                }
            }
            continue;
        }
        if ch == '\r' || ch == '\n' || ch.is_control() {
            continue;
        }
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push_str(ellipsis);
    // Close any style left open by the cut.
    out.push_str("\u{1b}[0m");
    out
}

/// Pull the host part out of a URL for the startup banner.
pub(crate) fn extract_host_from_url(url: &str) -> String {
    let no_scheme = url.split("://").nth(1).unwrap_or(url);
    let host = no_scheme.split('/').next().unwrap_or(no_scheme).trim();
    if host.is_empty() {
        url.to_string()
    } else {
        host.to_string()
    }
}

pub(crate) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && matches!(chars.peek(), Some('[')) {
            let _ = chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

pub(crate) fn rendered_text_width(s: &str) -> usize {
    const TAB_STOP: usize = 8;
    let mut col = 0usize;
    for ch in s.chars() {
        match ch {
            '\t' => {
                let advance = TAB_STOP - (col % TAB_STOP);
                col += advance;
            }
            '\r' | '\n' => {}
            c if c.is_control() => {}
            c => col += UnicodeWidthChar::width(c).unwrap_or(0),
        }
    }
    col
}

#[cfg(test)]
mod tests {
    use super::{extract_host_from_url, fit_styled_line, rendered_text_width, strip_ansi};

    #[test]
    fn extract_host_drops_scheme_and_path() {
        assert_eq!(extract_host_from_url("http://localhost:8000"), "localhost:8000");
        assert_eq!(
            extract_host_from_url("https://api.example.com/research"),
            "api.example.com"
        );
    }

    #[test]
    fn strip_ansi_removes_style_sequences() {
        let styled = "\u{1b}[32mgreen\u{1b}[0m text";
        assert_eq!(strip_ansi(styled), "green text");
    }

    #[test]
    fn rendered_width_counts_wide_chars_and_tabs() {
        assert_eq!(rendered_text_width("abc"), 3);
        assert_eq!(rendered_text_width("研究"), 4);
        assert_eq!(rendered_text_width("\tx"), 9);
    }

    #[test]
    fn fit_styled_line_keeps_short_lines_untouched() {
        assert_eq!(fit_styled_line("hello", 10), "hello");
    }

    #[test]
    fn fit_styled_line_cuts_overflow_with_ellipsis() {
        let fitted = fit_styled_line("abcdefghij", 5);
        let plain = strip_ansi(&fitted);
        assert!(plain.starts_with("abcd"));
        assert!(plain.ends_with('…'));
    }
}
