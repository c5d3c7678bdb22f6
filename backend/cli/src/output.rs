//! Terminal notes for operator-facing commands.

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
    Info,
    Warn,
    Error,
    Success,
}

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn format_note(kind: Note, msg: &str, color: bool) -> String {
    if color {
        let (paint, glyph) = match kind {
            Note::Info => (CYAN, "ℹ"),
            Note::Warn => (YELLOW, "⚠"),
            Note::Error => (RED, "✗"),
            Note::Success => (GREEN, "✓"),
        };
        format!("{paint}{BOLD}{glyph}{RESET} {msg}")
    } else {
        let label = match kind {
            Note::Info => "INFO",
            Note::Warn => "WARN",
            Note::Error => "ERROR",
            Note::Success => "OK",
        };
        format!("{label}: {msg}")
    }
}

/// Print a note; errors go to stderr.
pub fn note(kind: Note, msg: &str) {
    let line = format_note(kind, msg, supports_color());
    if kind == Note::Error {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notes_are_labelled() {
        assert_eq!(format_note(Note::Warn, "port 80", false), "WARN: port 80");
        assert_eq!(format_note(Note::Success, "valid", false), "OK: valid");
    }

    #[test]
    fn colored_notes_reset() {
        let line = format_note(Note::Error, "bad", true);
        assert!(line.starts_with(RED));
        assert!(line.ends_with(" bad"));
        assert!(line.contains(RESET));
    }
}
