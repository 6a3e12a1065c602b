//! Output sanitizer for vpn-admin
//!
//! Every byte of text captured from an external command passes through
//! [`sanitize`] before any line-based parsing happens. Parsers downstream
//! assume the result: no escape sequences, no control characters other
//! than `\n`, and LF-only line endings.

use regex::Regex;
use std::sync::OnceLock;

/// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ST`) and two-byte escapes
const ESCAPE_SEQUENCE_PATTERN: &str =
    r"\x1B\[[0-?]*[ -/]*[@-~]|\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)?|\x1B[ -/]*[0-~]";

fn escape_sequences() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ESCAPE_SEQUENCE_PATTERN).expect("escape sequence pattern is valid"))
}

/// Strip terminal escape sequences and control characters, normalize line endings.
///
/// Tabs become single spaces so whitespace-separated columns keep their
/// boundaries; every other control character (C0 and C1, plus DEL) except
/// `\n` is dropped. The function is idempotent.
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_escapes = escape_sequences().replace_all(text, "");
    let normalized = without_escapes.replace("\r\n", "\n").replace('\r', "\n");

    normalized
        .chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            '\t' => Some(' '),
            c if is_control(c) => None,
            c => Some(c),
        })
        .collect()
}

/// Sanitize raw process output that may not be valid UTF-8
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    sanitize(&String::from_utf8_lossy(bytes))
}

fn is_control(c: char) -> bool {
    let code = c as u32;
    code <= 0x1F || (0x7F..=0x9F).contains(&code)
}

/// Separator-only line such as `=====`, `---+---` or `:::`
pub fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_whitespace() || is_separator_char(c))
}

/// Token made entirely of separator characters (`::`, `|`, `--`)
pub fn is_separator_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(is_separator_char)
}

fn is_separator_char(c: char) -> bool {
    matches!(c, '=' | ':' | '+' | '-' | '|')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_color_codes() {
        assert_eq!(sanitize("\x1B[32mactive\x1B[0m"), "active");
        assert_eq!(sanitize("\x1B[1;31mfailed\x1B[0m here"), "failed here");
    }

    #[test]
    fn test_strips_cursor_and_private_modes() {
        assert_eq!(sanitize("\x1B[2K\x1B[1Gdone"), "done");
        assert_eq!(sanitize("\x1B[?25lhidden\x1B[?25h"), "hidden");
    }

    #[test]
    fn test_strips_osc_title() {
        assert_eq!(sanitize("\x1B]0;window title\x07text"), "text");
    }

    #[test]
    fn test_normalizes_line_endings() {
        assert_eq!(sanitize("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_drops_control_characters() {
        assert_eq!(sanitize("a\x00b\x07c\x7Fd\u{85}e"), "abcde");
        assert_eq!(sanitize("col1\tcol2"), "col1 col2");
    }

    #[test]
    fn test_lone_escape_removed() {
        assert_eq!(sanitize("\x1B"), "");
        assert_eq!(sanitize("x\x1B["), "x");
        assert_eq!(sanitize("x\x1B"), "x");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "plain text\n",
            "\x1B[32mactive\x1B[0m",
            "\x1B\x1B[0m[31m",
            "a\r\n\r\nb\t\x1B]2;t\x1B\\c",
            "::: Client Status List :::\r\n",
            "\u{9B}31m weird",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_sanitize_bytes_lossy() {
        assert_eq!(sanitize_bytes(b"ok\xFF\r\n"), "ok\u{FFFD}\n");
    }

    #[test]
    fn test_separator_lines() {
        assert!(is_separator_line("======"));
        assert!(is_separator_line("  ---+---|--- "));
        assert!(is_separator_line(":::"));
        assert!(!is_separator_line(""));
        assert!(!is_separator_line("--- alice"));
        assert!(is_separator_token("::"));
        assert!(!is_separator_token("a-b"));
    }
}
