//! Strips ANSI escape sequences from raw pane scrollback before any
//! pattern matching runs.

use regex::Regex;
use std::sync::LazyLock;

// CSI sequences: ESC '[' ... final byte in 0x40-0x7E.
static CSI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").unwrap());
// OSC sequences (window title, hyperlinks): ESC ']' ... BEL or ESC '\'.
static OSC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").unwrap());
// Simple two-byte escapes (cursor save/restore and friends).
static SIMPLE_ESC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b[=>MNOc78]").unwrap());

/// Removes CSI/OSC escape sequences and carriage returns, leaving plain
/// text suitable for line-oriented pattern matching.
pub fn strip(input: &str) -> String {
    let no_osc = OSC.replace_all(input, "");
    let no_csi = CSI.replace_all(&no_osc, "");
    let no_simple = SIMPLE_ESC.replace_all(&no_csi, "");
    no_simple.replace('\r', "")
}
