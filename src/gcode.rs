//! Text handling for G-code lines as they are sent to the printer.
//!
//! Nothing in here interprets motion; this only splits a line into the
//! command mnemonic and extracts the numeric words the odometer cares about.

use regex::Regex;

/// Mnemonic of the filament change command.
pub const FILAMENT_CHANGE: &str = "M600";

lazy_static::lazy_static! {
    static ref LINE_NUMBER: Regex = Regex::new(r"^[Nn]\d+\s*").unwrap();
    static ref MNEMONIC: Regex = Regex::new(r"^([A-Za-z])0*(\d+)(\.\d+)?").unwrap();
    // The trailing group catches leftovers such as the `.3` of `E1.2.3`.
    static ref E_WORD: Regex = Regex::new(r"[Ee]([+-]?(?:\d+(?:\.\d*)?|\.\d+))([.\d]*)").unwrap();
    static ref TOOL: Regex = Regex::new(r"^[Tt](\d+)").unwrap();
}

/// A single non-empty line of G-code, with comments, checksum and line
/// number stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcodeLine {
    mnemonic: String,
    raw: String,
}

impl GcodeLine {
    /// Split a raw line into its mnemonic and command text. Returns `None`
    /// for blank and comment-only lines, and for lines that do not start
    /// with a command letter. A leading `N<line>` word is dropped.
    pub fn parse(line: &str) -> Option<Self> {
        let code = strip_comment(line).trim();
        let code = match LINE_NUMBER.find(code) {
            Some(number) => &code[number.end()..],
            None => code,
        };
        let first = code.split_whitespace().next()?;
        let mnemonic = normalize_mnemonic(first)?;

        Some(Self {
            mnemonic,
            raw: code.to_owned(),
        })
    }

    /// The normalized command mnemonic, e.g. `G1` for `g01 X10`.
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// The command text without comments.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Drop everything from the first `;` comment or `*` checksum marker.
pub fn strip_comment(line: &str) -> &str {
    match line.find([';', '*']) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Upper-case the command letter and drop leading zeros from its number, so
/// `g01` and `G1` compare equal. Subcodes (`G29.1`) are kept. Words without a
/// number (`T?`, `Tc`) are returned upper-cased.
pub fn normalize_mnemonic(word: &str) -> Option<String> {
    match MNEMONIC.captures(word) {
        Some(caps) => Some(format!(
            "{}{}{}",
            caps[1].to_ascii_uppercase(),
            &caps[2],
            caps.get(3).map_or("", |subcode| subcode.as_str())
        )),
        None if word.starts_with(|c: char| c.is_ascii_alphabetic()) => Some(word.to_ascii_uppercase()),
        None => None,
    }
}

/// Value of the last well-formed `E` word in `raw`, e.g.
/// `e_value("G1 X10 E-2.5") == Some(-2.5)`. Words may be separated by
/// whitespace or packed together (`G1X10E5`). Malformed or non-finite numbers
/// are skipped.
pub fn e_value(raw: &str) -> Option<f64> {
    E_WORD
        .captures_iter(strip_comment(raw))
        .filter(|caps| caps[2].is_empty())
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .last()
}

/// Index of the tool selected by a leading `T<n>` word.
pub fn tool_index(raw: &str) -> Option<usize> {
    let code = strip_comment(raw).trim_start();
    TOOL.captures(code)?[1].parse().ok()
}
