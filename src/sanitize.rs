//! Repair of malformed escapes in model-generated JSON.
//!
//! Models frequently copy LaTeX (`\frac`, `\text`, `\%`) or stray `\n` out of
//! OCR markdown into JSON string values. A lone backslash before `b f n r t`
//! silently turns into a control character and a lone backslash before `%` is
//! a parse error. [`clean_json_string`] doubles those backslashes so the text
//! survives as written.
//!
//! ```text
//! {"value": "\frac{1}{2}"}   ->  {"value": "\\frac{1}{2}"}
//! {"value": "50\%"}          ->  {"value": "50\\%"}
//! {"value": "C:\\temp"}      ->  unchanged (already escaped)
//! ```
//!
//! This is not a JSON repair tool. Nothing outside those two escape classes is
//! touched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LONE_ESCAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\+)([bfnrt%])").unwrap());

/// Double a backslash run of odd length that precedes `b f n r t` or `%`.
///
/// Even-length runs are escaped backslashes and stay as they are, which makes
/// the function idempotent.
pub fn clean_json_string(json_str: &str) -> String {
    LONE_ESCAPE_RE
        .replace_all(json_str, |caps: &Captures| {
            let slashes = &caps[1];
            let target = &caps[2];
            if slashes.len() % 2 == 1 {
                format!("{}\\{}", slashes, target)
            } else {
                format!("{}{}", slashes, target)
            }
        })
        .into_owned()
}
