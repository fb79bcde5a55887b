//! Address redaction for log output

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+-]+@([a-zA-Z0-9-]+\.[a-zA-Z0-9-.])")
        .expect("address pattern is a valid regex")
});

/// Replace the local part of every mail address in `s` with `***`
pub fn mask_addresses(s: &str) -> String {
    ADDRESS.replace_all(s, "***@${1}").into_owned()
}
