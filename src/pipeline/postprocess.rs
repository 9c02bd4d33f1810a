//! Post-processing: deterministic text rules applied around the engine.
//!
//! Two independent passes live here:
//!
//! * [`rewrite_image_references`] runs after publishing and points every
//!   `![alt](key)` link at the URL its image was published to.
//! * [`tidy_page_text`] runs inside the engine on each page's raw text before
//!   the document is assembled.
//!
//! ## Why regex rewriting and not a markdown parser?
//!
//! Only links whose target is *exactly* an extracted image key are touched;
//! everything else must come out byte-for-byte as the engine produced it.
//! Re-rendering through a parser would normalise unrelated markup.

use crate::pipeline::publish::ImageReferenceMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

/// Replace `![alt](key)` with `![alt](url)` for every entry of `refs`.
///
/// Keys are matched literally (regex metacharacters in keys are escaped) and
/// the alt text is preserved. Substitution runs once per entry in key order;
/// text without matching references is returned unchanged.
pub fn rewrite_image_references(text: &str, refs: &ImageReferenceMap) -> String {
    if text.is_empty() || refs.is_empty() {
        return text.to_string();
    }

    let mut output = text.to_string();
    for (key, url) in refs.iter() {
        let pattern = format!(r"!\[(.*?)\]\({}\)", regex::escape(key));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Skipping image key {:?}: {}", key, e);
                continue;
            }
        };
        if re.is_match(&output) {
            output = re
                .replace_all(&output, |caps: &Captures| format!("![{}]({})", &caps[1], url))
                .into_owned();
            debug!("Rewrote references to {}", key);
        }
    }
    output
}

/// Clean one page of extracted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens…)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Trim leading and trailing blank lines
pub fn tidy_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}
