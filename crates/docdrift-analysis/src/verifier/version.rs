//! Version range handling for dependency and runtime claims.
//!
//! Manifest specifiers come in npm/Cargo/pip dialects; they are reduced to
//! the `semver` crate's comparator syntax before matching. Bare versions use
//! Cargo's default caret semantics.

use std::sync::OnceLock;

use regex::Regex;
use semver::{Version, VersionReq};

use docdrift_core::errors::VerificationError;

fn loose_version_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)(?:\.(\d+|[xX*]))?(?:\.(\d+|[xX*]))?(-[0-9A-Za-z.-]+)?").ok()
    })
    .as_ref()
}

/// Lowest concrete version a specifier admits: `^4.19.2` → 4.19.2,
/// `>=1.2 <2` → 1.2.0, `4.x` → 4.0.0. `None` for tags, URLs and `*`.
pub fn lowest_version(spec: &str) -> Option<Version> {
    let re = loose_version_re()?;
    let caps = re.captures(spec)?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let mut v = Version::new(part(1), part(2), part(3));
    if let Some(pre) = caps.get(4) {
        if let Ok(pre) = semver::Prerelease::new(pre.as_str().trim_start_matches('-')) {
            v.pre = pre;
        }
    }
    Some(v)
}

/// Parse a (possibly npm-flavoured) range into alternatives joined by `||`.
pub fn parse_range(range: &str) -> Result<Vec<VersionReq>, VerificationError> {
    let trimmed = range.trim();
    let invalid = |message: String| VerificationError::InvalidVersion {
        requirement: range.to_string(),
        message,
    };
    if trimmed.is_empty() || matches!(trimmed, "*" | "latest" | "x" | "X") {
        return Ok(vec![VersionReq::STAR]);
    }
    trimmed
        .split("||")
        .map(|alt| {
            let normalized = normalize_alternative(alt);
            VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))
        })
        .collect()
}

/// `4.18+` → `>=4.18`, `v1.2` → `1.2`, `1.2 - 2.3` → `>=1.2, <=2.3`,
/// `>=1 <2` → `>=1, <2`.
fn normalize_alternative(alt: &str) -> String {
    let alt = alt.trim();
    if let Some((lo, hi)) = alt.split_once(" - ") {
        return format!(">={}, <={}", strip_v(lo.trim()), strip_v(hi.trim()));
    }
    if let Some(base) = alt.strip_suffix('+') {
        return format!(">={}", strip_v(base.trim()));
    }
    let mut parts: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for tok in alt.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        if tok.chars().all(|c| "<>=~^".contains(c)) {
            pending_op.push_str(tok);
            continue;
        }
        let (op, rest) = split_operator(tok);
        parts.push(format!("{pending_op}{op}{}", strip_v(rest)));
        pending_op.clear();
    }
    parts.join(", ")
}

fn split_operator(tok: &str) -> (&str, &str) {
    let idx = tok
        .find(|c: char| !"<>=~^".contains(c))
        .unwrap_or(tok.len());
    tok.split_at(idx)
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix(['v', 'V']).unwrap_or(s)
}

/// Whether `range` admits `version`.
pub fn range_admits(range: &str, version: &Version) -> Result<bool, VerificationError> {
    Ok(parse_range(range)?.iter().any(|req| req.matches(version)))
}
