use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace pattern"));
static NON_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("static key pattern"));

/// Canonical column key: trimmed, lowercase, whitespace runs as `_`, only `[a-z0-9_]` kept.
///
/// `"Data do Acidente"` becomes `data_do_acidente`; `"Situação"` becomes `situao`.
pub fn standardize_header(label: &str) -> String {
    let trimmed = label.trim().trim_start_matches('\u{feff}').trim();
    let lowered = trimmed.to_lowercase();
    let underscored = WHITESPACE_RUN.replace_all(&lowered, "_");
    NON_KEY_CHARS.replace_all(&underscored, "").into_owned()
}
