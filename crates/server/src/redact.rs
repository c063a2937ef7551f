/// Redact a credential for diagnostics: reveal at most the first four
/// characters, never the full value.
///
/// Safe on short and non-ASCII inputs; anything at or below the visible
/// length is masked entirely.
pub(crate) fn redact(value: &str) -> String {
    const VISIBLE: usize = 4;

    if value.chars().count() <= VISIBLE {
        return "****".to_owned();
    }

    let prefix: String = value.chars().take(VISIBLE).collect();
    format!("{prefix}****")
}
