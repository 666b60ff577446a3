use crate::diff::result::ChangeEntry;

/// Format changes as JSON.
pub fn format_json(entries: &[ChangeEntry]) -> String {
    serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
}
