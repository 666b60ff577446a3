use crate::diff::result::ChangeEntry;

/// Format changes in the style of `uci changes`.
///
/// Lines are prefixed `+` (new section), `-` (removed section or option) or
/// `~` (option set).
pub fn format_text(entries: &[ChangeEntry]) -> String {
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            ChangeEntry::AddSection { kind, .. } => {
                lines.push(format!("+ {}={kind}", entry.path()));
            }
            ChangeEntry::RemoveSection { .. } | ChangeEntry::UnsetOption { .. } => {
                lines.push(format!("- {}", entry.path()));
            }
            ChangeEntry::SetOption { value, .. } => {
                lines.push(format!("~ {}={value}", entry.path()));
            }
        }
    }
    lines.join("\n")
}

/// Format a simple summary of change counts.
pub fn format_summary(entries: &[ChangeEntry]) -> String {
    let mut added = 0;
    let mut removed = 0;
    let mut set = 0;
    let mut unset = 0;

    for entry in entries {
        match entry {
            ChangeEntry::AddSection { .. } => added += 1,
            ChangeEntry::RemoveSection { .. } => removed += 1,
            ChangeEntry::SetOption { .. } => set += 1,
            ChangeEntry::UnsetOption { .. } => unset += 1,
        }
    }

    format!("added_sections={added} removed_sections={removed} set={set} unset={unset}")
}
