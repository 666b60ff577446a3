use std::collections::HashSet;

use crate::diff::result::ChangeEntry;
use crate::tree::{Package, Section};

/// Configures change detection.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Dotted paths (`package`, `package.section` or
    /// `package.section.option`) or bare option names to ignore.
    pub ignore_paths: Vec<String>,
}

/// Compute the changes that turn `before` into `after`.
pub fn diff_packages(before: &Package, after: &Package) -> Vec<ChangeEntry> {
    diff_packages_with_options(before, after, &DiffOptions::default())
}

/// Compute the changes that turn `before` into `after`, with custom options.
///
/// Sections are matched by id. A section whose type changed is reported as a
/// removal followed by a fresh addition.
pub fn diff_packages_with_options(
    before: &Package,
    after: &Package,
    opts: &DiffOptions,
) -> Vec<ChangeEntry> {
    let package = after.name.as_str();
    let mut out = Vec::new();
    if should_ignore(package, opts) {
        return out;
    }

    let after_ids: HashSet<&str> = after.sections.iter().map(|s| s.id.as_str()).collect();
    for old in &before.sections {
        if !after_ids.contains(old.id.as_str()) && !should_ignore(&section_path(package, old), opts)
        {
            out.push(ChangeEntry::RemoveSection {
                package: package.to_string(),
                section: old.id.clone(),
            });
        }
    }

    for new in &after.sections {
        if should_ignore(&section_path(package, new), opts) {
            continue;
        }
        match before.section(&new.id) {
            Some(old) if old.kind == new.kind => diff_options(package, old, new, opts, &mut out),
            Some(_) => {
                out.push(ChangeEntry::RemoveSection {
                    package: package.to_string(),
                    section: new.id.clone(),
                });
                push_added(package, new, opts, &mut out);
            }
            None => push_added(package, new, opts, &mut out),
        }
    }

    out
}

fn push_added(package: &str, section: &Section, opts: &DiffOptions, out: &mut Vec<ChangeEntry>) {
    out.push(ChangeEntry::AddSection {
        package: package.to_string(),
        section: section.id.clone(),
        kind: section.kind.clone(),
    });
    let empty = Section::new(section.id.clone(), section.kind.clone(), section.anonymous);
    diff_options(package, &empty, section, opts, out);
}

fn diff_options(
    package: &str,
    old: &Section,
    new: &Section,
    opts: &DiffOptions,
    out: &mut Vec<ChangeEntry>,
) {
    for (option, value) in &new.options {
        if should_ignore_option(package, &new.id, option, opts) {
            continue;
        }
        let previous = old.get(option);
        if previous == Some(value) {
            continue;
        }
        out.push(ChangeEntry::SetOption {
            package: package.to_string(),
            section: new.id.clone(),
            option: option.clone(),
            value: value.clone(),
            previous: previous.cloned(),
        });
    }

    for (option, value) in &old.options {
        if new.has(option) || should_ignore_option(package, &new.id, option, opts) {
            continue;
        }
        out.push(ChangeEntry::UnsetOption {
            package: package.to_string(),
            section: new.id.clone(),
            option: option.clone(),
            previous: value.clone(),
        });
    }
}

fn section_path(package: &str, section: &Section) -> String {
    format!("{package}.{}", section.id)
}

fn should_ignore_option(package: &str, section: &str, option: &str, opts: &DiffOptions) -> bool {
    opts.ignore_paths.iter().any(|ignore| ignore == option)
        || should_ignore(&format!("{package}.{section}.{option}"), opts)
}

fn should_ignore(path: &str, opts: &DiffOptions) -> bool {
    opts.ignore_paths
        .iter()
        .any(|ignore| path == ignore || path.starts_with(&format!("{ignore}.")))
}
