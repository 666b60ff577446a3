//! Transactional access to a set of UCI packages.
//!
//! [`ConfigStore`] is the narrow interface reconciliation code is written
//! against. [`StagedStore`] is the in-memory implementation: every mutation
//! lands in a staged copy of the packages, and the staged copy either
//! replaces the committed one as a unit ([`StagedStore::commit`]) or is
//! thrown away ([`StagedStore::discard`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::diff::{diff_packages, ChangeEntry};
use crate::parser::{parse_file, ParseError};
use crate::tree::{Package, Section};
use crate::value::OptionValue;
use crate::writer::{write_file, WriteError};

/// Errors raised by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed section does not exist.
    #[error("section {package}.{section} does not exist")]
    MissingSection { package: String, section: String },
    /// A named section with this id already exists.
    #[error("section {package}.{section} already exists")]
    DuplicateSection { package: String, section: String },
}

/// Errors raised while loading a config directory.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read config directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: ParseError },
}

/// Read/write access to UCI sections.
///
/// Reads return owned snapshots so callers can keep iterating over a result
/// while mutating the store.
pub trait ConfigStore {
    /// Return one section.
    fn section(&self, package: &str, section: &str) -> Option<Section>;

    /// Return the sections of a package, optionally filtered by type, in
    /// store order.
    fn sections(&self, package: &str, kind: Option<&str>) -> Vec<Section>;

    /// Set an option on an existing section.
    fn set(
        &mut self,
        package: &str,
        section: &str,
        option: &str,
        value: OptionValue,
    ) -> Result<(), StoreError>;

    /// Remove an option. Missing sections or options are ignored.
    fn unset(&mut self, package: &str, section: &str, option: &str);

    /// Add a section and return its id. Anonymous when `name` is `None`.
    fn add(&mut self, package: &str, kind: &str, name: Option<&str>) -> Result<String, StoreError>;

    /// Remove a whole section. Returns false if it did not exist.
    fn delete(&mut self, package: &str, section: &str) -> bool;

    fn get(&self, package: &str, section: &str, option: &str) -> Option<OptionValue> {
        self.section(package, section)?.get(option).cloned()
    }

    /// Option as a single string (first entry for lists).
    fn get_str(&self, package: &str, section: &str, option: &str) -> Option<String> {
        self.get(package, section, option)
            .and_then(|v| v.as_scalar().map(ToString::to_string))
    }

    /// Option as a list; missing options yield an empty list.
    fn get_list(&self, package: &str, section: &str, option: &str) -> Vec<String> {
        self.get(package, section, option)
            .map(|v| v.as_list())
            .unwrap_or_default()
    }

    fn set_str(
        &mut self,
        package: &str,
        section: &str,
        option: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.set(package, section, option, OptionValue::from(value))
    }

    fn set_list(
        &mut self,
        package: &str,
        section: &str,
        option: &str,
        values: &[String],
    ) -> Result<(), StoreError> {
        self.set(package, section, option, OptionValue::List(values.to_vec()))
    }

    /// [`ConfigStore::set_list`] that keeps an existing `option` line as one
    /// while `values` has a single entry.
    fn set_list_keeping_form(
        &mut self,
        package: &str,
        section: &str,
        option: &str,
        values: &[String],
    ) -> Result<(), StoreError> {
        let value = match self.get(package, section, option) {
            Some(current) => current.with_values(values),
            None => OptionValue::List(values.to_vec()),
        };
        self.set(package, section, option, value)
    }

    /// First section of a type, like `uci get package.@type[0]`.
    fn first_section(&self, package: &str, kind: &str) -> Option<Section> {
        self.sections(package, Some(kind)).into_iter().next()
    }
}

/// In-memory store with a committed and a staged view of every package.
#[derive(Debug, Clone, Default)]
pub struct StagedStore {
    committed: BTreeMap<String, Package>,
    staged: BTreeMap<String, Package>,
}

impl StagedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed state is `packages`.
    pub fn from_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let committed: BTreeMap<String, Package> = packages
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self {
            staged: committed.clone(),
            committed,
        }
    }

    /// Load every UCI file in `dir` (hidden files are skipped).
    pub fn load_dir(dir: &Path) -> Result<Self, LoadError> {
        let io_err = |source| LoadError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(true, |n| n.starts_with('.'));
            if path.is_file() && !hidden {
                paths.push(path);
            }
        }
        paths.sort();

        let mut packages = Vec::with_capacity(paths.len());
        for path in paths {
            let package = parse_file(&path).map_err(|source| LoadError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            packages.push(package);
        }
        Ok(Self::from_packages(packages))
    }

    /// Write every package of the staged view into `dir`, one file each.
    pub fn write_dir(&self, dir: &Path) -> Result<(), WriteError> {
        fs::create_dir_all(dir)?;
        for package in self.staged.values() {
            write_file(package, &dir.join(&package.name))?;
        }
        Ok(())
    }

    /// Staged view of one package.
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.staged.get(name)
    }

    /// Committed view of one package.
    pub fn committed_package(&self, name: &str) -> Option<&Package> {
        self.committed.get(name)
    }

    /// All staged packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.staged.values()
    }

    /// Pending changes, package by package.
    pub fn changes(&self) -> Vec<ChangeEntry> {
        let names: BTreeSet<&String> = self.committed.keys().chain(self.staged.keys()).collect();
        let mut out = Vec::new();
        for name in names {
            let empty = Package::new(name.as_str());
            let before = self.committed.get(name).unwrap_or(&empty);
            let after = self.staged.get(name).unwrap_or(&empty);
            out.extend(diff_packages(before, after));
        }
        out
    }

    pub fn has_changes(&self) -> bool {
        self.committed != self.staged
    }

    /// Make the staged view the committed one.
    pub fn commit(&mut self) {
        self.committed = self.staged.clone();
    }

    /// Drop every staged change.
    pub fn discard(&mut self) {
        self.staged = self.committed.clone();
    }

    fn staged_section_mut(&mut self, package: &str, section: &str) -> Option<&mut Section> {
        self.staged.get_mut(package)?.section_mut(section)
    }
}

impl ConfigStore for StagedStore {
    fn section(&self, package: &str, section: &str) -> Option<Section> {
        self.staged.get(package)?.section(section).cloned()
    }

    fn sections(&self, package: &str, kind: Option<&str>) -> Vec<Section> {
        let Some(pkg) = self.staged.get(package) else {
            return Vec::new();
        };
        pkg.sections
            .iter()
            .filter(|s| kind.map_or(true, |k| s.kind == k))
            .cloned()
            .collect()
    }

    /// Setting an empty list removes the option, as `uci` does.
    fn set(
        &mut self,
        package: &str,
        section: &str,
        option: &str,
        value: OptionValue,
    ) -> Result<(), StoreError> {
        let target = self
            .staged_section_mut(package, section)
            .ok_or_else(|| StoreError::MissingSection {
                package: package.to_string(),
                section: section.to_string(),
            })?;
        if value.is_empty() {
            target.unset(option);
        } else {
            target.set(option, value);
        }
        Ok(())
    }

    fn unset(&mut self, package: &str, section: &str, option: &str) {
        if let Some(target) = self.staged_section_mut(package, section) {
            target.unset(option);
        }
    }

    fn add(&mut self, package: &str, kind: &str, name: Option<&str>) -> Result<String, StoreError> {
        let pkg = self
            .staged
            .entry(package.to_string())
            .or_insert_with(|| Package::new(package));
        let section = match name {
            Some(name) => {
                if pkg.section(name).is_some() {
                    return Err(StoreError::DuplicateSection {
                        package: package.to_string(),
                        section: name.to_string(),
                    });
                }
                Section::new(name, kind, false)
            }
            None => Section::new(pkg.next_anonymous_id(), kind, true),
        };
        let id = section.id.clone();
        pkg.sections.push(section);
        Ok(id)
    }

    fn delete(&mut self, package: &str, section: &str) -> bool {
        let Some(pkg) = self.staged.get_mut(package) else {
            return false;
        };
        let before = pkg.sections.len();
        pkg.sections.retain(|s| s.id != section);
        pkg.sections.len() != before
    }
}
