//! Generic UCI configuration primitives used by higher-level tools.
//!
//! Parsing and writing of the `/etc/config` text format, a staged in-memory
//! store behind the [`ConfigStore`] trait, and change tracking between two
//! versions of a package.

pub mod diff;
pub mod format;
pub mod parser;
pub mod store;
pub mod tree;
pub mod value;
pub mod writer;

pub use diff::{diff_packages, diff_packages_with_options, ChangeEntry, DiffOptions};
pub use format::{format_json, format_summary, format_text};
pub use parser::{parse, parse_file, ParseError};
pub use store::{ConfigStore, LoadError, StagedStore, StoreError};
pub use tree::{Package, Section};
pub use value::OptionValue;
pub use writer::{write, write_file, WriteError};
