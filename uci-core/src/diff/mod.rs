//! Change tracking between two versions of UCI packages.

pub mod engine;
pub mod result;

pub use engine::{diff_packages, diff_packages_with_options, DiffOptions};
pub use result::ChangeEntry;
