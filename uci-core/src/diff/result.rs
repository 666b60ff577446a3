use serde::Serialize;

use crate::value::OptionValue;

/// A single staged change between two versions of a package.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ChangeEntry {
    /// Section only present in the newer version.
    AddSection {
        package: String,
        section: String,
        kind: String,
    },
    /// Section only present in the older version.
    RemoveSection { package: String, section: String },
    /// Option added or changed.
    SetOption {
        package: String,
        section: String,
        option: String,
        value: OptionValue,
        previous: Option<OptionValue>,
    },
    /// Option removed.
    UnsetOption {
        package: String,
        section: String,
        option: String,
        previous: OptionValue,
    },
}

impl ChangeEntry {
    /// Dotted UCI path of the change (`package.section[.option]`).
    pub fn path(&self) -> String {
        match self {
            Self::AddSection {
                package, section, ..
            }
            | Self::RemoveSection { package, section } => format!("{package}.{section}"),
            Self::SetOption {
                package,
                section,
                option,
                ..
            }
            | Self::UnsetOption {
                package,
                section,
                option,
                ..
            } => format!("{package}.{section}.{option}"),
        }
    }

    pub fn package(&self) -> &str {
        match self {
            Self::AddSection { package, .. }
            | Self::RemoveSection { package, .. }
            | Self::SetOption { package, .. }
            | Self::UnsetOption { package, .. } => package,
        }
    }
}
