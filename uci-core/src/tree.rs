use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::value::OptionValue;

/// One `config <type> ['name']` block of a UCI package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section identifier (`.name`). Store-assigned for anonymous sections.
    pub id: String,
    /// Section type (`.type`), e.g. `interface`, `zone`, `dnsmasq`.
    #[serde(rename = "type")]
    pub kind: String,
    /// True if the section had no name in the source file.
    pub anonymous: bool,
    /// Options in file order.
    pub options: Vec<(String, OptionValue)>,
}

impl Section {
    /// Create an empty section.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, anonymous: bool) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            anonymous,
            options: Vec::new(),
        }
    }

    /// Return the raw value of an option.
    pub fn get(&self, option: &str) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(name, _)| name == option)
            .map(|(_, value)| value)
    }

    /// Return an option as a single string (first entry for lists).
    pub fn get_str(&self, option: &str) -> Option<&str> {
        self.get(option).and_then(OptionValue::as_scalar)
    }

    /// Return an option as a list; missing options yield an empty list.
    pub fn get_list(&self, option: &str) -> Vec<String> {
        self.get(option).map(OptionValue::as_list).unwrap_or_default()
    }

    /// True if the option is present at all.
    pub fn has(&self, option: &str) -> bool {
        self.get(option).is_some()
    }

    /// Set an option, keeping its position if it already exists.
    pub fn set(&mut self, option: &str, value: OptionValue) {
        if let Some(slot) = self.options.iter_mut().find(|(name, _)| name == option) {
            slot.1 = value;
            return;
        }
        self.options.push((option.to_string(), value));
    }

    /// Remove an option, returning its previous value.
    pub fn unset(&mut self, option: &str) -> Option<OptionValue> {
        let idx = self.options.iter().position(|(name, _)| name == option)?;
        Some(self.options.remove(idx).1)
    }
}

/// A whole UCI package (one file under `/etc/config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub sections: Vec<Section>,
}

impl Package {
    /// Create an empty package.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::new(),
        }
    }

    /// Return the section with the given id.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Return a mutable reference to the section with the given id.
    pub fn section_mut(&mut self, id: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Return all sections of one type, in file order.
    pub fn sections_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    /// Pick an unused anonymous id of the form `cfgNNNNNN`.
    pub fn next_anonymous_id(&self) -> String {
        let mut n = self.sections.len() + 1;
        loop {
            let candidate = format!("cfg{n:06x}");
            if self.section(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "{}.{}={}", self.name, section.id, section.kind)?;
            for (option, value) in &section.options {
                writeln!(f, "{}.{}.{}={}", self.name, section.id, option, value)?;
            }
        }
        Ok(())
    }
}
