use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::tree::{Package, Section};
use crate::value::OptionValue;

/// Errors that can occur while parsing UCI text into a [`Package`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// A line could not be understood.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    /// Failed to read input file.
    #[error("failed to read UCI file: {0}")]
    Io(#[from] std::io::Error),
    /// The file name does not give a usable package name.
    #[error("cannot derive package name from path {0}")]
    PackageName(String),
}

/// Parse UCI text into a [`Package`] named `name`.
pub fn parse(name: &str, input: &str) -> Result<Package, ParseError> {
    let mut package = Package::new(name);
    let mut current: Option<usize> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let tokens = tokenize(raw, line)?;
        let Some((keyword, args)) = tokens.split_first() else {
            continue;
        };

        match keyword.as_str() {
            "package" => {}
            "config" => {
                let (kind, id) = match args {
                    [kind] => (kind.clone(), None),
                    [kind, id] => (kind.clone(), Some(id.clone())),
                    _ => return Err(syntax(line, "expected `config <type> ['name']`")),
                };
                current = Some(open_section(&mut package, kind, id));
            }
            "option" | "list" => {
                let Some(section_idx) = current else {
                    return Err(syntax(line, "option outside of a config section"));
                };
                let [option, value] = args else {
                    return Err(syntax(line, format!("expected `{keyword} <name> <value>`")));
                };
                let section = &mut package.sections[section_idx];
                if keyword == "option" {
                    section.set(option, OptionValue::Scalar(value.clone()));
                } else {
                    append_list(section, option, value.clone());
                }
            }
            other => return Err(syntax(line, format!("unknown keyword '{other}'"))),
        }
    }

    Ok(package)
}

/// Parse a UCI file; the package name is the file name.
pub fn parse_file(path: &Path) -> Result<Package, ParseError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && !n.starts_with('.'))
        .ok_or_else(|| ParseError::PackageName(path.display().to_string()))?;
    let raw = fs::read_to_string(path)?;
    parse(name, &raw)
}

/// Open a new section, or reopen an existing named one (UCI merges repeated
/// `config` blocks that share a name).
fn open_section(package: &mut Package, kind: String, id: Option<String>) -> usize {
    if let Some(id) = &id {
        if let Some(pos) = package.sections.iter().position(|s| &s.id == id) {
            return pos;
        }
    }
    let section = match id {
        Some(id) => Section::new(id, kind, false),
        None => Section::new(package.next_anonymous_id(), kind, true),
    };
    package.sections.push(section);
    package.sections.len() - 1
}

fn append_list(section: &mut Section, option: &str, value: String) {
    let mut items = match section.get(option) {
        Some(OptionValue::List(items)) => items.clone(),
        Some(OptionValue::Scalar(existing)) => vec![existing.clone()],
        None => Vec::new(),
    };
    items.push(value);
    section.set(option, OptionValue::List(items));
}

/// Split one line into shell-like words.
///
/// Single quotes are literal, double quotes honour backslash escapes, and
/// adjacent fragments join into one word (`'it'\''s'`). A `#` outside quotes
/// at a word boundary starts a comment.
fn tokenize(line: &str, line_no: usize) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            '#' if current.is_none() => break,
            '\'' => {
                let buf = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => buf.push(c),
                        None => return Err(syntax(line_no, "unterminated single quote")),
                    }
                }
            }
            '"' => {
                let buf = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => buf.push(c),
                            None => return Err(syntax(line_no, "dangling escape")),
                        },
                        Some(c) => buf.push(c),
                        None => return Err(syntax(line_no, "unterminated double quote")),
                    }
                }
            }
            '\\' => match chars.next() {
                Some(c) => current.get_or_insert_with(String::new).push(c),
                None => return Err(syntax(line_no, "dangling escape")),
            },
            c => current.get_or_insert_with(String::new).push(c),
        }
    }

    if let Some(token) = current {
        tokens.push(token);
    }
    Ok(tokens)
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, ParseError};
    use crate::value::OptionValue;

    #[test]
    fn parses_named_anonymous_and_list_options() {
        let package = parse(
            "network",
            r#"
config interface 'lan'
	option device 'br-lan'
	option proto static

# a bridge
config device
	option name "br-lan"
	list ports 'eth0'
	list ports 'eth1'
"#,
        )
        .expect("parse");

        assert_eq!(package.sections.len(), 2);
        let lan = package.section("lan").expect("lan");
        assert!(!lan.anonymous);
        assert_eq!(lan.get_str("proto"), Some("static"));

        let bridge = &package.sections[1];
        assert!(bridge.anonymous);
        assert_eq!(
            bridge.get("ports"),
            Some(&OptionValue::list(["eth0", "eth1"]))
        );
    }

    #[test]
    fn joins_adjacent_quoted_fragments() {
        let package = parse("wireless", "config wifi-iface 'x'\n\toption ssid 'it'\\''s'\n")
            .expect("parse");
        assert_eq!(
            package.section("x").and_then(|s| s.get_str("ssid")),
            Some("it's")
        );
    }

    #[test]
    fn rejects_option_before_section() {
        let err = parse("network", "option proto dhcp\n").expect_err("should fail");
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn rejects_unterminated_quote() {
        let err = parse("network", "config interface 'lan\n").expect_err("should fail");
        assert!(err.to_string().contains("unterminated"));
    }
}
