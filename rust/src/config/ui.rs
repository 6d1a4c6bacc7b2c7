//! The `[User Interface]` section and its password policy lines.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{anyhow, bail, Result};

use super::base::Document;
use super::error::ConfigurationDataError;
use super::sections::{parse_option_lines, SectionView};

/// Password requirements for one kind of password, for example
/// `root (quality 1, length 6)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub name: String,
    /// Minimal quality as computed by libpwquality.
    pub quality: u32,
    pub length: u32,
    /// Allow an empty password.
    pub empty: bool,
    /// Refuse weak passwords instead of warning.
    pub strict: bool,
}

fn parse_number(key: &str, value: Option<&str>) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("Missing value of the attribute {key:?}"))?;
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value of the attribute {key:?}: {e}"))
}

impl PasswordPolicy {
    /// Parse `NAME (quality Q, length L[, empty][, strict])`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = line
            .split_once('(')
            .ok_or_else(|| anyhow!("Missing attributes of the password policy: {line:?}"))?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            bail!("Invalid password policy name in {line:?}");
        }
        let attrs = rest
            .strip_suffix(')')
            .ok_or_else(|| anyhow!("Missing ')' in password policy: {line:?}"))?;

        let mut quality = None;
        let mut length = None;
        let mut empty = false;
        let mut strict = false;
        for attr in attrs.split(',') {
            let attr = attr.trim();
            let (key, value) = match attr.split_once(char::is_whitespace) {
                Some((k, v)) => (k, Some(v)),
                None => (attr, None),
            };
            match (key, value) {
                ("quality", v) if quality.is_none() => quality = Some(parse_number(key, v)?),
                ("length", v) if length.is_none() => length = Some(parse_number(key, v)?),
                ("empty", None) if !empty => empty = true,
                ("strict", None) if !strict => strict = true,
                _ => bail!("Invalid attribute {attr:?} in password policy: {line:?}"),
            }
        }
        Ok(Self {
            name: name.to_owned(),
            quality: quality.ok_or_else(|| anyhow!("Missing quality in {line:?}"))?,
            length: length.ok_or_else(|| anyhow!("Missing length in {line:?}"))?,
            empty,
            strict,
        })
    }
}

/// Typed view of the `[User Interface]` section.
#[derive(Debug, Clone, Copy)]
pub struct UserInterfaceSection<'a> {
    doc: &'a Document,
}

impl<'a> SectionView<'a> for UserInterfaceSection<'a> {
    const SECTION: &'static str = "User Interface";

    fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    fn document(&self) -> &'a Document {
        self.doc
    }
}

impl UserInterfaceSection<'_> {
    pub fn custom_stylesheet(&self) -> Result<Option<String>, ConfigurationDataError> {
        let v: String = self.get("custom_stylesheet")?;
        Ok(Some(v).filter(|v| !v.is_empty()))
    }

    pub fn hidden_spokes(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("hidden_spokes")
    }

    pub fn password_policies(&self) -> Result<Vec<PasswordPolicy>, ConfigurationDataError> {
        parse_option_lines(self.doc, Self::SECTION, "password_policies", PasswordPolicy::parse)
    }

    pub fn decorated_window(&self) -> Result<bool, ConfigurationDataError> {
        self.get("decorated_window")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_convert_password_policy() {
        assert_eq!(
            PasswordPolicy::parse("root (quality 100, length 10, empty, strict)").unwrap(),
            PasswordPolicy {
                name: "root".into(),
                quality: 100,
                length: 10,
                empty: true,
                strict: true,
            }
        );
        assert_eq!(
            PasswordPolicy::parse("luks (quality 100, length 10)").unwrap(),
            PasswordPolicy {
                name: "luks".into(),
                quality: 100,
                length: 10,
                empty: false,
                strict: false,
            }
        );
    }

    #[test]
    fn test_convert_password_policy_err() {
        let errs = [
            "",
            "root",
            "(empty)",
            "user (quality)",
            "user (invalid 100)",
            // Missing length.
            "user (quality 100)",
            // Missing quality.
            "user (length 10)",
            "user (quality 1, length 6, empty yes)",
            "user (quality 1, length 6, empty, empty)",
            "user (quality -1, length 6)",
        ];
        for line in errs {
            assert!(PasswordPolicy::parse(line).is_err(), "{line}");
        }
    }

    #[test]
    fn test_section() {
        let doc = Document::parse(indoc! {"
            [User Interface]
            custom_stylesheet =
            hidden_spokes =
            password_policies =
                root (quality 1, length 6)
                user (quality 1, length 6, empty)
            decorated_window = False
        "})
        .unwrap();
        let ui = UserInterfaceSection::new(&doc);
        assert_eq!(ui.custom_stylesheet().unwrap(), None);
        assert!(ui.hidden_spokes().unwrap().is_empty());
        let policies = ui.password_policies().unwrap();
        assert_eq!(policies.len(), 2);
        assert!(!policies[0].empty);
        assert!(policies[1].empty);
    }
}
