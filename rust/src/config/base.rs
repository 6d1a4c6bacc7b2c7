//! The INI document model, typed option access and the layered
//! configuration that merges several files on top of each other.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write as _;

use ini::{Ini, ParseOption};

use super::error::{ConfigurationDataError, ConfigurationFileError};

/// Only files with this suffix are picked up from configuration directories.
pub const CONFIG_SUFFIX: &str = ".conf";

/// Continuation lines of multi-line values are written with this indent.
const CONTINUATION_INDENT: &str = "    ";

fn parse_option() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..Default::default()
    }
}

/// A value that can be stored in a configuration option.
///
/// Options are always kept as strings in the document; conversion happens
/// only when a value is read or assigned.
pub trait OptionValue: Sized {
    fn from_option_value(value: &str) -> Result<Self, String>;
    fn to_option_value(&self) -> String;
}

impl OptionValue for String {
    fn from_option_value(value: &str) -> Result<Self, String> {
        Ok(value.to_owned())
    }

    fn to_option_value(&self) -> String {
        self.clone()
    }
}

impl OptionValue for i64 {
    fn from_option_value(value: &str) -> Result<Self, String> {
        value
            .parse()
            .map_err(|e| format!("invalid integer {value:?}: {e}"))
    }

    fn to_option_value(&self) -> String {
        self.to_string()
    }
}

/// Only the canonical spellings are accepted.
impl OptionValue for bool {
    fn from_option_value(value: &str) -> Result<Self, String> {
        match value {
            "True" => Ok(true),
            "False" => Ok(false),
            o => Err(format!("invalid boolean {o:?}; expected True or False")),
        }
    }

    fn to_option_value(&self) -> String {
        if *self { "True" } else { "False" }.to_owned()
    }
}

/// Whitespace and comma separated words.
impl OptionValue for Vec<String> {
    fn from_option_value(value: &str) -> Result<Self, String> {
        Ok(value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn to_option_value(&self) -> String {
        self.join(" ")
    }
}

/// A parsed INI document: sections of options, all values strings.
#[derive(Debug, Clone)]
pub struct Document {
    ini: Ini,
}

impl Default for Document {
    fn default() -> Self {
        Self { ini: Ini::new() }
    }
}

/// Parse the configuration file at `path`.
pub fn read_config(path: &Utf8Path) -> Result<Document, ConfigurationFileError> {
    Ini::load_from_file_opt(path, parse_option())
        .map(|ini| Document { ini })
        .map_err(|e| ConfigurationFileError::new(path, e))
}

/// Serialize `doc` into the file at `path`.
pub fn write_config(doc: &Document, path: &Utf8Path) -> Result<(), ConfigurationFileError> {
    std::fs::write(path, doc.render()).map_err(|e| ConfigurationFileError::new(path, e))
}

fn indent_continuation_lines(v: &str) -> String {
    v.split('\n')
        .collect::<Vec<_>>()
        .join(&format!("\n{CONTINUATION_INDENT}"))
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from a string; mostly useful for tests and tooling.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let ini = Ini::load_from_str_opt(s, parse_option())?;
        Ok(Self { ini })
    }

    /// The document as INI text. Sections, empty ones included, are
    /// separated by a blank line; values are written unescaped.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (section, props) in self.ini.iter() {
            let Some(section) = section else {
                // Options outside of any section.
                for (k, v) in props.iter() {
                    let _ = writeln!(out, "{k} = {}", indent_continuation_lines(v));
                }
                continue;
            };
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{section}]");
            for (k, v) in props.iter() {
                let _ = writeln!(out, "{k} = {}", indent_continuation_lines(v));
            }
        }
        out
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.ini.section(Some(section)).is_some()
    }

    /// Names of all sections, in document order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.ini.sections().flatten()
    }

    /// The stored string of an option.
    pub fn raw(&self, section: &str, option: &str) -> Result<&str, ConfigurationDataError> {
        let props = self
            .ini
            .section(Some(section))
            .ok_or_else(|| ConfigurationDataError::new(section, option, "No such section"))?;
        props
            .get(option)
            .ok_or_else(|| ConfigurationDataError::new(section, option, "No such option"))
    }

    /// Read an option converted to `T`.
    pub fn get<T: OptionValue>(&self, section: &str, option: &str) -> Result<T, ConfigurationDataError> {
        let raw = self.raw(section, option)?;
        T::from_option_value(raw).map_err(|reason| ConfigurationDataError::new(section, option, reason))
    }

    pub fn get_string(&self, section: &str, option: &str) -> Result<String, ConfigurationDataError> {
        self.get(section, option)
    }

    pub fn get_int(&self, section: &str, option: &str) -> Result<i64, ConfigurationDataError> {
        self.get(section, option)
    }

    pub fn get_bool(&self, section: &str, option: &str) -> Result<bool, ConfigurationDataError> {
        self.get(section, option)
    }

    pub fn get_list(&self, section: &str, option: &str) -> Result<Vec<String>, ConfigurationDataError> {
        self.get(section, option)
    }

    /// Assign an existing option. Unknown sections and options are errors;
    /// use [`Document::set_raw`] to create new ones.
    pub fn set<T: OptionValue>(
        &mut self,
        section: &str,
        option: &str,
        value: T,
    ) -> Result<(), ConfigurationDataError> {
        let props = self
            .ini
            .section_mut(Some(section))
            .ok_or_else(|| ConfigurationDataError::new(section, option, "No such section"))?;
        if !props.contains_key(option) {
            return Err(ConfigurationDataError::new(section, option, "No such option"));
        }
        props.insert(option, value.to_option_value());
        Ok(())
    }

    /// Store a string, creating the section and option as needed.
    pub fn set_raw(&mut self, section: &str, option: &str, value: &str) {
        self.ini.with_section(Some(section)).set(option, value);
    }

    /// Returns `true` if the option existed.
    pub fn remove_option(&mut self, section: &str, option: &str) -> bool {
        self.ini
            .section_mut(Some(section))
            .and_then(|props| props.remove(option))
            .is_some()
    }

    /// Returns `true` if the section existed.
    pub fn remove_section(&mut self, section: &str) -> bool {
        self.ini.delete(Some(section)).is_some()
    }

    /// Overlay every option of `other` onto this document. Options and
    /// sections missing from `other` are left untouched.
    pub fn merge(&mut self, other: &Document) {
        for (section, props) in other.ini.iter() {
            // Sections without options are carried over too.
            let target = self
                .ini
                .entry(section.map(Into::into))
                .or_insert_with(Default::default);
            for (k, v) in props.iter() {
                target.insert(k, v);
            }
        }
    }
}

/// Configuration files with `.conf` suffix directly inside `dir`, sorted
/// by name. A missing directory yields nothing.
fn config_files_in(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ConfigurationFileError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = dir
        .read_dir_utf8()
        .map_err(|e| ConfigurationFileError::new(dir, e))?;
    let mut r = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigurationFileError::new(dir, e))?;
        let path = entry.path();
        if entry.file_name().ends_with(CONFIG_SUFFIX) && path.is_file() {
            r.push(path.to_owned());
        }
    }
    r.sort();
    Ok(r)
}

/// A document built by merging configuration sources in order.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    document: Document,
    sources: Vec<Utf8PathBuf>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Every merged file, oldest first.
    pub fn get_sources(&self) -> &[Utf8PathBuf] {
        &self.sources
    }

    /// Merge one file. The file must exist.
    pub fn read(&mut self, path: &Utf8Path) -> Result<(), ConfigurationFileError> {
        let doc = read_config(path)?;
        tracing::debug!("Merging configuration from {path}");
        self.document.merge(&doc);
        self.sources.push(path.to_owned());
        Ok(())
    }

    /// Merge all `.conf` files of `dir` in lexicographic order.
    pub fn read_from_directory(&mut self, dir: &Utf8Path) -> Result<(), ConfigurationFileError> {
        for path in config_files_in(dir)? {
            self.read(&path)?;
        }
        Ok(())
    }

    /// Replace the configuration with the given files and directories,
    /// merged in order. Nonexistent entries are skipped. On failure the
    /// previous state is kept.
    pub fn set_from_files<P: AsRef<Utf8Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<(), ConfigurationFileError> {
        let mut next = Configuration::new();
        for path in paths.iter().map(AsRef::as_ref) {
            if path.is_dir() {
                next.read_from_directory(path)?;
            } else if path.exists() {
                next.read(path)?;
            } else {
                tracing::debug!("Skipping nonexistent configuration path {path}");
            }
        }
        *self = next;
        Ok(())
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), ConfigurationFileError> {
        write_config(&self.document, path)
    }
}
