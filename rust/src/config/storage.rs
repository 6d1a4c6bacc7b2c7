//! The `[Storage]` section and its partitioning lines.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{anyhow, bail, Result};

use super::base::Document;
use super::error::ConfigurationDataError;
use super::sections::{parse_option_lines, SectionView};
use crate::size::Size;

/// One entry of the default partitioning, for example
/// `/home (min 500 MiB, free 50 GiB)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSpec {
    pub name: String,
    pub size: Option<Size>,
    pub min: Option<Size>,
    pub max: Option<Size>,
    pub free: Option<Size>,
}

impl PartitionSpec {
    /// Parse a line of the form `NAME` or `NAME (KEY SIZE, ...)` where
    /// KEY is one of `size`, `min`, `max` and `free`.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, attrs) = match line.split_once('(') {
            Some((name, rest)) => {
                let attrs = rest
                    .strip_suffix(')')
                    .ok_or_else(|| anyhow!("Missing ')' in partitioning line: {line:?}"))?;
                (name.trim(), Some(attrs))
            }
            None => (line, None),
        };
        if name.is_empty() {
            bail!("The mount point is not specified: {line:?}");
        }
        if name.contains(char::is_whitespace) {
            bail!("Invalid mount point {name:?}");
        }
        let mut r = PartitionSpec {
            name: name.to_owned(),
            ..Default::default()
        };
        let Some(attrs) = attrs else {
            return Ok(r);
        };
        for attr in attrs.split(',') {
            let attr = attr.trim();
            let (key, value) = attr
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("Missing value of the attribute {attr:?}"))?;
            let value: Size = value.parse()?;
            let slot = match key {
                "size" => &mut r.size,
                "min" => &mut r.min,
                "max" => &mut r.max,
                "free" => &mut r.free,
                o => bail!("Invalid attribute {o:?} in partitioning line: {line:?}"),
            };
            if slot.replace(value).is_some() {
                bail!("Duplicate attribute {key:?} in partitioning line: {line:?}");
            }
        }
        if r.size.is_some() && (r.min.is_some() || r.max.is_some() || r.free.is_some()) {
            bail!("The attribute 'size' cannot be combined with other attributes: {line:?}");
        }
        if r.max.is_some() && r.min.is_none() {
            bail!("The attribute 'max' requires the attribute 'min': {line:?}");
        }
        Ok(r)
    }
}

/// Typed view of the `[Storage]` section.
#[derive(Debug, Clone, Copy)]
pub struct StorageSection<'a> {
    doc: &'a Document,
}

impl<'a> SectionView<'a> for StorageSection<'a> {
    const SECTION: &'static str = "Storage";

    fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    fn document(&self) -> &'a Document {
        self.doc
    }
}

impl StorageSection<'_> {
    /// Name of the default partitioning scheme, e.g. `LVM`.
    pub fn default_scheme(&self) -> Result<String, ConfigurationDataError> {
        self.get("default_scheme")
    }

    /// The default file system type, if the product overrides it.
    pub fn file_system_type(&self) -> Result<Option<String>, ConfigurationDataError> {
        let v: String = self.get("file_system_type")?;
        Ok(Some(v).filter(|v| !v.is_empty()))
    }

    pub fn default_partitioning(&self) -> Result<Vec<PartitionSpec>, ConfigurationDataError> {
        parse_option_lines(
            self.doc,
            Self::SECTION,
            "default_partitioning",
            PartitionSpec::parse,
        )
    }

    pub fn luks_version(&self) -> Result<String, ConfigurationDataError> {
        self.get("luks_version")
    }

    pub fn gpt(&self) -> Result<bool, ConfigurationDataError> {
        self.get("gpt")
    }

    pub fn multipath_friendly_names(&self) -> Result<bool, ConfigurationDataError> {
        self.get("multipath_friendly_names")
    }

    pub fn allow_imperfect_devices(&self) -> Result<bool, ConfigurationDataError> {
        self.get("allow_imperfect_devices")
    }
}
