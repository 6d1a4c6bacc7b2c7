//! Typed views over sections of the installer configuration.
//!
//! A view only borrows the document; every property is converted from the
//! stored string when it is read.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use super::base::{Document, OptionValue};
use super::error::ConfigurationDataError;

/// A view bound to one named section of a [`Document`].
pub trait SectionView<'a>: Sized {
    const SECTION: &'static str;

    fn new(doc: &'a Document) -> Self;

    fn document(&self) -> &'a Document;

    fn get<T: OptionValue>(&self, option: &str) -> Result<T, ConfigurationDataError> {
        self.document().get(Self::SECTION, option)
    }
}

/// Non-empty trimmed lines of a multi-line option value.
fn option_lines(value: &str) -> impl Iterator<Item = &str> {
    value.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Parse every line of a multi-line option with `parse`.
pub(crate) fn parse_option_lines<T>(
    doc: &Document,
    section: &str,
    option: &str,
    parse: impl Fn(&str) -> anyhow::Result<T>,
) -> Result<Vec<T>, ConfigurationDataError> {
    let raw: String = doc.get(section, option)?;
    option_lines(&raw)
        .map(|l| parse(l).map_err(|e| ConfigurationDataError::new(section, option, format!("{e:#}"))))
        .collect()
}

macro_rules! section_view {
    ($(#[$meta:meta])* $name:ident, $section:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a> {
            doc: &'a Document,
        }

        impl<'a> SectionView<'a> for $name<'a> {
            const SECTION: &'static str = $section;

            fn new(doc: &'a Document) -> Self {
                Self { doc }
            }

            fn document(&self) -> &'a Document {
                self.doc
            }
        }
    };
}

section_view!(
    /// The `[Installer]` section.
    InstallerSection,
    "Installer"
);

impl InstallerSection<'_> {
    /// Run the installer in debugging mode.
    pub fn debug(&self) -> Result<bool, ConfigurationDataError> {
        self.get("debug")
    }

    /// Service modules handling kickstart commands.
    pub fn kickstart_modules(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("kickstart_modules")
    }

    pub fn forbidden_modules(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("forbidden_modules")
    }

    pub fn optional_modules(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("optional_modules")
    }
}

/// What kind of system is being installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Hardware,
    Image,
    Directory,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Hardware => "HARDWARE",
            TargetType::Image => "IMAGE",
            TargetType::Directory => "DIRECTORY",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "HARDWARE" => Ok(Self::Hardware),
            "IMAGE" => Ok(Self::Image),
            "DIRECTORY" => Ok(Self::Directory),
            o => Err(anyhow!("Unknown installation target type {o:?}")),
        }
    }
}

impl OptionValue for TargetType {
    fn from_option_value(value: &str) -> Result<Self, String> {
        value.parse().map_err(|e| format!("{e:#}"))
    }

    fn to_option_value(&self) -> String {
        self.as_str().to_owned()
    }
}

section_view!(
    /// The `[Installation Target]` section.
    TargetSection,
    "Installation Target"
);

impl TargetSection<'_> {
    pub fn target_type(&self) -> Result<TargetType, ConfigurationDataError> {
        self.get("type")
    }

    /// Where the physical root of the target is mounted.
    pub fn physical_root(&self) -> Result<String, ConfigurationDataError> {
        self.get("physical_root")
    }

    /// Where the system root of the target is mounted.
    pub fn system_root(&self) -> Result<String, ConfigurationDataError> {
        self.get("system_root")
    }

    pub fn can_configure_network(&self) -> Result<bool, ConfigurationDataError> {
        self.get("can_configure_network")
    }

    pub fn is_hardware(&self) -> Result<bool, ConfigurationDataError> {
        Ok(self.target_type()? == TargetType::Hardware)
    }

    pub fn is_image(&self) -> Result<bool, ConfigurationDataError> {
        Ok(self.target_type()? == TargetType::Image)
    }

    pub fn is_directory(&self) -> Result<bool, ConfigurationDataError> {
        Ok(self.target_type()? == TargetType::Directory)
    }
}

section_view!(
    /// The `[Payload]` section.
    PayloadSection,
    "Payload"
);

impl PayloadSection<'_> {
    /// The installation source used when none is specified.
    pub fn default_source(&self) -> Result<String, ConfigurationDataError> {
        self.get("default_source")
    }

    pub fn enable_updates(&self) -> Result<bool, ConfigurationDataError> {
        self.get("enable_updates")
    }

    pub fn default_rpm_gpg_keys(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("default_rpm_gpg_keys")
    }

    pub fn ignored_packages(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("ignored_packages")
    }
}

section_view!(
    /// The `[Security]` section.
    SecuritySection,
    "Security"
);

impl SecuritySection<'_> {
    /// The SELinux mode as an integer: -1 keeps the default of the target,
    /// 0 disables, 1 enforces and 2 is permissive.
    pub fn selinux(&self) -> Result<i64, ConfigurationDataError> {
        self.get("selinux")
    }
}

section_view!(
    /// The `[Bootloader]` section.
    BootloaderSection,
    "Bootloader"
);

impl BootloaderSection<'_> {
    pub fn bootloader_type(&self) -> Result<String, ConfigurationDataError> {
        self.get("type")
    }

    pub fn menu_auto_hide(&self) -> Result<bool, ConfigurationDataError> {
        self.get("menu_auto_hide")
    }

    /// Kernel arguments of the installer that are kept for the target.
    pub fn preserved_arguments(&self) -> Result<Vec<String>, ConfigurationDataError> {
        self.get("preserved_arguments")
    }

    pub fn nonibft_iscsi_boot(&self) -> Result<bool, ConfigurationDataError> {
        self.get("nonibft_iscsi_boot")
    }
}
