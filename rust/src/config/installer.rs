//! The installer configuration: default file, product overlays, schema
//! validation and typed sections.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use camino::{Utf8Path, Utf8PathBuf};

use super::base::{Configuration, Document, OptionValue};
use super::error::{ConfigurationDataError, ConfigurationError, ConfigurationFileError};
use super::product::find_product_overlays;
use super::sections::{
    parse_option_lines, BootloaderSection, InstallerSection, PayloadSection, SectionView,
    SecuritySection, TargetSection, TargetType,
};
use super::storage::{PartitionSpec, StorageSection};
use super::ui::{PasswordPolicy, UserInterfaceSection};

/// Where the installer configuration is installed.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/installkit";
/// Overrides [`DEFAULT_CONFIG_DIR`].
pub const CONFIG_DIR_ENV: &str = "INSTALLKIT_CONFIG_DIR";
/// The default configuration file inside the configuration directory.
pub const DEFAULT_CONFIG_FILE: &str = "installer.conf";

const NO_PRODUCT_WARNING: &str = "Unable to find any suitable configuration files for the detected product and variant names. No product configuration will be used.";

type OptionCheck = fn(&Document, &str, &str) -> Result<(), ConfigurationDataError>;

/// A required option of the installer configuration.
struct SchemaOption {
    section: &'static str,
    option: &'static str,
    check: OptionCheck,
}

fn check<T: OptionValue>(doc: &Document, section: &str, option: &str) -> Result<(), ConfigurationDataError> {
    doc.get::<T>(section, option).map(drop)
}

fn check_partitioning(doc: &Document, section: &str, option: &str) -> Result<(), ConfigurationDataError> {
    parse_option_lines(doc, section, option, PartitionSpec::parse).map(drop)
}

fn check_policies(doc: &Document, section: &str, option: &str) -> Result<(), ConfigurationDataError> {
    parse_option_lines(doc, section, option, PasswordPolicy::parse).map(drop)
}

const fn required(section: &'static str, option: &'static str, check: OptionCheck) -> SchemaOption {
    SchemaOption {
        section,
        option,
        check,
    }
}

static SCHEMA: &[SchemaOption] = &[
    required("Installer", "debug", check::<bool>),
    required("Installer", "kickstart_modules", check::<Vec<String>>),
    required("Installer", "forbidden_modules", check::<Vec<String>>),
    required("Installer", "optional_modules", check::<Vec<String>>),
    required("Installation Target", "type", check::<TargetType>),
    required("Installation Target", "physical_root", check::<String>),
    required("Installation Target", "system_root", check::<String>),
    required("Installation Target", "can_configure_network", check::<bool>),
    required("Payload", "default_source", check::<String>),
    required("Payload", "enable_updates", check::<bool>),
    required("Payload", "default_rpm_gpg_keys", check::<Vec<String>>),
    required("Payload", "ignored_packages", check::<Vec<String>>),
    required("Security", "selinux", check::<i64>),
    required("Bootloader", "type", check::<String>),
    required("Bootloader", "menu_auto_hide", check::<bool>),
    required("Bootloader", "preserved_arguments", check::<Vec<String>>),
    required("Bootloader", "nonibft_iscsi_boot", check::<bool>),
    required("Storage", "default_scheme", check::<String>),
    required("Storage", "file_system_type", check::<String>),
    required("Storage", "default_partitioning", check_partitioning),
    required("Storage", "luks_version", check::<String>),
    required("Storage", "gpt", check::<bool>),
    required("Storage", "multipath_friendly_names", check::<bool>),
    required("Storage", "allow_imperfect_devices", check::<bool>),
    required("User Interface", "custom_stylesheet", check::<String>),
    required("User Interface", "hidden_spokes", check::<Vec<String>>),
    required("User Interface", "password_policies", check_policies),
    required("User Interface", "decorated_window", check::<bool>),
];

/// Product names used to pick product overlays, from the most to the
/// least specific source.
#[derive(Debug, Clone, Default)]
pub struct ProductRequest {
    /// Explicitly requested by the user; a miss is an error.
    pub requested_product: Option<String>,
    pub requested_variant: Option<String>,
    /// Detected from the installation media.
    pub buildstamp_product: Option<String>,
    pub buildstamp_variant: Option<String>,
    /// Fallback when nothing else matches.
    pub default_product: Option<String>,
}

fn nonempty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// The configuration of the installer.
///
/// It always starts from the default file of the configuration directory;
/// product overlays and other files are merged on top of it.
#[derive(Debug, Clone)]
pub struct InstallerConfiguration {
    config: Configuration,
    config_dir: Utf8PathBuf,
}

impl Default for InstallerConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallerConfiguration {
    /// An empty configuration using the system configuration directory.
    pub fn new() -> Self {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_owned());
        Self::with_config_dir(dir)
    }

    /// An empty configuration using `dir` as the configuration directory.
    pub fn with_config_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config: Configuration::new(),
            config_dir: dir.into(),
        }
    }

    /// Load the default file of the system configuration directory.
    pub fn from_defaults() -> Result<Self, ConfigurationError> {
        let mut r = Self::new();
        r.read_defaults()?;
        Ok(r)
    }

    /// Load the default file of `dir`.
    pub fn from_defaults_in(dir: impl Into<Utf8PathBuf>) -> Result<Self, ConfigurationError> {
        let mut r = Self::with_config_dir(dir);
        r.read_defaults()?;
        Ok(r)
    }

    fn read_defaults(&mut self) -> Result<(), ConfigurationFileError> {
        let path = self.default_source();
        self.config.read(&path)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn default_source(&self) -> Utf8PathBuf {
        self.config_dir.join(DEFAULT_CONFIG_FILE)
    }

    pub fn get_sources(&self) -> &[Utf8PathBuf] {
        self.config.get_sources()
    }

    pub fn document(&self) -> &Document {
        self.config.document()
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.config.document_mut()
    }

    pub fn read(&mut self, path: &Utf8Path) -> Result<(), ConfigurationFileError> {
        self.config.read(path)
    }

    pub fn read_from_directory(&mut self, dir: &Utf8Path) -> Result<(), ConfigurationFileError> {
        self.config.read_from_directory(dir)
    }

    pub fn set_from_files<P: AsRef<Utf8Path>>(&mut self, paths: &[P]) -> Result<(), ConfigurationFileError> {
        self.config.set_from_files(paths)
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), ConfigurationFileError> {
        self.config.write(path)
    }

    /// Reload the configuration from the default file and the overlays of
    /// the best matching product.
    ///
    /// A requested product must exist. Otherwise the product of the
    /// installation media and then the default product are tried; if none
    /// of them has an overlay the configuration is left as is.
    pub fn set_from_product(&mut self, req: &ProductRequest) -> Result<(), ConfigurationError> {
        let dir = &self.config_dir;
        let overlays = if let Some(product) = nonempty(&req.requested_product) {
            let variant = nonempty(&req.requested_variant);
            find_product_overlays(dir, product, variant).ok_or_else(|| {
                ConfigurationError::ProductNotFound {
                    product: product.to_owned(),
                    variant: variant.unwrap_or_default().to_owned(),
                }
            })?
        } else if let Some(paths) = nonempty(&req.buildstamp_product)
            .and_then(|p| find_product_overlays(dir, p, nonempty(&req.buildstamp_variant)))
        {
            paths
        } else if let Some(paths) =
            nonempty(&req.default_product).and_then(|p| find_product_overlays(dir, p, None))
        {
            paths
        } else {
            tracing::warn!("{NO_PRODUCT_WARNING}");
            return Ok(());
        };
        let mut files = vec![self.default_source()];
        files.extend(overlays);
        self.config.set_from_files(&files)?;
        Ok(())
    }

    /// Check that every required option is present and has a valid value.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let doc = self.document();
        for opt in SCHEMA {
            (opt.check)(doc, opt.section, opt.option)?;
        }
        Ok(())
    }

    pub fn installer(&self) -> InstallerSection<'_> {
        InstallerSection::new(self.document())
    }

    pub fn target(&self) -> TargetSection<'_> {
        TargetSection::new(self.document())
    }

    pub fn payload(&self) -> PayloadSection<'_> {
        PayloadSection::new(self.document())
    }

    pub fn security(&self) -> SecuritySection<'_> {
        SecuritySection::new(self.document())
    }

    pub fn bootloader(&self) -> BootloaderSection<'_> {
        BootloaderSection::new(self.document())
    }

    pub fn storage(&self) -> StorageSection<'_> {
        StorageSection::new(self.document())
    }

    pub fn ui(&self) -> UserInterfaceSection<'_> {
        UserInterfaceSection::new(self.document())
    }
}
