// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layered INI configuration of the installer.

mod base;
mod error;
pub mod installer;
mod product;
mod sections;
mod storage;
mod ui;

pub use base::{read_config, write_config, Configuration, Document, OptionValue, CONFIG_SUFFIX};
pub use error::{ConfigurationDataError, ConfigurationError, ConfigurationFileError};
pub use installer::{
    InstallerConfiguration, ProductRequest, CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE,
};
pub use product::{find_product_overlays, slugify, PRODUCT_DIR};
pub use sections::{
    BootloaderSection, InstallerSection, PayloadSection, SectionView, SecuritySection,
    TargetSection, TargetType,
};
pub use storage::{PartitionSpec, StorageSection};
pub use ui::{PasswordPolicy, UserInterfaceSection};
