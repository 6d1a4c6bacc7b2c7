//! Error types for configuration handling.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Failure to read or write a configuration file.
#[derive(Debug, Error)]
#[error("The following error has occurred while handling the configuration file '{path}': {reason}")]
pub struct ConfigurationFileError {
    path: Utf8PathBuf,
    reason: String,
}

impl ConfigurationFileError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The file that could not be handled.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Failure to look up, convert or assign one option.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "The following error has occurred while handling the option '{option}' in the section '{section}': {reason}"
)]
pub struct ConfigurationDataError {
    section: String,
    option: String,
    reason: String,
}

impl ConfigurationDataError {
    pub(crate) fn new(section: &str, option: &str, reason: impl ToString) -> Self {
        Self {
            section: section.to_string(),
            option: option.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn option(&self) -> &str {
        &self.option
    }
}

/// Errors raised by the installer configuration as a whole.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "Unable to find any suitable configuration files for the product name '{product}' and the variant name '{variant}'."
    )]
    ProductNotFound { product: String, variant: String },
    #[error("Invalid configuration: {0}")]
    Invalid(#[source] ConfigurationDataError),
    #[error(transparent)]
    File(#[from] ConfigurationFileError),
}

impl From<ConfigurationDataError> for ConfigurationError {
    fn from(e: ConfigurationDataError) -> Self {
        Self::Invalid(e)
    }
}
