// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Requirements placed on the installed system by the configuration.

use serde::Serialize;

/// What kind of thing is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    Package,
}

/// A requirement for the payload, with a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementType,
    pub name: String,
    pub reason: String,
}

impl Requirement {
    pub fn for_package(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: RequirementType::Package,
            name: name.into(),
            reason: reason.into(),
        }
    }
}
