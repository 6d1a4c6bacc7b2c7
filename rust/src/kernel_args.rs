// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parsing of the kernel command line of the installation environment.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use fn_error_context::context;

const PROC_CMDLINE: &str = "/proc/cmdline";

/// Values that turn a boolean kernel argument off.
const DISABLED_VALUES: &[&str] = &["0", "off", "no"];

/// Kernel arguments as `name` or `name=value` pairs. A repeated argument
/// keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelArguments {
    args: BTreeMap<String, Option<String>>,
}

impl FromStr for KernelArguments {
    type Err = anyhow::Error;

    fn from_str(cmdline: &str) -> Result<Self> {
        let words =
            shlex::split(cmdline).ok_or_else(|| anyhow!("Invalid kernel command line: {cmdline}"))?;
        let args = words
            .into_iter()
            .map(|w| match w.split_once('=') {
                Some((k, v)) => (k.to_owned(), Some(v.to_owned())),
                None => (w, None),
            })
            .collect();
        Ok(Self { args })
    }
}

impl KernelArguments {
    /// Read the arguments the running kernel was booted with.
    #[context("Reading {PROC_CMDLINE}")]
    pub fn from_proc() -> Result<Self> {
        std::fs::read_to_string(PROC_CMDLINE)?.parse()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// The value of `name=value`; `None` for a missing or bare argument.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(|v| v.as_deref())
    }

    /// Whether a boolean argument is set, e.g. `fips` or `fips=1` but
    /// not `fips=0`.
    pub fn is_enabled(&self, name: &str) -> bool {
        match self.args.get(name) {
            None => false,
            Some(None) => true,
            Some(Some(v)) => !DISABLED_VALUES.contains(&v.as_str()),
        }
    }
}
