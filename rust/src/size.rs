//! Human readable storage sizes such as `1024 MiB` or `70 GiB`.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<num>[0-9]+(?:\.[0-9]+)?)\s*(?P<unit>[a-zA-Z]*)\s*$")
        .expect("size regex")
});

const BINARY_UNITS: &[(&str, u64)] = &[
    ("PiB", 1 << 50),
    ("TiB", 1 << 40),
    ("GiB", 1 << 30),
    ("MiB", 1 << 20),
    ("KiB", 1 << 10),
];

/// A size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Size(u64);

impl Size {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_mib(mib: u64) -> Self {
        Self(mib << 20)
    }

    pub const fn from_gib(gib: u64) -> Self {
        Self(gib << 30)
    }

    pub const fn bytes(&self) -> u64 {
        self.0
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    if unit.is_empty() || unit.eq_ignore_ascii_case("b") {
        return Some(1);
    }
    let mut chars = unit.chars();
    let prefix = chars.next()?.to_ascii_uppercase();
    let exp = match prefix {
        'K' => 1,
        'M' => 2,
        'G' => 3,
        'T' => 4,
        'P' => 5,
        _ => return None,
    };
    let base: u64 = match chars.as_str() {
        "iB" | "ib" => 1024,
        "B" | "b" => 1000,
        _ => return None,
    };
    Some(base.pow(exp))
}

impl FromStr for Size {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = SIZE_RE
            .captures(s)
            .ok_or_else(|| anyhow!("Invalid size: {s:?}"))?;
        let unit = &caps["unit"];
        let mult = unit_multiplier(unit).ok_or_else(|| anyhow!("Invalid size unit {unit:?} in {s:?}"))?;
        let num = &caps["num"];
        let bytes = match num.split_once('.') {
            None => num
                .parse::<u64>()?
                .checked_mul(mult)
                .ok_or_else(|| anyhow!("Size too large: {s:?}"))?,
            Some(_) => {
                let v = (num.parse::<f64>()? * mult as f64).round();
                // 2^64 is the first value that does not fit.
                if !v.is_finite() || v >= u64::MAX as f64 {
                    return Err(anyhow!("Size too large: {s:?}"));
                }
                v as u64
            }
        };
        Ok(Self(bytes))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, mult) in BINARY_UNITS {
            if self.0 >= *mult && self.0 % mult == 0 {
                return write!(f, "{} {}", self.0 / mult, name);
            }
        }
        write!(f, "{} B", self.0)
    }
}
