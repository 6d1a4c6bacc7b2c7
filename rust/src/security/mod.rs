// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Security configuration of the installed system: SELinux, authentication
//! tools, realm membership and FIPS mode.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::Dir;
use thiserror::Error;

use crate::cmdutils::{CommandRunner, HostRunner};
use crate::config::{ConfigurationDataError, ConfigurationError, InstallerConfiguration, TargetType};
use crate::kernel_args::KernelArguments;
use crate::requirement::Requirement;

pub mod installation;
pub mod realm;

use installation::{
    ConfigureAuthconfigTask, ConfigureAuthselectTask, ConfigureFIPSTask,
    ConfigureFingerprintAuthTask, ConfigureSELinuxTask, PayloadType, PreconfigureFIPSTask,
    SecurityInstallTask,
};
use realm::{RealmData, RealmDiscoverTask, RealmJoinTask, SharedRealm};

pub const AUTHSELECT_TOOL_PATH: &str = "/usr/bin/authselect";
pub const AUTHCONFIG_TOOL_PATH: &str = "/usr/sbin/authconfig";
pub const PAM_SO_PATH: &str = "/usr/lib/security/pam_fprintd.so";
pub const PAM_SO_64_PATH: &str = "/usr/lib64/security/pam_fprintd.so";
pub const REALM_TOOL_PATH: &str = "/usr/bin/realm";
pub const FIPS_MODE_SETUP_TOOL: &str = "fips-mode-setup";

/// Kernel argument that enables FIPS mode.
const FIPS_ARG: &str = "fips";

/// A hard failure of a security installation task.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SecurityInstallationError(pub String);

/// SELinux state of the installed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SELinuxMode {
    /// Keep whatever the installed system ships.
    #[default]
    Default,
    Disabled,
    Enforcing,
    Permissive,
}

impl SELinuxMode {
    /// The value of `SELINUX=` in `/etc/selinux/config`.
    pub fn config_value(&self) -> Option<&'static str> {
        match self {
            SELinuxMode::Default => None,
            SELinuxMode::Disabled => Some("disabled"),
            SELinuxMode::Enforcing => Some("enforcing"),
            SELinuxMode::Permissive => Some("permissive"),
        }
    }
}

impl TryFrom<i64> for SELinuxMode {
    type Error = anyhow::Error;

    fn try_from(v: i64) -> Result<Self> {
        match v {
            -1 => Ok(Self::Default),
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Enforcing),
            2 => Ok(Self::Permissive),
            o => Err(anyhow!("Unknown SELinux mode {o}")),
        }
    }
}

impl FromStr for SELinuxMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Self::Default),
            "disabled" => Ok(Self::Disabled),
            "enforcing" => Ok(Self::Enforcing),
            "permissive" => Ok(Self::Permissive),
            o => Err(anyhow!("Unknown SELinux mode {o:?}")),
        }
    }
}

impl fmt::Display for SELinuxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_value().unwrap_or("default"))
    }
}

/// Open `root`, or `None` if it does not exist.
pub(crate) fn open_root_optional(root: &Utf8Path) -> Result<Option<Dir>> {
    match Dir::open_ambient_dir(root, cap_std::ambient_authority()) {
        Ok(d) => Ok(Some(d)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Opening {root}")),
    }
}

/// Whether the absolute `path` exists below `root`.
pub(crate) fn exists_in_root(root: &Utf8Path, path: &str) -> Result<bool> {
    let Some(d) = open_root_optional(root)? else {
        return Ok(false);
    };
    let rel = path.trim_start_matches('/');
    d.try_exists(rel)
        .with_context(|| format!("Querying {path} in {root}"))
}

/// The security settings of the installation and the tasks applying them.
#[derive(Debug)]
pub struct SecurityService {
    selinux: SELinuxMode,
    authselect: Vec<String>,
    authconfig: Vec<String>,
    fingerprint_auth_enabled: bool,
    realm: SharedRealm,
    sysroot: Utf8PathBuf,
    target_type: TargetType,
    fips_enabled: bool,
    runner: Arc<dyn CommandRunner>,
}

impl SecurityService {
    pub fn new(
        conf: &InstallerConfiguration,
        kernel_args: &KernelArguments,
    ) -> Result<Self, ConfigurationError> {
        let security = conf.security();
        let selinux = security.selinux()?;
        let selinux = SELinuxMode::try_from(selinux)
            .map_err(|e| ConfigurationDataError::new("Security", "selinux", format!("{e:#}")))?;
        let target = conf.target();
        Ok(Self {
            selinux,
            authselect: Vec::new(),
            authconfig: Vec::new(),
            fingerprint_auth_enabled: false,
            realm: Rc::new(RefCell::new(RealmData::default())),
            sysroot: target.system_root()?.into(),
            target_type: target.target_type()?,
            fips_enabled: kernel_args.is_enabled(FIPS_ARG),
            runner: Arc::new(HostRunner),
        })
    }

    /// Run external tools with `runner` instead of on this host.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn sysroot(&self) -> &Utf8Path {
        &self.sysroot
    }

    pub fn selinux(&self) -> SELinuxMode {
        self.selinux
    }

    pub fn set_selinux(&mut self, mode: SELinuxMode) {
        self.selinux = mode;
        tracing::debug!("SELinux is set to {mode}.");
    }

    /// Arguments for authselect.
    pub fn authselect(&self) -> &[String] {
        &self.authselect
    }

    pub fn set_authselect(&mut self, args: Vec<String>) {
        tracing::debug!("Authselect is set to {args:?}.");
        self.authselect = args;
    }

    /// Arguments for authconfig.
    pub fn authconfig(&self) -> &[String] {
        &self.authconfig
    }

    pub fn set_authconfig(&mut self, args: Vec<String>) {
        tracing::debug!("Authconfig is set to {args:?}.");
        self.authconfig = args;
    }

    pub fn fingerprint_auth_enabled(&self) -> bool {
        self.fingerprint_auth_enabled
    }

    pub fn set_fingerprint_auth_enabled(&mut self, enabled: bool) {
        self.fingerprint_auth_enabled = enabled;
        tracing::debug!("Fingerprint authentication enabled is set to {enabled}.");
    }

    pub fn fips_enabled(&self) -> bool {
        self.fips_enabled
    }

    pub fn realm(&self) -> RealmData {
        self.realm.borrow().clone()
    }

    /// Replace the realm. Pending join tasks observe the new value.
    pub fn set_realm(&mut self, realm: RealmData) {
        tracing::debug!("Realm is set to {realm:?}.");
        *self.realm.borrow_mut() = realm;
    }

    /// Packages the installed system needs for the current settings.
    pub fn collect_requirements(&self) -> Vec<Requirement> {
        let mut r: Vec<_> = self
            .realm
            .borrow()
            .required_packages
            .iter()
            .map(|p| Requirement::for_package(p, "Needed to join a realm."))
            .collect();
        if !self.authselect.is_empty() || self.fingerprint_auth_enabled {
            r.push(Requirement::for_package(
                "authselect",
                "Necessary for authselect configuration.",
            ));
        }
        if !self.authconfig.is_empty() {
            r.push(Requirement::for_package(
                "authselect-compat",
                "Necessary for authconfig configuration.",
            ));
        }
        if self.fips_enabled {
            r.push(Requirement::for_package(
                "/usr/bin/fips-mode-setup",
                "Required for FIPS compliance.",
            ));
        }
        r
    }

    /// Tasks applying the settings to the installed system, in order.
    pub fn install_with_tasks(&self) -> Vec<SecurityInstallTask> {
        let sysroot = &self.sysroot;
        let mut tasks: Vec<SecurityInstallTask> = vec![
            ConfigureSELinuxTask::new(sysroot, self.selinux).into(),
            ConfigureFingerprintAuthTask::new(sysroot, self.fingerprint_auth_enabled)
                .with_runner(self.runner.clone())
                .into(),
        ];
        // The tools are only required when they have something to do.
        if !self.authselect.is_empty() {
            tasks.push(
                ConfigureAuthselectTask::new(sysroot, self.authselect.clone())
                    .with_runner(self.runner.clone())
                    .into(),
            );
        }
        if !self.authconfig.is_empty() {
            tasks.push(
                ConfigureAuthconfigTask::new(sysroot, self.authconfig.clone())
                    .with_runner(self.runner.clone())
                    .into(),
            );
        }
        tasks
    }

    /// Discover the current realm. The task works on a copy of the realm.
    pub fn discover_realm_with_task(&self) -> RealmDiscoverTask {
        RealmDiscoverTask::new(&self.sysroot, self.realm()).with_runner(self.runner.clone())
    }

    /// Join the realm as it is when the task runs.
    pub fn join_realm_with_task(&self) -> RealmJoinTask {
        RealmJoinTask::new(&self.sysroot, self.realm.clone()).with_runner(self.runner.clone())
    }

    pub fn preconfigure_fips_with_task(&self, payload_type: PayloadType) -> PreconfigureFIPSTask {
        PreconfigureFIPSTask::new(&self.sysroot, payload_type, self.fips_enabled)
    }

    pub fn configure_fips_with_task(&self) -> ConfigureFIPSTask {
        ConfigureFIPSTask::new(&self.sysroot, self.fips_enabled, self.target_type)
            .with_runner(self.runner.clone())
    }
}
