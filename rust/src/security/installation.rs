// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tasks configuring security of the installed system.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::Dir;
use cap_std_ext::prelude::CapStdExtDirExt;
use fn_error_context::context;

use super::{
    exists_in_root, open_root_optional, SELinuxMode, SecurityInstallationError,
    AUTHCONFIG_TOOL_PATH, AUTHSELECT_TOOL_PATH, FIPS_MODE_SETUP_TOOL, PAM_SO_64_PATH, PAM_SO_PATH,
};
use crate::cmdutils::{CommandRunner, HostRunner, Invocation};
use crate::config::TargetType;
use crate::task::Task;

const SELINUX_CONFIG_PATH: &str = "etc/selinux/config";
const SELINUX_KEY: &str = "SELINUX";
const CRYPTO_POLICIES_DIR: &str = "etc/crypto-policies";
const CRYPTO_POLICIES_CONFIG: &str = "config";
const CRYPTO_POLICIES_BACKENDS: &str = "back-ends";
const FIPS_POLICY: &str = "FIPS";

/// The kind of payload that installs the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Dnf,
    LiveOs,
    LiveImage,
    RpmOstree,
}

impl PayloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadType::Dnf => "DNF",
            PayloadType::LiveOs => "LIVE_OS",
            PayloadType::LiveImage => "LIVE_IMAGE",
            PayloadType::RpmOstree => "RPM_OSTREE",
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            PayloadType::Dnf,
            PayloadType::LiveOs,
            PayloadType::LiveImage,
            PayloadType::RpmOstree,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow!("Unknown payload type {s:?}"))
    }
}

/// Set `key=value` in a shell style configuration file, replacing the
/// first assignment of `key` or appending one.
fn set_config_value(content: &str, key: &str, value: &str) -> String {
    let mut found = false;
    let mut r = String::with_capacity(content.len() + key.len() + value.len() + 2);
    for line in content.lines() {
        let is_key = line
            .split_once('=')
            .is_some_and(|(k, _)| k.trim() == key);
        if is_key && !found {
            found = true;
            r.push_str(&format!("{key}={value}"));
        } else {
            r.push_str(line);
        }
        r.push('\n');
    }
    if !found {
        r.push_str(&format!("{key}={value}\n"));
    }
    r
}

/// Set the SELinux mode in `/etc/selinux/config` of the installed system.
#[derive(Debug)]
pub struct ConfigureSELinuxTask {
    sysroot: Utf8PathBuf,
    mode: SELinuxMode,
}

impl ConfigureSELinuxTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, mode: SELinuxMode) -> Self {
        Self {
            sysroot: sysroot.into(),
            mode,
        }
    }

    pub fn mode(&self) -> SELinuxMode {
        self.mode
    }

    #[context("Configuring SELinux in {}", self.sysroot)]
    fn write_mode(&self, root: &Dir, value: &str) -> Result<()> {
        let content = root.read_to_string(SELINUX_CONFIG_PATH)?;
        root.write(
            SELINUX_CONFIG_PATH,
            set_config_value(&content, SELINUX_KEY, value),
        )?;
        Ok(())
    }
}

impl Task for ConfigureSELinuxTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "ConfigureSELinux"
    }

    fn run(self) -> Result<()> {
        let Some(value) = self.mode.config_value() else {
            tracing::debug!("SELinux mode is not set, keeping the default.");
            return Ok(());
        };
        let root = match open_root_optional(&self.sysroot)? {
            Some(root) if root.try_exists(SELINUX_CONFIG_PATH)? => root,
            _ => {
                tracing::warn!("SELinux configuration file /{SELINUX_CONFIG_PATH} not found in {}", self.sysroot);
                return Ok(());
            }
        };
        if let Err(e) = self.write_mode(&root, value) {
            tracing::error!("{e:#}");
        }
        Ok(())
    }
}

/// Enable fingerprint authentication with authselect, if the target
/// supports it.
#[derive(Debug)]
pub struct ConfigureFingerprintAuthTask {
    sysroot: Utf8PathBuf,
    enabled: bool,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigureFingerprintAuthTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, enabled: bool) -> Self {
        Self {
            sysroot: sysroot.into(),
            enabled,
            runner: Arc::new(HostRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Task for ConfigureFingerprintAuthTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "ConfigureFingerprintAuth"
    }

    fn run(self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let has_pam = exists_in_root(&self.sysroot, PAM_SO_PATH)?
            || exists_in_root(&self.sysroot, PAM_SO_64_PATH)?;
        if !has_pam {
            tracing::debug!("pam_fprintd is not installed, skipping fingerprint authentication.");
            return Ok(());
        }
        if !exists_in_root(&self.sysroot, AUTHSELECT_TOOL_PATH)? {
            tracing::debug!("authselect is not installed, skipping fingerprint authentication.");
            return Ok(());
        }
        let invocation = Invocation::new(
            AUTHSELECT_TOOL_PATH,
            ["select", "sssd", "with-fingerprint", "with-silent-lastlog", "--force"],
        )
        .root(&self.sysroot);
        run_tool(self.runner.as_ref(), &invocation)
    }
}

/// Run a configuration tool of the target; a failing tool is logged.
fn run_tool(runner: &dyn CommandRunner, invocation: &Invocation) -> Result<()> {
    let code = runner.redirect(invocation)?;
    if code != 0 {
        tracing::error!("{invocation} failed with exit code {code}");
    }
    Ok(())
}

/// Fail unless `tool` is installed in `sysroot`.
fn require_tool(sysroot: &Utf8Path, tool: &str) -> Result<()> {
    if !exists_in_root(sysroot, tool)? {
        let name = Utf8Path::new(tool).file_name().unwrap_or(tool);
        return Err(SecurityInstallationError(format!(
            "{name} is missing. Cannot setup authentication."
        ))
        .into());
    }
    Ok(())
}

/// Configure authentication with authselect.
#[derive(Debug)]
pub struct ConfigureAuthselectTask {
    sysroot: Utf8PathBuf,
    options: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigureAuthselectTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, options: Vec<String>) -> Self {
        Self {
            sysroot: sysroot.into(),
            options,
            runner: Arc::new(HostRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl Task for ConfigureAuthselectTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "ConfigureAuthselect"
    }

    fn run(self) -> Result<()> {
        require_tool(&self.sysroot, AUTHSELECT_TOOL_PATH)?;
        let args = self.options.iter().map(String::as_str).chain(["--force"]);
        let invocation = Invocation::new(AUTHSELECT_TOOL_PATH, args).root(&self.sysroot);
        run_tool(self.runner.as_ref(), &invocation)
    }
}

/// Configure authentication with the authconfig compatibility tool.
#[derive(Debug)]
pub struct ConfigureAuthconfigTask {
    sysroot: Utf8PathBuf,
    options: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigureAuthconfigTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, options: Vec<String>) -> Self {
        Self {
            sysroot: sysroot.into(),
            options,
            runner: Arc::new(HostRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl Task for ConfigureAuthconfigTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "ConfigureAuthconfig"
    }

    fn run(self) -> Result<()> {
        require_tool(&self.sysroot, AUTHCONFIG_TOOL_PATH)?;
        let args = ["--update", "--nostart"]
            .into_iter()
            .chain(self.options.iter().map(String::as_str));
        let invocation = Invocation::new(AUTHCONFIG_TOOL_PATH, args).root(&self.sysroot);
        run_tool(self.runner.as_ref(), &invocation)
    }
}

/// One of the tasks returned by
/// [`SecurityService::install_with_tasks`](super::SecurityService::install_with_tasks).
#[derive(Debug)]
pub enum SecurityInstallTask {
    SELinux(ConfigureSELinuxTask),
    Fingerprint(ConfigureFingerprintAuthTask),
    Authselect(ConfigureAuthselectTask),
    Authconfig(ConfigureAuthconfigTask),
}

impl From<ConfigureSELinuxTask> for SecurityInstallTask {
    fn from(t: ConfigureSELinuxTask) -> Self {
        Self::SELinux(t)
    }
}

impl From<ConfigureFingerprintAuthTask> for SecurityInstallTask {
    fn from(t: ConfigureFingerprintAuthTask) -> Self {
        Self::Fingerprint(t)
    }
}

impl From<ConfigureAuthselectTask> for SecurityInstallTask {
    fn from(t: ConfigureAuthselectTask) -> Self {
        Self::Authselect(t)
    }
}

impl From<ConfigureAuthconfigTask> for SecurityInstallTask {
    fn from(t: ConfigureAuthconfigTask) -> Self {
        Self::Authconfig(t)
    }
}

impl Task for SecurityInstallTask {
    type Output = ();

    fn name(&self) -> &'static str {
        match self {
            Self::SELinux(t) => t.name(),
            Self::Fingerprint(t) => t.name(),
            Self::Authselect(t) => t.name(),
            Self::Authconfig(t) => t.name(),
        }
    }

    fn run(self) -> Result<()> {
        match self {
            Self::SELinux(t) => t.run(),
            Self::Fingerprint(t) => t.run(),
            Self::Authselect(t) => t.run(),
            Self::Authconfig(t) => t.run(),
        }
    }
}

/// Copy a directory tree, keeping symbolic links as they are.
fn copy_tree(src: &Dir, dst: &Dir) -> Result<()> {
    for ent in src.entries()? {
        let ent = ent?;
        let name = ent.file_name();
        let ftype = ent.file_type()?;
        if ftype.is_dir() {
            dst.create_dir_all(&name)?;
            let child = dst.open_dir(&name)?;
            copy_tree(&ent.open_dir()?, &child)
                .with_context(|| format!("Copying {}", name.to_string_lossy()))?;
        } else if ftype.is_symlink() {
            let target = src.read_link_contents(&name)?;
            dst.remove_file_optional(&name)?;
            dst.symlink_contents(&target, &name)
                .with_context(|| format!("Symlinking {}", name.to_string_lossy()))?;
        } else {
            src.copy(&name, dst, &name)
                .with_context(|| format!("Copying {}", name.to_string_lossy()))?;
        }
    }
    Ok(())
}

/// Copy the FIPS crypto policy of the installation environment into the
/// target before the payload is installed.
#[derive(Debug)]
pub struct PreconfigureFIPSTask {
    sysroot: Utf8PathBuf,
    payload_type: PayloadType,
    fips_enabled: bool,
    host_root: Utf8PathBuf,
}

impl PreconfigureFIPSTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, payload_type: PayloadType, fips_enabled: bool) -> Self {
        Self {
            sysroot: sysroot.into(),
            payload_type,
            fips_enabled,
            host_root: "/".into(),
        }
    }

    /// Read the crypto policy from `root` instead of `/`.
    pub fn with_host_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.host_root = root.into();
        self
    }

    pub fn sysroot(&self) -> &Utf8Path {
        &self.sysroot
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn fips_enabled(&self) -> bool {
        self.fips_enabled
    }

    /// The crypto policies directory of the host, if it is set up for FIPS.
    fn fips_policies(&self) -> Result<Option<Dir>> {
        let Some(host) = open_root_optional(&self.host_root)? else {
            return Ok(None);
        };
        let Some(policies) = host.open_dir_optional(CRYPTO_POLICIES_DIR)? else {
            return Ok(None);
        };
        let Ok(config) = policies.read_to_string(CRYPTO_POLICIES_CONFIG) else {
            return Ok(None);
        };
        Ok(config.trim().starts_with(FIPS_POLICY).then_some(policies))
    }

    #[context("Copying crypto policies into {}", self.sysroot)]
    fn copy_policies(&self, policies: &Dir) -> Result<()> {
        let sysroot = Dir::open_ambient_dir(&self.sysroot, cap_std::ambient_authority())?;
        sysroot.create_dir_all(CRYPTO_POLICIES_DIR)?;
        let target = sysroot.open_dir(CRYPTO_POLICIES_DIR)?;
        policies.copy(CRYPTO_POLICIES_CONFIG, &target, CRYPTO_POLICIES_CONFIG)?;
        target.create_dir_all(CRYPTO_POLICIES_BACKENDS)?;
        copy_tree(
            &policies.open_dir(CRYPTO_POLICIES_BACKENDS)?,
            &target.open_dir(CRYPTO_POLICIES_BACKENDS)?,
        )
    }
}

impl Task for PreconfigureFIPSTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "PreconfigureFIPS"
    }

    fn run(self) -> Result<()> {
        if !self.fips_enabled {
            tracing::debug!("FIPS is not enabled. Skipping.");
            return Ok(());
        }
        if self.payload_type == PayloadType::RpmOstree {
            tracing::debug!("Don't set up FIPS for the {} payload.", self.payload_type);
            return Ok(());
        }
        let Some(policies) = self.fips_policies()? else {
            return Err(SecurityInstallationError(
                "FIPS is not correctly set up in the installation environment.".into(),
            )
            .into());
        };
        tracing::info!("Copying the FIPS crypto policy to {}", self.sysroot);
        self.copy_policies(&policies)
    }
}

/// Enable FIPS mode on the installed system.
#[derive(Debug)]
pub struct ConfigureFIPSTask {
    sysroot: Utf8PathBuf,
    fips_enabled: bool,
    target_type: TargetType,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigureFIPSTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, fips_enabled: bool, target_type: TargetType) -> Self {
        Self {
            sysroot: sysroot.into(),
            fips_enabled,
            target_type,
            runner: Arc::new(HostRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn sysroot(&self) -> &Utf8Path {
        &self.sysroot
    }

    pub fn fips_enabled(&self) -> bool {
        self.fips_enabled
    }
}

impl Task for ConfigureFIPSTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "ConfigureFIPS"
    }

    fn run(self) -> Result<()> {
        if !self.fips_enabled {
            tracing::debug!("FIPS is not enabled. Skipping.");
            return Ok(());
        }
        if self.target_type != TargetType::Hardware {
            tracing::debug!("Don't set up FIPS on {}.", self.target_type);
            return Ok(());
        }
        let invocation =
            Invocation::new(FIPS_MODE_SETUP_TOOL, ["--enable", "--no-bootcfg"]).root(&self.sysroot);
        run_tool(self.runner.as_ref(), &invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdutils::testutils::FakeRunner;
    use indoc::indoc;
    use std::fs;

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let td = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(td.path().to_path_buf()).unwrap();
        (td, root)
    }

    fn touch(root: &Utf8Path, path: &str) {
        let path = root.join(path.trim_start_matches('/'));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn configure_selinux(initial: &str, mode: SELinuxMode) -> String {
        let (_td, root) = tempdir();
        touch(&root, SELINUX_CONFIG_PATH);
        fs::write(root.join(SELINUX_CONFIG_PATH), initial).unwrap();
        ConfigureSELinuxTask::new(&root, mode).run().unwrap();
        fs::read_to_string(root.join(SELINUX_CONFIG_PATH)).unwrap()
    }

    #[test]
    fn test_configure_selinux() {
        assert_eq!(configure_selinux("", SELinuxMode::Disabled).trim(), "SELINUX=disabled");
        assert_eq!(configure_selinux("", SELinuxMode::Enforcing).trim(), "SELINUX=enforcing");
        assert_eq!(configure_selinux("", SELinuxMode::Permissive).trim(), "SELINUX=permissive");
        assert_eq!(configure_selinux("\nSELINUX=foo\n", SELinuxMode::Default).trim(), "SELINUX=foo");
    }

    #[test]
    fn test_configure_selinux_rewrites_line() {
        let initial = indoc! {"
            # This file controls the state of SELinux on the system.
            SELINUX=enforcing
            SELINUXTYPE=targeted
        "};
        similar_asserts::assert_eq!(
            configure_selinux(initial, SELinuxMode::Permissive),
            indoc! {"
                # This file controls the state of SELinux on the system.
                SELINUX=permissive
                SELINUXTYPE=targeted
            "}
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_configure_selinux_missing_config() {
        let (_td, root) = tempdir();
        ConfigureSELinuxTask::new(&root, SELinuxMode::Enforcing)
            .run()
            .unwrap();
        assert!(logs_contain("SELinux configuration file"));
        assert!(!root.join(SELINUX_CONFIG_PATH).exists());
    }

    fn fingerprint_calls(root: &Utf8Path) -> Vec<Invocation> {
        let runner = Arc::new(FakeRunner::default());
        ConfigureFingerprintAuthTask::new(root, true)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        runner.calls()
    }

    #[test]
    fn test_configure_fingerprint_auth() {
        let expected = |root: &Utf8Path| {
            Invocation::new(
                AUTHSELECT_TOOL_PATH,
                ["select", "sssd", "with-fingerprint", "with-silent-lastlog", "--force"],
            )
            .root(root)
        };

        // Nothing is installed.
        let (_td, root) = tempdir();
        assert!(fingerprint_calls(&root).is_empty());

        // The authselect command is missing.
        touch(&root, PAM_SO_PATH);
        assert!(fingerprint_calls(&root).is_empty());

        // Authselect command and pam library are there.
        touch(&root, AUTHSELECT_TOOL_PATH);
        assert_eq!(fingerprint_calls(&root), [expected(&root)]);

        // The 64-bit library works too.
        let (_td, root) = tempdir();
        touch(&root, PAM_SO_64_PATH);
        assert!(fingerprint_calls(&root).is_empty());
        touch(&root, AUTHSELECT_TOOL_PATH);
        assert_eq!(fingerprint_calls(&root), [expected(&root)]);

        // Disabled.
        let runner = Arc::new(FakeRunner::default());
        ConfigureFingerprintAuthTask::new(&root, false)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_configure_authselect() {
        let (_td, root) = tempdir();
        let options = || vec!["select".to_owned(), "sssd".into(), "with-mkhomedir".into()];

        let runner = Arc::new(FakeRunner::default());
        let e = ConfigureAuthselectTask::new(&root, options())
            .with_runner(runner.clone())
            .run()
            .unwrap_err();
        assert!(e.downcast_ref::<SecurityInstallationError>().is_some());
        assert!(runner.calls().is_empty());

        touch(&root, AUTHSELECT_TOOL_PATH);
        ConfigureAuthselectTask::new(&root, options())
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert_eq!(
            runner.calls(),
            [Invocation::new(
                AUTHSELECT_TOOL_PATH,
                ["select", "sssd", "with-mkhomedir", "--force"]
            )
            .root(&root)]
        );
    }

    #[test]
    fn test_missing_auth_tools_without_options() {
        let (_td, root) = tempdir();
        let runner = Arc::new(FakeRunner::default());
        let e = ConfigureAuthselectTask::new(&root, vec![])
            .with_runner(runner.clone())
            .run()
            .unwrap_err();
        assert_eq!(e.to_string(), "authselect is missing. Cannot setup authentication.");
        let e = ConfigureAuthconfigTask::new(&root, vec![])
            .with_runner(runner.clone())
            .run()
            .unwrap_err();
        assert!(e.downcast_ref::<SecurityInstallationError>().is_some());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_configure_authconfig() {
        let (_td, root) = tempdir();
        let options = || vec!["--passalgo=yescrypt".to_owned(), "--useshadow".into()];

        let runner = Arc::new(FakeRunner::default());
        let e = ConfigureAuthconfigTask::new(&root, options())
            .with_runner(runner.clone())
            .run()
            .unwrap_err();
        assert_eq!(e.to_string(), "authconfig is missing. Cannot setup authentication.");
        assert!(e.downcast_ref::<SecurityInstallationError>().is_some());
        assert!(runner.calls().is_empty());

        touch(&root, AUTHCONFIG_TOOL_PATH);
        ConfigureAuthconfigTask::new(&root, options())
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert_eq!(
            runner.calls(),
            [Invocation::new(
                AUTHCONFIG_TOOL_PATH,
                ["--update", "--nostart", "--passalgo=yescrypt", "--useshadow"]
            )
            .root(&root)]
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_preconfigure_fips_disabled() {
        PreconfigureFIPSTask::new("/mnt/sysroot", PayloadType::Dnf, false)
            .run()
            .unwrap();
        assert!(logs_contain("FIPS is not enabled. Skipping."));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_preconfigure_fips_payload() {
        PreconfigureFIPSTask::new("/mnt/sysroot", PayloadType::RpmOstree, true)
            .run()
            .unwrap();
        assert!(logs_contain("Don't set up FIPS for the RPM_OSTREE payload."));
    }

    #[test]
    fn test_preconfigure_fips_error() {
        let (_td, host) = tempdir();
        touch(&host, "etc/crypto-policies/config");
        fs::write(host.join("etc/crypto-policies/config"), "DEFAULT\n").unwrap();
        let e = PreconfigureFIPSTask::new("/mnt/sysroot", PayloadType::Dnf, true)
            .with_host_root(&host)
            .run()
            .unwrap_err();
        assert_eq!(
            e.to_string(),
            "FIPS is not correctly set up in the installation environment."
        );
        assert!(e.downcast_ref::<SecurityInstallationError>().is_some());
    }

    #[test]
    fn test_preconfigure_fips() {
        let (_td, host) = tempdir();
        let policies = host.join("etc/crypto-policies");
        fs::create_dir_all(policies.join("back-ends")).unwrap();
        fs::write(policies.join("config"), "FIPS\n").unwrap();
        fs::write(policies.join("back-ends/openssl.config"), "@SYSTEM").unwrap();
        std::os::unix::fs::symlink(
            "/usr/share/crypto-policies/FIPS/gnutls.txt",
            policies.join("back-ends/gnutls.config"),
        )
        .unwrap();
        let (_td2, sysroot) = tempdir();

        PreconfigureFIPSTask::new(&sysroot, PayloadType::Dnf, true)
            .with_host_root(&host)
            .run()
            .unwrap();

        let target = sysroot.join("etc/crypto-policies");
        assert_eq!(fs::read_to_string(target.join("config")).unwrap(), "FIPS\n");
        assert_eq!(
            fs::read_to_string(target.join("back-ends/openssl.config")).unwrap(),
            "@SYSTEM"
        );
        assert_eq!(
            fs::read_link(target.join("back-ends/gnutls.config")).unwrap(),
            std::path::Path::new("/usr/share/crypto-policies/FIPS/gnutls.txt")
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_configure_fips_skipped() {
        let runner = Arc::new(FakeRunner::default());
        ConfigureFIPSTask::new("/mnt/sysroot", false, TargetType::Hardware)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert!(logs_contain("FIPS is not enabled. Skipping."));

        ConfigureFIPSTask::new("/mnt/sysroot", true, TargetType::Image)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert!(logs_contain("Don't set up FIPS on IMAGE."));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_configure_fips() {
        let runner = Arc::new(FakeRunner::default());
        ConfigureFIPSTask::new("/mnt/sysroot", true, TargetType::Hardware)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        assert_eq!(
            runner.calls(),
            [Invocation::new("fips-mode-setup", ["--enable", "--no-bootcfg"]).root("/mnt/sysroot")]
        );
    }

    #[test]
    fn test_set_config_value() {
        assert_eq!(set_config_value("A=1\nB=2\n", "B", "3"), "A=1\nB=3\n");
        assert_eq!(set_config_value("A=1", "B", "3"), "A=1\nB=3\n");
        assert_eq!(set_config_value("BB=1\n", "B", "3"), "BB=1\nB=3\n");
    }

    #[test]
    fn test_payload_type() {
        assert_eq!("dnf".parse::<PayloadType>().unwrap(), PayloadType::Dnf);
        assert_eq!("RPM_OSTREE".parse::<PayloadType>().unwrap(), PayloadType::RpmOstree);
        assert!("tarball".parse::<PayloadType>().is_err());
    }
}
