// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The command line interface. This is where the configuration is built
//! and validated, and handed to the services that need it.

use std::io::Write;

use anyhow::{anyhow, Result};
use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::{InstallerConfiguration, ProductRequest};
use crate::kernel_args::KernelArguments;
use crate::security::installation::PayloadType;
use crate::security::realm::RealmData;
use crate::security::{SELinuxMode, SecurityService};
use crate::task::run_logged;

#[derive(Debug, Parser)]
#[clap(name = "installkit", rename_all = "kebab-case")]
/// Installer configuration and security setup
struct Cli {
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Cmd {
    /// Inspect the installer configuration.
    Config {
        #[clap(subcommand)]
        cmd: ConfigCmd,
    },
    /// Configure security of the installed system.
    Security {
        #[clap(subcommand)]
        cmd: SecurityCmd,
    },
}

/// Where the configuration comes from.
#[derive(Debug, clap::Args)]
struct ConfigOpts {
    /// Configuration directory; defaults to $INSTALLKIT_CONFIG_DIR or /etc/installkit
    #[clap(long)]
    config_dir: Option<Utf8PathBuf>,

    /// Product whose configuration is required
    #[clap(long)]
    product: Option<String>,

    /// Variant of the requested product
    #[clap(long, requires = "product")]
    variant: Option<String>,

    /// Product used when no requested product is given
    #[clap(long)]
    default_product: Option<String>,
}

impl ConfigOpts {
    fn load(&self) -> Result<InstallerConfiguration> {
        let mut conf = match self.config_dir.as_deref() {
            Some(dir) => InstallerConfiguration::from_defaults_in(dir),
            None => InstallerConfiguration::from_defaults(),
        }?;
        conf.set_from_product(&ProductRequest {
            requested_product: self.product.clone(),
            requested_variant: self.variant.clone(),
            default_product: self.default_product.clone(),
            ..Default::default()
        })?;
        conf.validate()?;
        Ok(conf)
    }
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum ConfigCmd {
    /// Check that the configuration is complete and valid.
    Validate {
        #[clap(flatten)]
        opts: ConfigOpts,
    },
    /// Print the files the configuration was merged from.
    Sources {
        #[clap(flatten)]
        opts: ConfigOpts,
    },
    /// Write the merged configuration into a file.
    Write {
        #[clap(flatten)]
        opts: ConfigOpts,

        /// Destination file
        #[clap(long)]
        output: Utf8PathBuf,
    },
}

impl ConfigCmd {
    fn run(self) -> Result<()> {
        match self {
            ConfigCmd::Validate { opts } => {
                let conf = opts.load()?;
                println!("Configuration from {} is valid.", conf.config_dir());
            }
            ConfigCmd::Sources { opts } => {
                let conf = opts.load()?;
                let mut stdout = std::io::stdout().lock();
                for source in conf.get_sources() {
                    writeln!(stdout, "{source}")?;
                }
            }
            ConfigCmd::Write { opts, output } => {
                opts.load()?.write(&output)?;
            }
        }
        Ok(())
    }
}

/// Split a shell style argument string.
fn split_args(s: &str) -> Result<Vec<String>> {
    shlex::split(s).ok_or_else(|| anyhow!("Invalid arguments: {s}"))
}

/// Security settings.
#[derive(Debug, clap::Args)]
struct SecurityOpts {
    #[clap(flatten)]
    config: ConfigOpts,

    /// Root of the installed system; overrides the configuration
    #[clap(long)]
    sysroot: Option<Utf8PathBuf>,

    /// Kernel command line; defaults to /proc/cmdline
    #[clap(long)]
    kernel_cmdline: Option<String>,

    /// SELinux mode: default, disabled, enforcing or permissive
    #[clap(long)]
    selinux: Option<SELinuxMode>,

    /// Arguments for authselect, e.g. "select sssd with-mkhomedir"
    #[clap(long, allow_hyphen_values = true)]
    authselect: Option<String>,

    /// Arguments for authconfig
    #[clap(long, allow_hyphen_values = true)]
    authconfig: Option<String>,

    /// Enable fingerprint authentication
    #[clap(long)]
    fingerprint: bool,

    /// Realm to join
    #[clap(long)]
    realm: Option<String>,

    /// Option for realm discovery
    #[clap(long = "realm-discover-option", allow_hyphen_values = true)]
    realm_discover_options: Vec<String>,

    /// Option for joining the realm
    #[clap(long = "realm-join-option", allow_hyphen_values = true)]
    realm_join_options: Vec<String>,
}

impl SecurityOpts {
    fn service(&self) -> Result<SecurityService> {
        let mut conf = self.config.load()?;
        if let Some(sysroot) = self.sysroot.as_ref() {
            conf.document_mut()
                .set("Installation Target", "system_root", sysroot.to_string())?;
        }
        let kernel_args = match self.kernel_cmdline.as_deref() {
            Some(cmdline) => cmdline.parse()?,
            None => KernelArguments::from_proc()?,
        };
        let mut service = SecurityService::new(&conf, &kernel_args)?;
        if let Some(mode) = self.selinux {
            service.set_selinux(mode);
        }
        if let Some(args) = self.authselect.as_deref() {
            service.set_authselect(split_args(args)?);
        }
        if let Some(args) = self.authconfig.as_deref() {
            service.set_authconfig(split_args(args)?);
        }
        service.set_fingerprint_auth_enabled(self.fingerprint);
        if let Some(name) = self.realm.as_ref() {
            service.set_realm(RealmData {
                name: name.clone(),
                discover_options: self.realm_discover_options.clone(),
                join_options: self.realm_join_options.clone(),
                ..Default::default()
            });
        }
        Ok(service)
    }
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum SecurityCmd {
    /// Print the packages required by the security settings as JSON.
    Requirements {
        #[clap(flatten)]
        opts: SecurityOpts,
    },
    /// Apply the security settings to the installed system.
    Install {
        #[clap(flatten)]
        opts: SecurityOpts,
    },
    /// Discover the realm and print the result as JSON.
    RealmDiscover {
        #[clap(flatten)]
        opts: SecurityOpts,
    },
    /// Set up FIPS mode on the installed system.
    Fips {
        #[clap(flatten)]
        opts: SecurityOpts,

        /// The payload installing the system
        #[clap(long, default_value = "DNF")]
        payload: PayloadType,
    },
}

fn print_json<T: serde::Serialize>(v: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, v)?;
    writeln!(stdout)?;
    Ok(())
}

impl SecurityCmd {
    fn run(self) -> Result<()> {
        match self {
            SecurityCmd::Requirements { opts } => {
                let mut service = opts.service()?;
                if !service.realm().name.is_empty() {
                    let realm = run_logged(service.discover_realm_with_task())?;
                    service.set_realm(realm);
                }
                print_json(&service.collect_requirements())
            }
            SecurityCmd::Install { opts } => {
                let mut service = opts.service()?;
                // The join task reads the realm once discovery updated it.
                let join = service.join_realm_with_task();
                if !service.realm().name.is_empty() {
                    let realm = run_logged(service.discover_realm_with_task())?;
                    service.set_realm(realm);
                }
                for task in service.install_with_tasks() {
                    run_logged(task)?;
                }
                run_logged(join)
            }
            SecurityCmd::RealmDiscover { opts } => {
                let service = opts.service()?;
                if service.realm().name.is_empty() {
                    anyhow::bail!("No realm given, use --realm");
                }
                let realm = run_logged(service.discover_realm_with_task())?;
                print_json(&realm)
            }
            SecurityCmd::Fips { opts, payload } => {
                let service = opts.service()?;
                run_logged(service.preconfigure_fips_with_task(payload))?;
                run_logged(service.configure_fips_with_task())
            }
        }
    }
}

impl Cmd {
    fn run(self) -> Result<()> {
        match self {
            Cmd::Config { cmd } => cmd.run(),
            Cmd::Security { cmd } => cmd.run(),
        }
    }
}

/// Primary entrypoint of the `installkit` command.
pub fn entrypoint(args: &[&str]) -> Result<i32> {
    let cli = Cli::parse_from(args);
    cli.cmd.run()?;
    Ok(0)
}
