// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Discovering and joining a realm with `realm(8)`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use super::{exists_in_root, REALM_TOOL_PATH};
use crate::cmdutils::{CommandRunner, HostRunner, Invocation};
use crate::task::Task;

const REALM_TOOL: &str = "realm";
const REQUIRED_PACKAGE_PREFIX: &str = "required-package:";
const REALMD_PACKAGE: &str = "realmd";

/// A realm to join, and what discovery found out about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RealmData {
    pub name: String,
    pub discover_options: Vec<String>,
    pub join_options: Vec<String>,
    pub discovered: bool,
    pub required_packages: Vec<String>,
}

/// A realm record shared between the security service and join tasks.
pub type SharedRealm = Rc<RefCell<RealmData>>;

/// Scan the output of `realm discover --verbose` for the discovery marker
/// and the packages the realm needs. Returns `None` if the realm was not
/// discovered.
fn parse_discover_output(name: &str, output: &str) -> Option<Vec<String>> {
    let marker = format!("{name}-discovered");
    let mut discovered = false;
    let mut packages: Vec<String> = Vec::new();
    for line in output.lines().map(str::trim) {
        if line == marker {
            discovered = true;
        } else if let Some(pkg) = line.strip_prefix(REQUIRED_PACKAGE_PREFIX) {
            let pkg = pkg.trim();
            if !pkg.is_empty() && !packages.iter().any(|p| p == pkg) {
                packages.push(pkg.to_owned());
            }
        }
    }
    discovered.then_some(packages)
}

/// Find out whether the realm can be joined and which packages that
/// needs. The task works on its own copy of the realm.
#[derive(Debug)]
pub struct RealmDiscoverTask {
    sysroot: Utf8PathBuf,
    realm: RealmData,
    runner: Arc<dyn CommandRunner>,
}

impl RealmDiscoverTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, realm: RealmData) -> Self {
        Self {
            sysroot: sysroot.into(),
            realm,
            runner: Arc::new(HostRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn realm(&self) -> &RealmData {
        &self.realm
    }
}

impl Task for RealmDiscoverTask {
    type Output = RealmData;

    fn name(&self) -> &'static str {
        "RealmDiscover"
    }

    /// The realm with `discovered` and `required_packages` filled in.
    fn run(self) -> Result<RealmData> {
        let mut realm = self.realm;
        realm.discovered = false;
        realm.required_packages.clear();

        if realm.name.is_empty() {
            tracing::debug!("No realm name set, skipping realm discovery.");
            return Ok(realm);
        }
        if !exists_in_root(&self.sysroot, REALM_TOOL_PATH)? {
            tracing::debug!("The realm tool is not available, skipping realm discovery.");
            return Ok(realm);
        }

        let args = ["discover", "--verbose"]
            .into_iter()
            .map(String::from)
            .chain(realm.discover_options.iter().cloned())
            .chain(std::iter::once(realm.name.clone()));
        let invocation = Invocation::new(REALM_TOOL, args);
        let output = match self.runner.capture(&invocation) {
            Ok(o) => o,
            Err(e) => {
                tracing::error!("Realm discovery failed: {e:#}");
                return Ok(realm);
            }
        };

        match parse_discover_output(&realm.name, &output) {
            Some(packages) => {
                realm.discovered = true;
                realm.required_packages = std::iter::once(REALMD_PACKAGE.to_owned())
                    .chain(packages.into_iter().filter(|p| p != REALMD_PACKAGE))
                    .collect();
                tracing::info!(
                    "Realm {} discovered, required packages: {:?}",
                    realm.name,
                    realm.required_packages
                );
            }
            None => tracing::info!("Realm {} was not discovered.", realm.name),
        }
        Ok(realm)
    }
}

/// Join the installed system to the realm. The realm is read when the
/// task runs, not when it is created.
#[derive(Debug)]
pub struct RealmJoinTask {
    sysroot: Utf8PathBuf,
    realm: SharedRealm,
    runner: Arc<dyn CommandRunner>,
}

fn has_one_time_password(options: &[String]) -> bool {
    options
        .iter()
        .any(|o| o == "--one-time-password" || o.starts_with("--one-time-password="))
}

impl RealmJoinTask {
    pub fn new(sysroot: impl Into<Utf8PathBuf>, realm: SharedRealm) -> Self {
        Self {
            sysroot: sysroot.into(),
            realm,
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

    /// The current state of the shared realm.
    pub fn realm(&self) -> RealmData {
        self.realm.borrow().clone()
    }
}

impl Task for RealmJoinTask {
    type Output = ();

    fn name(&self) -> &'static str {
        "RealmJoin"
    }

    fn run(self) -> Result<()> {
        let realm = self.realm();
        if !realm.discovered {
            tracing::debug!("No realm was discovered, skipping realm join.");
            return Ok(());
        }
        if !exists_in_root(&self.sysroot, REALM_TOOL_PATH)? {
            tracing::debug!("The realm tool is not available, skipping realm join.");
            return Ok(());
        }

        let mut args = vec![
            "join".to_owned(),
            "--install".to_owned(),
            self.sysroot.to_string(),
            "--verbose".to_owned(),
        ];
        if !has_one_time_password(&realm.join_options) {
            args.push("--no-password".to_owned());
        }
        args.extend(realm.join_options.iter().cloned());

        match self.runner.redirect(&Invocation::new(REALM_TOOL, args)) {
            Ok(0) => tracing::info!("Joined realm {}", realm.name),
            Ok(code) => tracing::error!("Joining realm {} failed with exit code {code}", realm.name),
            Err(e) => tracing::error!("Joining realm {} failed: {e:#}", realm.name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdutils::testutils::{FakeRunner, Reply};
    use indoc::indoc;

    fn sysroot_with_realm() -> (tempfile::TempDir, Utf8PathBuf) {
        let td = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(td.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("usr/bin")).unwrap();
        std::fs::write(root.join("usr/bin/realm"), "").unwrap();
        (td, root)
    }

    fn foo_domain() -> RealmData {
        RealmData {
            name: "foo-domain".into(),
            discover_options: vec!["--bar".into(), "baz".into()],
            ..Default::default()
        }
    }

    fn discover(root: &Utf8Path, realm: RealmData, reply: Reply) -> (RealmData, Vec<Invocation>) {
        let runner = Arc::new(FakeRunner::replying([reply]));
        let r = RealmDiscoverTask::new(root, realm)
            .with_runner(runner.clone())
            .run()
            .unwrap();
        (r, runner.calls())
    }

    fn discover_invocation() -> Invocation {
        Invocation::new("realm", ["discover", "--verbose", "--bar", "baz", "foo-domain"])
    }

    #[test]
    fn test_discover_success() {
        let (_td, root) = sysroot_with_realm();
        let output = indoc! {"
            foo-domain-discovered
                required-package:package-foo
                required-package:package-bar
                required-package:package-baz
        "};
        let (r, calls) = discover(&root, foo_domain(), Reply::Output(output.into()));
        assert_eq!(calls, [discover_invocation()]);
        assert!(r.discovered);
        assert_eq!(
            r.required_packages,
            ["realmd", "package-foo", "package-bar", "package-baz"]
        );
        assert_eq!(r.name, "foo-domain");
    }

    #[test]
    fn test_discover_success_with_garbage() {
        let (_td, root) = sysroot_with_realm();
        let output = indoc! {"
            foo-domain-discovered
            stuff-foo
            required-package:package-foo
            required-package:package-bar


            required-package:package-baz
            required-package:package-foo
            required-package:
            unrelatedstuff
        "};
        let (r, _) = discover(&root, foo_domain(), Reply::Output(output.into()));
        assert!(r.discovered);
        assert_eq!(
            r.required_packages,
            ["realmd", "package-foo", "package-bar", "package-baz"]
        );
    }

    #[test]
    fn test_discover_no_extra_packages() {
        let (_td, root) = sysroot_with_realm();
        let output = "foo-domain-discovered\nstuff, stuff\nstuff\ndsdsd dadasd\n";
        let (r, _) = discover(&root, foo_domain(), Reply::Output(output.into()));
        assert!(r.discovered);
        assert_eq!(r.required_packages, ["realmd"]);
    }

    #[test]
    fn test_discover_failure() {
        let (_td, root) = sysroot_with_realm();
        let (r, calls) = discover(&root, foo_domain(), Reply::Output(String::new()));
        assert_eq!(calls, [discover_invocation()]);
        assert!(!r.discovered);
        assert!(r.required_packages.is_empty());

        let (r, _) = discover(
            &root,
            foo_domain(),
            Reply::Output("bar-domain-discovered\nrequired-package:foo\n".into()),
        );
        assert!(!r.discovered);
        assert!(r.required_packages.is_empty());
    }

    #[test]
    fn test_discover_failure_with_error() {
        let (_td, root) = sysroot_with_realm();
        let (r, calls) = discover(&root, foo_domain(), Reply::Fail);
        assert_eq!(calls, [discover_invocation()]);
        assert!(!r.discovered);
        assert!(r.required_packages.is_empty());
    }

    #[test]
    fn test_discover_skipped() {
        let (_td, root) = sysroot_with_realm();
        let realm = RealmData {
            name: String::new(),
            discovered: true,
            required_packages: vec!["stale".into()],
            ..Default::default()
        };
        let (r, calls) = discover(&root, realm, Reply::Output(String::new()));
        assert!(calls.is_empty());
        assert!(!r.discovered);
        assert!(r.required_packages.is_empty());

        let td = tempfile::tempdir().unwrap();
        let empty = Utf8Path::from_path(td.path()).unwrap();
        let (r, calls) = discover(empty, foo_domain(), Reply::Output(String::new()));
        assert!(calls.is_empty());
        assert!(!r.discovered);
    }

    fn join(root: &Utf8Path, join_options: &[&str], discovered: bool, reply: Reply) -> Vec<Invocation> {
        let realm = RealmData {
            name: "foo-realm".into(),
            join_options: join_options.iter().map(|s| s.to_string()).collect(),
            discovered,
            ..Default::default()
        };
        let runner = Arc::new(FakeRunner::replying([reply]));
        RealmJoinTask::new(root, Rc::new(RefCell::new(realm)))
            .with_runner(runner.clone())
            .run()
            .unwrap();
        runner.calls()
    }

    fn join_invocation(root: &Utf8Path, tail: &[&str]) -> Invocation {
        let args = ["join", "--install", root.as_str(), "--verbose"]
            .into_iter()
            .chain(tail.iter().copied());
        Invocation::new("realm", args)
    }

    #[test]
    fn test_join() {
        let (_td, root) = sysroot_with_realm();
        let calls = join(&root, &["--bar", "baz"], true, Reply::Code(0));
        assert_eq!(
            calls,
            [join_invocation(&root, &["--no-password", "--bar", "baz"])]
        );
    }

    #[test]
    fn test_join_one_time_password() {
        let (_td, root) = sysroot_with_realm();
        let calls = join(&root, &["--one-time-password", "abcdefgh"], true, Reply::Code(0));
        assert_eq!(
            calls,
            [join_invocation(&root, &["--one-time-password", "abcdefgh"])]
        );
        let calls = join(&root, &["--one-time-password=abcdefgh"], true, Reply::Code(0));
        assert_eq!(
            calls,
            [join_invocation(&root, &["--one-time-password=abcdefgh"])]
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_join_failures_are_logged() {
        let (_td, root) = sysroot_with_realm();
        let calls = join(&root, &["--one-time-password", "abcdefgh"], true, Reply::Code(1));
        assert_eq!(calls.len(), 1);
        assert!(logs_contain("failed with exit code 1"));

        let calls = join(&root, &["--one-time-password", "abcdefgh"], true, Reply::Fail);
        assert_eq!(calls.len(), 1);
        assert!(logs_contain("Joining realm foo-realm failed"));
    }

    #[test]
    fn test_join_not_discovered() {
        let (_td, root) = sysroot_with_realm();
        let calls = join(&root, &["--bar", "baz"], false, Reply::Code(0));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_join_reads_realm_when_run() {
        let (_td, root) = sysroot_with_realm();
        let shared: SharedRealm = Default::default();
        let runner = Arc::new(FakeRunner::default());
        let task = RealmJoinTask::new(&root, shared.clone()).with_runner(runner.clone());
        *shared.borrow_mut() = RealmData {
            name: "foo-realm".into(),
            join_options: vec!["--bar".into()],
            discovered: true,
            ..Default::default()
        };
        task.run().unwrap();
        assert_eq!(
            runner.calls(),
            [join_invocation(&root, &["--no-password", "--bar"])]
        );
    }
}
