//! Helpers intended for [`std::process::Command`], and the [`CommandRunner`]
//! seam used by tasks to invoke tools of the target system.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::{
    fmt,
    io::{BufRead, Read, Seek},
    os::unix::process::CommandExt,
    process::{Command, ExitStatus, Stdio},
};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Helpers intended for [`std::process::Command`].
pub trait CommandRunExt {
    /// Log (at debug level) the full child commandline.
    fn log_debug(&mut self) -> &mut Self;

    /// Ensure the child does not outlive the parent.
    fn lifecycle_bind(&mut self) -> &mut Self;

    /// Run the child with `root` as its root directory.
    fn chroot_into(&mut self, root: &Utf8Path) -> &mut Self;

    /// Execute the child process and return its exit status along with
    /// the captured stdout. A failing child is not an error.
    fn run_get_output(&mut self) -> Result<(ExitStatus, Box<dyn BufRead>)>;
}

/// Parse the last chunk (e.g. 1024 bytes) from the provided file,
/// ensure it's UTF-8, and return that value. This function is infallible;
/// if the file cannot be read for some reason, a copy of a static string
/// is returned.
fn last_utf8_content_from_file(mut f: std::fs::File) -> String {
    // u16 since we truncate to just the trailing bytes here
    // to avoid pathological error messages
    const MAX_OUTPUT_BYTES: u16 = 1024;
    let size = f
        .metadata()
        .map_err(|e| {
            tracing::warn!("failed to fstat: {e}");
        })
        .map(|m| m.len().try_into().unwrap_or(u16::MAX))
        .unwrap_or(0);
    let size = size.min(MAX_OUTPUT_BYTES);
    let mut buf = Vec::with_capacity(size.into());
    match f
        .seek(std::io::SeekFrom::End(-i64::from(size)))
        .and_then(|_| f.read_to_end(&mut buf))
    {
        Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
        Err(e) => {
            tracing::warn!("failed seek+read: {e}");
            "<failed to read output>".into()
        }
    }
}

impl CommandRunExt for Command {
    /// Output a debug-level log message with this command.
    fn log_debug(&mut self) -> &mut Self {
        // We unconditionally log at trace level, so avoid double logging
        if !tracing::enabled!(tracing::Level::TRACE) {
            tracing::debug!("exec: {self:?}");
        }
        self
    }

    #[allow(unsafe_code)]
    fn lifecycle_bind(&mut self) -> &mut Self {
        // SAFETY: This API is safe to call in a forked child.
        unsafe {
            self.pre_exec(|| {
                rustix::process::set_parent_process_death_signal(Some(
                    rustix::process::Signal::TERM,
                ))
                .map_err(Into::into)
            })
        }
    }

    #[allow(unsafe_code)]
    fn chroot_into(&mut self, root: &Utf8Path) -> &mut Self {
        let root = root.as_std_path().to_owned();
        // SAFETY: chroot(2) and chdir(2) are async-signal-safe.
        unsafe {
            self.pre_exec(move || {
                rustix::process::chroot(&root)?;
                rustix::process::chdir("/")?;
                Ok(())
            })
        }
    }

    fn run_get_output(&mut self) -> Result<(ExitStatus, Box<dyn BufRead>)> {
        let mut stdout = tempfile::tempfile()?;
        self.stdout(stdout.try_clone()?);
        tracing::trace!("exec: {self:?}");
        let status = self.status()?;
        stdout.seek(std::io::SeekFrom::Start(0)).context("seek")?;
        Ok((status, Box::new(std::io::BufReader::new(stdout))))
    }
}

/// An external tool invocation, optionally rooted in another directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub root: Option<Utf8PathBuf>,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            root: None,
        }
    }

    /// Run the tool chrooted into `root`.
    pub fn root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut c = Command::new(&self.program);
        c.args(&self.args).stdin(Stdio::null()).lifecycle_bind();
        if let Some(root) = self.root.as_deref() {
            c.chroot_into(root);
        }
        c
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let argv = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(argv) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{} {:?}", self.program, self.args),
        }?;
        if let Some(root) = self.root.as_deref() {
            write!(f, " (in {root})")?;
        }
        Ok(())
    }
}

/// Runs external tools on behalf of tasks.
pub trait CommandRunner: fmt::Debug {
    /// Run the tool and return its standard output. The standard error is
    /// discarded and the exit status is ignored; only a failure to start
    /// the tool is an error.
    fn capture(&self, invocation: &Invocation) -> Result<String>;

    /// Run the tool, forwarding its output to the log, and return its
    /// exit code.
    fn redirect(&self, invocation: &Invocation) -> Result<i32>;
}

/// Runs tools on this host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRunner;

impl CommandRunner for HostRunner {
    fn capture(&self, invocation: &Invocation) -> Result<String> {
        let mut c = invocation.to_command();
        c.stderr(Stdio::null()).log_debug();
        let (status, mut output) = c
            .run_get_output()
            .with_context(|| format!("Running {invocation}"))?;
        if !status.success() {
            tracing::debug!("{invocation} exited with {status}");
        }
        let mut r = String::new();
        output.read_to_string(&mut r)?;
        Ok(r)
    }

    fn redirect(&self, invocation: &Invocation) -> Result<i32> {
        let mut c = invocation.to_command();
        let log = tempfile::tempfile()?;
        c.stderr(log.try_clone()?).log_debug();
        let (status, output) = c
            .run_get_output()
            .with_context(|| format!("Running {invocation}"))?;
        for line in output.lines() {
            tracing::info!("{}", line?);
        }
        let code = status.code().unwrap_or(-1);
        if !status.success() {
            let stderr = last_utf8_content_from_file(log);
            tracing::warn!("{invocation} exited with {status}\n{stderr}");
        }
        Ok(code)
    }
}
