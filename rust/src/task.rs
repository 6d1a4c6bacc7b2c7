// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot installation tasks.

use anyhow::Result;

/// A unit of installation work. Running a task consumes it, so every task
/// runs at most once.
pub trait Task {
    type Output;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn run(self) -> Result<Self::Output>;
}

/// Run a task, logging when it starts and how it ended.
pub fn run_logged<T: Task>(task: T) -> Result<T::Output> {
    let name = task.name();
    tracing::info!("Running task {name}");
    let r = task.run();
    match &r {
        Ok(_) => tracing::debug!("Task {name} finished"),
        Err(e) => tracing::error!("Task {name} failed: {e:#}"),
    }
    r
}
