/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Layered installer configuration, and the tasks that apply security
//! settings to the installed system.

pub mod cli;
pub mod cmdutils;
pub mod config;
pub mod kernel_args;
pub mod requirement;
pub mod security;
pub mod size;
pub mod task;
