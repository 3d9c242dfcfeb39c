//! DXVK installer library.
//!
//! This crate provides the core functionality for installing DXVK into a game
//! folder: detecting the game's architecture and graphics API, fetching and
//! extracting the matching libraries from a DXVK release, and replacing the
//! game's libraries with a reversible backup. It is used by the `dxvk-manager`
//! CLI binary and can be consumed programmatically for testing or custom
//! installation workflows.
//!
//! # Modules
//!
//! - [`architecture`] - 32-bit/64-bit detection from executable headers
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Read-only subcommand handlers
//! - [`config`] - Optional TOML configuration file
//! - [`diagnostics`] - Human-readable trail of an attempt
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Semantic error types with recovery hints
//! - [`file_set`] - Libraries required per graphics API
//! - [`graphics_api`] - Graphics API inference from marker libraries
//! - [`install_log`] - Persistent record of successful installs
//! - [`outcome`] - Terminal results and per-file failures
//! - [`output`] - Output formatting for the CLI
//! - [`permissions`] - Write-access checks and remediation hints
//! - [`pipeline`] - Install and uninstall orchestration
//! - [`release`] - Release retrieval and archive extraction
//! - [`transaction`] - Backup, replace, verify, and restore
//! - [`wine`] - Wine prefix discovery and path mapping

pub mod architecture;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod dirs;
pub mod error;
pub mod file_set;
pub mod graphics_api;
pub mod install_log;
pub mod outcome;
pub mod output;
pub mod permissions;
pub mod pipeline;
pub mod release;
pub mod transaction;
pub mod wine;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
