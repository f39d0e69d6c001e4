//! CLI subcommand modules.
//!
//! This module contains the implementations for all cadiz CLI subcommands.

pub(crate) mod backtest;
pub(crate) mod params;
