//! Params command implementation.

use std::path::Path;

use anyhow::Result;

use crate::data;

/// Print the resolved strategy parameters as JSON.
pub(crate) fn show_params(params: Option<&Path>) -> Result<()> {
    let params = data::resolve_params(params)?;
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}
