//! Interactive prompts using dialoguer

use std::path::Path;

use anyhow::Result;
use dialoguer::Confirm;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Ask before replacing output files that already exist.
/// Returns `true` when nothing exists or the user agrees.
pub fn confirm_overwrite(paths: &[&Path]) -> Result<bool> {
    let existing: Vec<String> = paths
        .iter()
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .collect();

    if existing.is_empty() {
        return Ok(true);
    }

    let message = format!("Overwrite existing {}?", existing.join(", "));
    confirm_step(&message)
}
