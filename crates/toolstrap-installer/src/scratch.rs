use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

pub fn create_scratch_dir(parent: &Path) -> Result<PathBuf> {
    let dir = parent.join(format!(
        "toolstrap-{}-{}",
        current_unix_timestamp()?,
        std::process::id()
    ));
    fs::create_dir(&dir)
        .with_context(|| format!("failed creating scratch workspace: {}", dir.display()))?;
    Ok(dir)
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
