//! Writing exports to disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::ExportResult;

const SHEBANG: &str = "#!/bin/bash\n\n";

/// Write `result` to `dir/{stem}{extension}` and return the path.
///
/// Shell scripts get a bash shebang; Python and shell scripts are made
/// executable on Unix.
pub fn write_export(dir: &Path, stem: &str, result: &ExportResult) -> Result<PathBuf> {
    let path = dir.join(format!("{}{}", stem, result.extension));

    let contents = if result.extension == ".sh" {
        format!("{}{}", SHEBANG, result.content)
    } else {
        result.content.clone()
    };

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    if matches!(result.extension, ".py" | ".sh") {
        make_executable(&path)?;
    }

    info!("Exported {} bytes to {}", result.content.len(), path.display());
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to make {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
