//! Installation probe for the package-manager executable.
//!
//! Registration is skipped entirely when this probe fails, so it must be
//! cheap and must not panic.

use crate::config::CnfConfig;
use crate::error::{CnfError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const PACKAGE_MANAGER_BINARY: &str = "winget";

#[cfg(windows)]
const LOOKUP_COMMAND: &str = "where";
#[cfg(not(windows))]
const LOOKUP_COMMAND: &str = "which";

/// Resolves the package-manager executable: explicit config path first, then
/// the PATH lookup, then the App Installer alias directory.
pub fn find_package_manager(config: &CnfConfig) -> Result<PathBuf> {
    if let Some(path) = &config.winget_path {
        if path.is_file() {
            return Ok(path.clone());
        }
        return Err(CnfError::NotInstalled(path.display().to_string()));
    }

    which_with_fallback(PACKAGE_MANAGER_BINARY, &app_installer_candidates())
        .ok_or_else(|| CnfError::NotInstalled(PACKAGE_MANAGER_BINARY.to_string()))
}

pub fn is_package_manager_installed(config: &CnfConfig) -> bool {
    find_package_manager(config).is_ok()
}

fn which(binary: &str) -> Option<PathBuf> {
    let output = Command::new(LOOKUP_COMMAND)
        .arg(binary)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if output.status.success() {
        // `where` may print several matches; the first one wins.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout.lines().next().unwrap_or("").trim();
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn which_with_fallback(binary: &str, fallback_paths: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = which(binary) {
        return Some(path);
    }

    // App execution aliases are not always on PATH for non-interactive hosts
    fallback_paths
        .iter()
        .find(|path| is_file(path))
        .cloned()
}

fn app_installer_candidates() -> Vec<PathBuf> {
    dirs::data_local_dir()
        .map(|local| {
            vec![local
                .join("Microsoft")
                .join("WindowsApps")
                .join("winget.exe")]
        })
        .unwrap_or_default()
}

fn is_file(path: &Path) -> bool {
    path.exists() && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_must_exist() {
        let config = CnfConfig {
            winget_path: Some(PathBuf::from("/definitely/not/a/real/winget.exe")),
            ..CnfConfig::default()
        };
        let err = find_package_manager(&config).unwrap_err();
        assert!(matches!(err, CnfError::NotInstalled(_)));
        assert!(!is_package_manager_installed(&config));
    }

    #[test]
    fn explicit_existing_path_is_used() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let fake = temp_dir.path().join("winget.exe");
        fs_err::write(&fake, b"").expect("write fake binary");

        let config = CnfConfig {
            winget_path: Some(fake.clone()),
            ..CnfConfig::default()
        };
        assert_eq!(find_package_manager(&config).expect("found"), fake);
    }

    #[test]
    fn fallback_paths_are_checked_after_lookup() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let fake = temp_dir.path().join("winget.exe");
        fs_err::write(&fake, b"").expect("write fake binary");

        let found = which_with_fallback(
            "definitely-not-a-real-binary-name",
            &[temp_dir.path().join("missing.exe"), fake.clone()],
        );
        assert_eq!(found, Some(fake));
    }
}
