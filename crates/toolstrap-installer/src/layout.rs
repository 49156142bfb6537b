use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use toolstrap_core::{Catalog, InstallBase, ToolSpec};

/// Every filesystem location the provisioner reads or writes.
///
/// Catalog paths are relative; the layout roots them either at the system
/// root or at the invoking user's home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    system_root: PathBuf,
    user_home: PathBuf,
    scratch_parent: PathBuf,
    user_owner: Option<(u32, u32)>,
}

impl InstallLayout {
    pub fn new(
        system_root: impl Into<PathBuf>,
        user_home: impl Into<PathBuf>,
        scratch_parent: impl Into<PathBuf>,
    ) -> Self {
        Self {
            system_root: system_root.into(),
            user_home: user_home.into(),
            scratch_parent: scratch_parent.into(),
            user_owner: None,
        }
    }

    /// Owner that user-home artifacts are handed back to after installation.
    pub fn with_user_owner(mut self, uid: u32, gid: u32) -> Self {
        self.user_owner = Some((uid, gid));
        self
    }

    /// Resolves the layout for the current process. Under `sudo` the home
    /// directory and ownership come from the invoking user, not root.
    pub fn from_env() -> Result<Self> {
        let sudo_user = std::env::var("SUDO_USER")
            .ok()
            .filter(|user| !user.trim().is_empty() && user != "root");

        let user_home = match sudo_user.as_deref().and_then(home_of_user) {
            Some(home) => home,
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .context("HOME is not set; cannot resolve the user home directory")?,
        };

        let mut layout = Self::new("/", user_home, std::env::temp_dir());
        if sudo_user.is_some() {
            if let Some((uid, gid)) = sudo_owner_from_env()? {
                layout = layout.with_user_owner(uid, gid);
            }
        }
        Ok(layout)
    }

    pub fn system_root(&self) -> &Path {
        &self.system_root
    }

    pub fn user_home(&self) -> &Path {
        &self.user_home
    }

    pub fn scratch_parent(&self) -> &Path {
        &self.scratch_parent
    }

    pub fn user_owner(&self) -> Option<(u32, u32)> {
        self.user_owner
    }

    fn base_dir(&self, base: InstallBase) -> &Path {
        match base {
            InstallBase::System => &self.system_root,
            InstallBase::UserHome => &self.user_home,
        }
    }

    pub fn install_root(&self, tool: &ToolSpec) -> PathBuf {
        self.base_dir(tool.install_base).join(&tool.install_root)
    }

    pub fn binary_path(&self, tool: &ToolSpec) -> PathBuf {
        self.install_root(tool).join(&tool.binary)
    }

    pub fn paths_d_dir(&self) -> PathBuf {
        self.system_root.join("etc").join("paths.d")
    }

    pub fn profile_d_dir(&self) -> PathBuf {
        self.system_root.join("etc").join("profile.d")
    }

    /// Both conventional PATH-integration files for a tool; at most one is
    /// ever written.
    pub fn integration_candidates(&self, tool: &ToolSpec) -> [PathBuf; 2] {
        [
            self.paths_d_dir().join(&tool.name),
            self.profile_d_dir().join(format!("{}.sh", tool.name)),
        ]
    }

    pub fn profile_paths(&self, catalog: &Catalog) -> Vec<PathBuf> {
        catalog
            .profiles
            .iter()
            .map(|profile| self.user_home.join(profile))
            .collect()
    }
}

fn sudo_owner_from_env() -> Result<Option<(u32, u32)>> {
    let (Ok(uid), Ok(gid)) = (std::env::var("SUDO_UID"), std::env::var("SUDO_GID")) else {
        return Ok(None);
    };
    let uid = uid
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("SUDO_UID is not a numeric id: {uid}"))?;
    let gid = gid
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("SUDO_GID is not a numeric id: {gid}"))?;
    Ok(Some((uid, gid)))
}

#[cfg(unix)]
fn home_of_user(user: &str) -> Option<PathBuf> {
    use std::ffi::{CStr, CString, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let name = CString::new(user).ok()?;
    // SAFETY: getpwnam returns null or a pointer to static storage that stays
    // valid until the next getpw* call; the directory is copied out before
    // returning and nothing else in this process calls getpw*.
    unsafe {
        let entry = libc::getpwnam(name.as_ptr());
        if entry.is_null() || (*entry).pw_dir.is_null() {
            return None;
        }
        let dir = CStr::from_ptr((*entry).pw_dir);
        Some(PathBuf::from(OsStr::from_bytes(dir.to_bytes())))
    }
}

#[cfg(not(unix))]
fn home_of_user(_user: &str) -> Option<PathBuf> {
    None
}
