//! Saving validated files and applying owner and permission changes

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use bitflags::bitflags;
use tempfile::TempDir;

use crate::error::AclError;

bitflags! {
    /// Owner permission bits derived from the `change_ownership_mode`
    /// letters r, w and x
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u32 {
        const READ = 0o400;
        const WRITE = 0o200;
        const EXECUTE = 0o100;
    }
}

impl std::str::FromStr for FileMode {
    type Err = AclError;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        if s.is_empty() {
            return Err(AclError::InvalidMode(s.to_string()));
        }
        let mut mode = FileMode::empty();
        for letter in s.chars() {
            match letter {
                'r' => mode |= FileMode::READ,
                'w' => mode |= FileMode::WRITE,
                'x' => mode |= FileMode::EXECUTE,
                _ => return Err(AclError::InvalidMode(s.to_string())),
            }
        }
        Ok(mode)
    }
}

/// Write the working bytes into a fresh temp directory so external
/// steps can be handed a real path.
///
/// The returned guard removes the directory when dropped.
pub fn stage_temp_copy(bytes: &[u8], extension: &str) -> io::Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let name = if extension.is_empty() {
        "upload".to_string()
    } else {
        format!("upload.{}", extension)
    };
    let path = dir.path().join(name);
    fs::write(&path, bytes)?;
    Ok((dir, path))
}

/// Write a validated file into the output directory and return its
/// absolute path. The directory must already exist.
pub fn save_to_output_dir(output_dir: &Path, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = output_dir.join(file_name);
    fs::write(&path, bytes)?;
    path.canonicalize()
}

/// Change owner and permissions of a saved file.
///
/// The mode is parsed first so a bad config never half-applies; the
/// owner may be a user name or a numeric uid.
#[cfg(unix)]
pub fn apply_acl(path: &Path, user: &str, mode: &str) -> StdResult<(), AclError> {
    use std::os::unix::fs::PermissionsExt;

    let mode: FileMode = mode.parse()?;
    let uid = resolve_uid(user)?;
    std::os::unix::fs::chown(path, Some(uid), None)
        .map_err(|err| AclError::ChangeOwner(err.to_string()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
        .map_err(|err| AclError::SetPermissions(err.to_string()))
}

#[cfg(not(unix))]
pub fn apply_acl(path: &Path, user: &str, mode: &str) -> StdResult<(), AclError> {
    let mode: FileMode = mode.parse()?;
    let metadata =
        fs::metadata(path).map_err(|err| AclError::SetPermissions(err.to_string()))?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(!mode.contains(FileMode::WRITE));
    fs::set_permissions(path, permissions)
        .map_err(|err| AclError::SetPermissions(err.to_string()))?;
    if !user.is_empty() {
        return Err(AclError::Unsupported);
    }
    Ok(())
}

/// A numeric string is taken as the uid itself; anything else is
/// looked up in /etc/passwd.
#[cfg(unix)]
fn resolve_uid(user: &str) -> StdResult<u32, AclError> {
    if let Ok(uid) = user.parse::<u32>() {
        return Ok(uid);
    }
    let passwd = fs::read_to_string("/etc/passwd")
        .map_err(|err| AclError::UnknownUser(format!("{}: {}", user, err)))?;
    passwd
        .lines()
        .find_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let uid = fields.next()?;
            (name == user).then(|| uid.parse::<u32>().ok()).flatten()
        })
        .ok_or_else(|| AclError::UnknownUser(user.to_string()))
}
