use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::fs_utils::{path_exists, remove_file_if_exists};

/// Comment line marking a block this tool appended to a shell profile.
pub fn profile_tag(tool_name: &str) -> String {
    format!("# added by toolstrap: {tool_name} PATH")
}

pub fn render_profile_block(tag: &str, bin_dir: &Path) -> String {
    format!("{tag}\nexport PATH=\"{}:$PATH\"\n", bin_dir.display())
}

/// Exactly what one append wrote, enough to take it back out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEdit {
    pub created: bool,
    /// File length before the append.
    pub offset: u64,
    /// Bytes written, including a repaired trailing newline.
    pub appended: String,
}

/// Appends `block` to `profile`, creating the file when absent.
///
/// Appending is not deduplicating: every call adds another block. On failure
/// a file created here is deleted and an existing file is cut back to its
/// previous length.
pub fn append_profile_block(profile: &Path, block: &str) -> Result<ProfileEdit> {
    append_profile_block_with(profile, block, |file, bytes| file.write_all(bytes))
}

pub(crate) fn append_profile_block_with<W>(
    profile: &Path,
    block: &str,
    write: W,
) -> Result<ProfileEdit>
where
    W: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let created = !path_exists(profile);
    let existing = match fs::read(profile) {
        Ok(existing) => existing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to update profile {}", profile.display()));
        }
    };
    let offset = existing.len() as u64;

    let mut appended = String::new();
    if existing.last().is_some_and(|byte| *byte != b'\n') {
        appended.push('\n');
    }
    appended.push_str(block);

    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .and_then(|mut file| {
            write(&mut file, appended.as_bytes())?;
            file.flush()
        });
    if let Err(err) = result {
        if created {
            let _ = remove_file_if_exists(profile);
        } else {
            let _ = truncate_to(profile, offset);
        }
        return Err(err).with_context(|| format!("failed to update profile {}", profile.display()));
    }

    Ok(ProfileEdit {
        created,
        offset,
        appended,
    })
}

/// Takes back one earlier append. When the file still ends with exactly the
/// appended bytes at `offset` it is cut back to `offset`; otherwise only the
/// last copy of the block is removed. Every other byte is kept as is, line
/// endings included. Returns whether anything was removed.
pub fn revert_profile_append(profile: &Path, offset: u64, appended: &str) -> Result<bool> {
    let contents = match fs::read(profile) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read profile {}", profile.display()))
        }
    };

    let appended = appended.as_bytes();
    let untouched = usize::try_from(offset)
        .ok()
        .filter(|start| contents.len() == start + appended.len())
        .is_some_and(|start| &contents[start..] == appended);
    if untouched {
        truncate_to(profile, offset)
            .with_context(|| format!("failed to truncate profile {}", profile.display()))?;
        return Ok(true);
    }

    let block = appended.strip_prefix(b"\n").unwrap_or(appended);
    let Some(start) = last_block_position(&contents, block) else {
        return Ok(false);
    };
    let mut rewritten = contents[..start].to_vec();
    rewritten.extend_from_slice(&contents[start + block.len()..]);
    fs::write(profile, rewritten)
        .with_context(|| format!("failed to rewrite profile {}", profile.display()))?;
    Ok(true)
}

fn last_block_position(contents: &[u8], block: &[u8]) -> Option<usize> {
    if block.is_empty() || block.len() > contents.len() {
        return None;
    }
    contents
        .windows(block.len())
        .enumerate()
        .rev()
        .find(|(start, window)| *window == block && (*start == 0 || contents[start - 1] == b'\n'))
        .map(|(start, _)| start)
}

fn truncate_to(profile: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(profile)?.set_len(len)
}
