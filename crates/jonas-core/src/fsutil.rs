//! Filesystem helpers shared by provisioning and wiring

use std::io;
use std::path::{Component, Path, PathBuf};

/// Recreate `dir` as an empty directory.
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    if std::fs::symlink_metadata(dir).is_ok() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}

/// Copy a directory tree, overwriting files that already exist in `dst`.
///
/// With `dereference`, symlinks in `src` are followed and their targets
/// copied; otherwise they are recreated as symlinks.
pub fn copy_tree(src: &Path, dst: &Path, dereference: bool) -> io::Result<u64> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source directory does not exist: {}", src.display()),
        ));
    }
    std::fs::create_dir_all(dst)?;

    let mut copied = 0;
    let mut entries: Vec<_> = std::fs::read_dir(src)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_symlink() && !dereference {
            let link_target = std::fs::read_link(&src_path)?;
            remove_existing(&dst_path)?;
            symlink(&link_target, &dst_path)?;
            copied += 1;
        } else if std::fs::metadata(&src_path)?.is_dir() {
            copied += copy_tree(&src_path, &dst_path, dereference)?;
        } else {
            if std::fs::symlink_metadata(&dst_path).is_ok_and(|m| !m.is_file()) {
                remove_existing(&dst_path)?;
            }
            std::fs::copy(&src_path, &dst_path)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove whatever sits at `path`, if anything.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create a symlink at `link` pointing to `target`.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Express `target` relative to the directory `from`.
///
/// Both paths must be absolute or both relative to the same base.
pub fn relative_path(target: &Path, from: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().collect();
    let from: Vec<Component> = from.components().collect();
    let common = target
        .iter()
        .zip(from.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}
