use crate::error::SortError;
use log::{info, warn};
use std::cmp::Reverse;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

/// Frames lines between dashed borders as wide as the longest line.
#[must_use]
pub fn msg_creator<S: AsRef<str>>(lines: &[S]) -> String {
    let width = lines
        .iter()
        .map(|l| l.as_ref().chars().count())
        .max()
        .unwrap_or(0);
    let border = "-".repeat(width);

    let mut msg = String::new();
    msg.push_str(&border);
    msg.push('\n');
    for line in lines {
        msg.push_str(line.as_ref());
        msg.push('\n');
    }
    msg.push_str(&border);
    msg.push('\n');
    msg
}

/// Canonicalizes ignored folders. Relative entries are looked up under `root`
/// first, then under the working directory; entries that do not exist are dropped.
#[must_use]
pub fn resolve_ignored(root: &Path, ignore: &[PathBuf]) -> Vec<PathBuf> {
    ignore
        .iter()
        .filter_map(|dir| {
            let candidates = if dir.is_absolute() {
                vec![dir.clone()]
            } else {
                vec![root.join(dir), dir.clone()]
            };
            let resolved = candidates.iter().find_map(|c| c.canonicalize().ok());
            if resolved.is_none() {
                warn!("Ignored folder {} does not exist", dir.display());
            }
            resolved
        })
        .collect()
}

/// `ignored` must already be canonical (see [`resolve_ignored`]).
#[must_use]
pub fn is_ignored(path: &Path, ignored: &[PathBuf]) -> bool {
    ignored.iter().any(|dir| dir == path)
}

/// Number of files under `root`, leaving out ignored folders and everything below them.
pub fn get_file_count(root: &Path, ignore: &[PathBuf]) -> Result<usize, SortError> {
    let root = root
        .canonicalize()
        .map_err(|e| SortError::io("Cannot open folder", root, e))?;
    let ignored = resolve_ignored(&root, ignore);

    let mut count = 0;
    for entry in WalkDir::new(&root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path(), &ignored))
    {
        if is_sortable_file(&entry?) {
            count += 1;
        }
    }
    Ok(count)
}

/// Entries under `root` deepest first, so a folder always follows its contents.
/// Ignored folders are pruned with everything below them and returned separately.
pub fn walk_bottom_up(
    root: &Path,
    ignored: &[PathBuf],
) -> Result<(Vec<DirEntry>, Vec<PathBuf>), SortError> {
    let mut skipped = Vec::new();
    let mut entries = Vec::new();

    // Pruning only works top-down; walkdir cannot skip a subtree it has already yielded.
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.file_type().is_dir() && is_ignored(e.path(), ignored) {
                skipped.push(e.path().to_path_buf());
                false
            } else {
                true
            }
        });
    for entry in walker {
        entries.push(entry?);
    }

    entries.sort_by_key(|e| Reverse(e.depth()));
    Ok((entries, skipped))
}

/// Regular files and symlinks to files. Other symlinks are reported and left alone.
#[must_use]
pub fn is_sortable_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if file_type.is_symlink() {
        if entry.path().is_file() {
            return true;
        }
        warn!("Skipped symlink {}: it does not point to a file", entry.path().display());
    }
    false
}

/// First folder below `root` on the way to `path`, e.g. `a` for `root/a/b/c`.
#[must_use]
pub fn get_base_folder(root: &Path, path: &Path) -> Option<String> {
    match path.strip_prefix(root).ok()?.components().next()? {
        Component::Normal(name) => Some(name.to_string_lossy().to_string()),
        _ => None,
    }
}

/// Abbreviates a long path to its last `show_dirs` parents, e.g. `/.../docs/reports`.
#[must_use]
pub fn shorten_path(path: &Path, show_dirs: usize) -> String {
    let folder = path
        .file_name()
        .map_or_else(|| path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string());

    let prefix = match path.components().next() {
        Some(Component::Prefix(p)) => p.as_os_str().to_string_lossy().to_string(),
        _ => String::new(),
    };

    let mut dirs = Vec::new();
    let mut current = path.parent();
    for _ in 0..show_dirs {
        let Some(parent) = current else { break };
        let Some(name) = parent.file_name() else { break };
        dirs.push(name.to_string_lossy().to_string());
        current = parent.parent();
    }
    dirs.reverse();

    if dirs.is_empty() {
        format!("{prefix}/.../{folder}")
    } else {
        format!("{prefix}/.../{}/{folder}", dirs.join("/"))
    }
}

/// Runs `f` and logs how long it took.
pub fn timed<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    info!(
        "Time elapsed for {label}: {:.3} seconds",
        start.elapsed().as_secs_f64()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_msg_creator_border() {
        let msg = msg_creator(&["short", "a longer line"]);
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "-".repeat(13));
        assert_eq!(lines[3], lines[0]);
        assert_eq!(lines[2], "a longer line");
    }

    #[test]
    fn test_get_base_folder() {
        let root = Path::new("/data/photos");
        assert_eq!(
            get_base_folder(root, Path::new("/data/photos/2024/march")).as_deref(),
            Some("2024")
        );
        assert_eq!(get_base_folder(root, Path::new("/data/photos")), None);
        assert_eq!(get_base_folder(root, Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn test_shorten_path() {
        let path = Path::new("/home/user/documents/reports");
        assert_eq!(shorten_path(path, 1), "/.../documents/reports");
        assert_eq!(shorten_path(path, 2), "/.../user/documents/reports");
        assert_eq!(shorten_path(Path::new("/reports"), 1), "/.../reports");
    }

    #[test]
    fn test_file_count_skips_ignored_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("skip/nested")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("keep/b.txt"), "b").unwrap();
        fs::write(root.join("skip/c.txt"), "c").unwrap();
        fs::write(root.join("skip/nested/d.txt"), "d").unwrap();

        assert_eq!(get_file_count(root, &[]).unwrap(), 4);
        assert_eq!(get_file_count(root, &[PathBuf::from("skip")]).unwrap(), 2);
        assert_eq!(
            get_file_count(root, &[PathBuf::from("does-not-exist")]).unwrap(),
            4
        );
    }

    #[test]
    fn test_walk_bottom_up_prunes_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("a/skip/deep")).unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/skip/deep/x.txt"), "x").unwrap();
        fs::write(root.join("a/b/y.txt"), "y").unwrap();
        fs::write(root.join("a/z.txt"), "z").unwrap();

        let ignored = resolve_ignored(&root, &[PathBuf::from("a/skip")]);
        let (entries, skipped) = walk_bottom_up(&root, &ignored).unwrap();
        let paths: Vec<PathBuf> = entries.iter().map(|e| e.path().to_path_buf()).collect();

        assert_eq!(skipped, vec![root.join("a/skip")]);
        assert!(paths.iter().all(|p| !p.starts_with(root.join("a/skip"))));
        let pos = |rel: &str| paths.iter().position(|p| *p == root.join(rel)).unwrap();
        assert!(pos("a/b/y.txt") < pos("a/b"));
        assert!(pos("a/b") < pos("a"));
        assert!(pos("a/z.txt") < pos("a"));
        assert_eq!(paths.last(), Some(&root));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_to_files_are_sortable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("sub"), root.join("dirlink")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("broken.txt")).unwrap();

        assert_eq!(get_file_count(root, &[]).unwrap(), 2);
    }
}
