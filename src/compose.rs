use crate::classify::Fragment;
use crate::error::SortError;
use crate::sort_log::SortLog;
use crate::types::SortCounter;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

/// Joins fragments onto `base` in order. Returns every folder on the way; the
/// last one is where the file goes. `None` when no criterion produced a folder.
#[must_use]
pub fn compose(fragments: &[Fragment], base: &Path) -> Option<Vec<PathBuf>> {
    if fragments.iter().all(Fragment::is_empty) {
        return None;
    }

    let mut dest = base.to_path_buf();
    let mut chain = Vec::new();
    for part in fragments.iter().flat_map(Fragment::parts) {
        let name = folder_name(part);
        if name.is_empty() {
            continue;
        }
        dest.push(name);
        chain.push(dest.clone());
    }

    if chain.is_empty() { None } else { Some(chain) }
}

// Keywords are user input; keep each fragment a single path component.
fn folder_name(part: &str) -> String {
    let name = part.trim().replace(['/', '\\'], "_");
    if name == "." || name == ".." {
        String::new()
    } else {
        name
    }
}

/// Creates the folders of a composed chain that do not exist yet. Returns `false`,
/// creating nothing, when a step of the chain is already taken by something other
/// than a folder.
pub fn ensure_folders(
    chain: &[PathBuf],
    counter: &mut SortCounter,
    log: &mut SortLog,
) -> Result<bool, SortError> {
    if let Some(taken) = chain.iter().find(|f| f.exists() && !f.is_dir()) {
        warn!("Cannot create folder {}: a file with that name exists", taken.display());
        return Ok(false);
    }

    for folder in chain {
        if !folder.exists() {
            fs::create_dir_all(folder)
                .map_err(|e| SortError::io("Cannot create folder", folder, e))?;
            log.record(&format!("Folder ({}) created.", folder.display()));
            counter.sorted_folders += 1;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_all_empty() {
        let base = Path::new("/root");
        assert_eq!(compose(&[Fragment::None, Fragment::None], base), None);
        assert_eq!(compose(&[Fragment::Nested(vec![])], base), None);
        assert_eq!(compose(&[], base), None);
    }

    #[test]
    fn test_compose_nests_in_order() {
        let base = Path::new("/root");
        let chain = compose(
            &[
                Fragment::Folder("2024".to_string()),
                Fragment::None,
                Fragment::Nested(vec!["conidia".to_string(), "jar".to_string()]),
            ],
            base,
        )
        .unwrap();
        assert_eq!(
            chain,
            vec![
                PathBuf::from("/root/2024"),
                PathBuf::from("/root/2024/conidia"),
                PathBuf::from("/root/2024/conidia/jar"),
            ]
        );
    }

    #[test]
    fn test_compose_keeps_fragments_single_component() {
        let base = Path::new("/root");
        let chain = compose(
            &[
                Fragment::Folder("a/b".to_string()),
                Fragment::Folder("..".to_string()),
            ],
            base,
        )
        .unwrap();
        assert_eq!(chain, vec![PathBuf::from("/root/a_b")]);
    }

    #[test]
    fn test_ensure_folders_counts_new_only() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("Image");
        fs::create_dir(&existing).unwrap();
        let chain = vec![existing.clone(), existing.join("2024")];

        let mut counter = SortCounter::default();
        let mut log = SortLog::disabled();
        assert!(ensure_folders(&chain, &mut counter, &mut log).unwrap());
        assert_eq!(counter.sorted_folders, 1);
        assert!(existing.join("2024").is_dir());

        assert!(ensure_folders(&chain, &mut counter, &mut log).unwrap());
        assert_eq!(counter.sorted_folders, 1);
    }

    #[test]
    fn test_ensure_folders_refuses_file_in_chain() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("2024");
        fs::write(&taken, "not a folder").unwrap();
        let chain = vec![taken.clone(), taken.join("Image")];

        let mut counter = SortCounter::default();
        let mut log = SortLog::disabled();
        assert!(!ensure_folders(&chain, &mut counter, &mut log).unwrap());
        assert_eq!(counter.sorted_folders, 0);
        assert!(taken.is_file());
    }
}
