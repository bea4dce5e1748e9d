//! Source file discovery.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::{err_msg, MockshiftError};

/// Files under `roots` whose extension is one of `extensions`, sorted and
/// without duplicates. A root that is itself a file is taken as given.
pub fn discover_sources<P: AsRef<Path>>(
    roots: &[P],
    extensions: &[String],
) -> Result<Vec<PathBuf>, MockshiftError> {
    let mut files = Vec::new();
    for root in roots {
        let root = root.as_ref();
        if root.is_file() {
            files.push(root.to_path_buf());
            continue;
        }
        if !root.exists() {
            return Err(err_msg!(Io, "no such file or directory: {}", root.display()));
        }
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| err_msg!(Io, "failed to walk {}: {}", root.display(), e))?;
            if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    debug!(count = files.len(), "discovered source files");
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.trim_start_matches('.') == e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_sources_recursively_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/Z.java"), "class Z {}").unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover_sources(&[dir.path()], &["java".to_string()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("A.java"), PathBuf::from("b/nested/Z.java")]);
    }

    #[test]
    fn explicit_files_are_kept_and_missing_roots_fail() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Only.groovy");
        fs::write(&file, "").unwrap();
        assert_eq!(discover_sources(&[&file], &["java".to_string()]).unwrap(), vec![file.clone()]);
        assert!(discover_sources(&[dir.path().join("missing")], &["java".to_string()]).is_err());
    }
}
