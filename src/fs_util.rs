use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::error::PlanError;

pub fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf, PlanError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| PlanError::NonUtf8Path(path.to_string_lossy().to_string()))
}

pub fn resolve_existing(base: &Utf8Path, raw: &str) -> Result<Utf8PathBuf, PlanError> {
    let candidate = base.join(raw.trim());
    let canonical = fs::canonicalize(candidate.as_std_path())
        .map_err(|err| PlanError::MissingInput(format!("{candidate}: {err}")))?;
    to_utf8(canonical)
}

pub fn resolve_new(base: &Utf8Path, raw: &str) -> Result<Utf8PathBuf, PlanError> {
    let candidate = base.join(raw.trim());
    let name = candidate
        .file_name()
        .ok_or_else(|| PlanError::InvalidValue {
            key: "project_path",
            value: raw.to_string(),
        })?
        .to_string();
    let parent = candidate.parent().unwrap_or(Utf8Path::new("/"));
    let parent = fs::canonicalize(parent.as_std_path())
        .map_err(|err| PlanError::MissingInput(format!("{parent}: {err}")))?;
    Ok(to_utf8(parent)?.join(name))
}

pub fn ensure_absolute(path: &Utf8Path) -> Result<(), PlanError> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(PlanError::RelativePath(path.to_string()))
    }
}

pub fn create_dir_new(path: &Utf8Path) -> Result<(), PlanError> {
    fs::create_dir(path.as_std_path())
        .map_err(|err| PlanError::Filesystem(format!("create {path}: {err}")))?;
    debug!(path = %path, "created directory");
    Ok(())
}

pub fn write_new_file(path: &Utf8Path, content: &str) -> Result<(), PlanError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path.as_std_path())
        .map_err(|err| PlanError::Filesystem(format!("create {path}: {err}")))?;
    file.write_all(content.as_bytes())
        .map_err(|err| PlanError::Filesystem(format!("write {path}: {err}")))?;
    debug!(path = %path, bytes = content.len(), "wrote file");
    Ok(())
}

pub fn is_already_exists(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::AlreadyExists
}

pub fn find_files_with_ext(root: &Path, ext: &str) -> Result<Vec<PathBuf>, PlanError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path)
            .map_err(|err| PlanError::Filesystem(format!("read {}: {err}", path.display())))?;
        for entry in entries {
            let entry = entry.map_err(|err| PlanError::Filesystem(err.to_string()))?;
            let file_type = entry
                .file_type()
                .map_err(|err| PlanError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "skipping symlinked directory");
            } else if path
                .extension()
                .and_then(|value| value.to_str())
                .map(|value| value == ext)
                .unwrap_or(false)
            {
                out.push(path);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn write_new_file_refuses_overwrite() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("a.sh");
        write_new_file(&path, "first").unwrap();
        let err = write_new_file(&path, "second").unwrap_err();
        assert_matches!(err, PlanError::Filesystem(_));
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "first");
    }

    #[test]
    fn scan_is_recursive_and_filters_extension() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("a.bam"), b"").unwrap();
        fs::write(temp.path().join("a.bam.bai"), b"").unwrap();
        fs::write(temp.path().join("nested/b.bam"), b"").unwrap();
        let mut found = find_files_with_ext(temp.path(), "bam").unwrap();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[1].ends_with("nested/b.bam"));
    }

    #[cfg(unix)]
    #[test]
    fn scan_does_not_follow_symlinked_directories() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("bams")).unwrap();
        fs::write(temp.path().join("bams/a.bam"), b"").unwrap();
        std::os::unix::fs::symlink(temp.path().join("bams"), temp.path().join("bams/loop"))
            .unwrap();
        std::os::unix::fs::symlink(temp.path().join("bams/a.bam"), temp.path().join("linked.bam"))
            .unwrap();
        let mut found = find_files_with_ext(temp.path(), "bam").unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![temp.path().join("bams/a.bam"), temp.path().join("linked.bam")]
        );
    }

    #[test]
    fn relative_path_is_flagged() {
        assert_matches!(
            ensure_absolute(Utf8Path::new("ref/hs37d5.fa")),
            Err(PlanError::RelativePath(_))
        );
    }
}
