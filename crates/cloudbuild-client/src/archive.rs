//! Packing a project directory into a gzipped tarball for upload.

use crate::{ClientError, ClientResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tracing::debug;

/// Directories never uploaded.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "build", ".git", ".cloudbuild"];

/// A packed project.
#[derive(Debug)]
pub struct PackedProject {
    pub data: Vec<u8>,
    pub files: usize,
}

/// Pack `dir` into a `.tar.gz`, skipping [`EXCLUDED_DIRS`].
///
/// Blocking; run it on a blocking thread.
pub fn pack_project(dir: &Path) -> ClientResult<PackedProject> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut files = 0;
    append_dir(&mut builder, dir, Path::new(""), &mut files)?;

    let encoder = builder
        .into_inner()
        .map_err(|e| ClientError::Archive(e.to_string()))?;
    let data = encoder
        .finish()
        .map_err(|e| ClientError::Archive(e.to_string()))?;

    debug!(files, bytes = data.len(), "Packed project");
    Ok(PackedProject { data, files })
}

fn append_dir<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    relative: &Path,
    files: &mut usize,
) -> ClientResult<()> {
    let mut entries = std::fs::read_dir(root.join(relative))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let rel = relative.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if EXCLUDED_DIRS.iter().any(|ex| name == *ex) {
                continue;
            }
            append_dir(builder, root, &rel, files)?;
        } else {
            builder
                .append_path_with_name(entry.path(), &rel)
                .map_err(|e| ClientError::Archive(format!("{}: {}", rel.display(), e)))?;
            *files += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn entry_names(data: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(data));
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_pack_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("www/js")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/gulp")).unwrap();
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::create_dir_all(root.join(".cloudbuild")).unwrap();
        std::fs::write(root.join("config.xml"), "<widget/>").unwrap();
        std::fs::write(root.join("www/index.html"), "<html/>").unwrap();
        std::fs::write(root.join("www/js/app.js"), "app()").unwrap();
        std::fs::write(root.join("node_modules/gulp/index.js"), "").unwrap();
        std::fs::write(root.join("build/out.apk"), "apk").unwrap();
        std::fs::write(root.join(".cloudbuild/project.kdl"), "project \"x\"").unwrap();

        let packed = pack_project(root).unwrap();

        assert_eq!(packed.files, 3);
        assert_eq!(
            entry_names(&packed.data),
            vec!["config.xml", "www/index.html", "www/js/app.js"]
        );
    }

    #[test]
    fn test_pack_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pack_project(&dir.path().join("absent")).is_err());
    }
}
