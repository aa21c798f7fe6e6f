//! Writing generated bundles to disk.
//!
//! Every target path is validated to stay inside the output directory.
//! Files are first written next to their target with a `.tmp` suffix and
//! renamed once all of them were written; on failure the temporary files
//! are removed and nothing that existed before is touched.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::generator::Bundle;
use crate::{Error, Result};

/// Write `bundles` into `dir` and return the written paths in order.
///
/// With `write_maps`, bundles that carry a source map also get a
/// `<output>.map` file next to them.
///
/// # Examples
///
/// ```no_run
/// use bale_bundler::{Bundle, write_bundles_to};
/// use std::path::Path;
///
/// # fn example(bundles: &[Bundle]) -> bale_bundler::Result<()> {
/// write_bundles_to(bundles, Path::new("dist"), true, true)?;
/// # Ok(())
/// # }
/// ```
pub fn write_bundles_to(
    bundles: &[Bundle],
    dir: &Path,
    overwrite: bool,
    write_maps: bool,
) -> Result<Vec<PathBuf>> {
    let dir = validate_and_normalize_dir(dir)?;

    fs::create_dir_all(&dir).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut operations: Vec<(PathBuf, Vec<u8>)> = Vec::new();
    for bundle in bundles {
        operations.push((
            checked_target(&dir, &bundle.output_name, overwrite)?,
            bundle.contents.clone().into_bytes(),
        ));
        if write_maps {
            if let Some(json) = bundle.source_map_json() {
                operations.push((
                    checked_target(&dir, &bundle.source_map_name(), overwrite)?,
                    json.into_bytes(),
                ));
            }
        }
    }

    write_files_atomic(&operations)?;
    tracing::info!(files = operations.len(), dir = %dir.display(), "wrote bundle output");
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

fn checked_target(dir: &Path, filename: &str, overwrite: bool) -> Result<PathBuf> {
    let target = validate_output_path(dir, filename)?;
    if !overwrite && target.exists() {
        return Err(Error::OutputExists(format!(
            "File already exists: '{}'. Use overwrite=true to replace.",
            target.display()
        )));
    }
    Ok(target)
}

fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
    })?;
    Ok(cwd.join(&cleaned).clean())
}

/// Join `filename` onto `base_dir`, rejecting anything that ends up outside it.
fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_files_atomic(operations: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut temp_files = Vec::new();

    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                cleanup_temp_files(&temp_files);
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp = temp_path(target_path);
        fs::write(&temp, content).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp.display(),
                e
            ))
        })?;

        temp_files.push((temp, target_path.clone()));
    }

    for (temp, target_path) in &temp_files {
        fs::rename(temp, target_path).map_err(|e| {
            cleanup_temp_files(&temp_files);
            Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp.display(),
                target_path.display(),
                e
            ))
        })?;
    }

    Ok(())
}

fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp, _) in temp_files {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                tracing::warn!(path = %temp.display(), error = %e, "failed to clean up temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "0.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/output/0.js"));
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        for name in ["../etc/passwd", "safe/../../../../etc/passwd"] {
            let result = validate_output_path(base, name);
            assert!(matches!(result.unwrap_err(), Error::InvalidOutputPath(_)));
        }
    }

    #[test]
    fn test_validate_output_path_null_byte() {
        let base = Path::new("/tmp/output");
        assert!(validate_output_path(base, "file\0name.js").is_err());
    }

    #[test]
    fn temp_files_keep_the_full_name() {
        assert_eq!(
            temp_path(Path::new("/out/0.js.map")),
            Path::new("/out/0.js.map.tmp")
        );
    }
}
