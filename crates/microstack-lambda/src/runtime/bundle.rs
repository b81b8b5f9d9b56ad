//! Code bundle handling: ZIP extraction, handler resolution, and building
//! bundles from inline source.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{LambdaError, LambdaResult};

/// Handler source extensions probed in order.
const HANDLER_EXTENSIONS: [&str; 3] = ["mjs", "js", "cjs"];

/// Split a dotted `module.export` handler reference.
///
/// The split happens at the *first* dot; both halves must be non-empty.
///
/// # Errors
///
/// Returns an *invalid-parameter* error for a malformed reference.
pub fn split_handler(handler: &str) -> LambdaResult<(&str, &str)> {
    let (module, export) = handler.split_once('.').ok_or_else(|| {
        LambdaError::invalid_parameter(format!(
            "Handler must be of the form module.export, got '{handler}'"
        ))
    })?;
    if module.is_empty() || export.is_empty() {
        return Err(LambdaError::invalid_parameter(format!(
            "Handler must be of the form module.export, got '{handler}'"
        )));
    }
    Ok((module, export))
}

/// Extract a ZIP bundle into `dest`.
///
/// Entry names are sanitised through the archive's enclosed-name check so a
/// crafted bundle cannot write outside the scratch directory.
///
/// # Errors
///
/// Returns an *invalid-parameter* error for a malformed archive and a
/// runtime error for I/O failures.
pub fn extract_bundle(bundle: &[u8], dest: &Path) -> LambdaResult<()> {
    let mut archive = ZipArchive::new(Cursor::new(bundle)).map_err(|e| {
        LambdaError::invalid_parameter(format!("Could not unzip uploaded file: {e}"))
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            LambdaError::invalid_parameter(format!("Could not unzip uploaded file: {e}"))
        })?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(LambdaError::invalid_parameter(format!(
                "Bundle entry has an unsafe path: {}",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| LambdaError::runtime(format!("Failed to extract bundle: {e}")))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LambdaError::runtime(format!("Failed to extract bundle: {e}")))?;
        }
        let mut file = std::fs::File::create(&target)
            .map_err(|e| LambdaError::runtime(format!("Failed to extract bundle: {e}")))?;
        std::io::copy(&mut entry, &mut file)
            .map_err(|e| LambdaError::runtime(format!("Failed to extract bundle: {e}")))?;
    }

    Ok(())
}

/// Locate the handler source file for `module` under `dir`.
///
/// Probes `{module}.mjs`, `{module}.js`, `{module}.cjs` in order; the first
/// existing file wins.
#[must_use]
pub fn resolve_handler_file(dir: &Path, module: &str) -> Option<PathBuf> {
    HANDLER_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{module}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Build a ZIP bundle holding a single `{module}.mjs` with the given source.
///
/// Used by the stack orchestrator's inline `ZipFile` template code and by
/// tests.
///
/// # Errors
///
/// Returns a runtime error if archive construction fails.
pub fn bundle_from_source(module: &str, source: &str) -> LambdaResult<Bytes> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(format!("{module}.mjs"), SimpleFileOptions::default())
        .map_err(|e| LambdaError::runtime(format!("Failed to build bundle: {e}")))?;
    writer
        .write_all(source.as_bytes())
        .map_err(|e| LambdaError::runtime(format!("Failed to build bundle: {e}")))?;
    let cursor = writer
        .finish()
        .map_err(|e| LambdaError::runtime(format!("Failed to build bundle: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_split_handler_at_first_dot() {
        assert_eq!(split_handler("index.handler").unwrap(), ("index", "handler"));
        // Only the first dot splits; the export keeps the rest.
        assert_eq!(split_handler("index.run.main").unwrap(), ("index", "run.main"));
    }

    #[test]
    fn test_should_reject_malformed_handlers() {
        assert!(split_handler("nodot").is_err());
        assert!(split_handler(".handler").is_err());
        assert!(split_handler("index.").is_err());
        assert!(split_handler(".").is_err());
        assert!(split_handler("").is_err());
    }

    #[test]
    fn test_should_round_trip_bundle_from_source() {
        let bundle = bundle_from_source("index", "export const x = 1;").unwrap();
        let dest = tempfile::tempdir().unwrap();
        extract_bundle(&bundle, dest.path()).unwrap();

        let extracted = std::fs::read_to_string(dest.path().join("index.mjs")).unwrap();
        assert_eq!(extracted, "export const x = 1;");
    }

    #[test]
    fn test_should_reject_non_zip_bytes() {
        let dest = tempfile::tempdir().unwrap();
        let err = extract_bundle(b"not a zip archive", dest.path()).unwrap_err();
        assert!(matches!(err, LambdaError::InvalidParameter { .. }));
    }

    #[test]
    fn test_should_resolve_handler_file_in_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.js"), "x").unwrap();
        std::fs::write(dir.path().join("index.cjs"), "x").unwrap();

        // .js wins over .cjs when .mjs is absent.
        let resolved = resolve_handler_file(dir.path(), "index").unwrap();
        assert_eq!(resolved, dir.path().join("index.js"));

        std::fs::write(dir.path().join("index.mjs"), "x").unwrap();
        let resolved = resolve_handler_file(dir.path(), "index").unwrap();
        assert_eq!(resolved, dir.path().join("index.mjs"));
    }

    #[test]
    fn test_should_return_none_for_missing_handler_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_handler_file(dir.path(), "index").is_none());
    }

    #[test]
    fn test_should_extract_nested_entries() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("lib/util.mjs", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"export const u = 1;").unwrap();
        writer
            .start_file("index.mjs", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"export const i = 2;").unwrap();
        let bundle = writer.finish().unwrap().into_inner();

        let dest = tempfile::tempdir().unwrap();
        extract_bundle(&bundle, dest.path()).unwrap();
        assert!(dest.path().join("lib/util.mjs").is_file());
        assert!(dest.path().join("index.mjs").is_file());
    }
}
