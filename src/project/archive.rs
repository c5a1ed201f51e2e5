//! `.sb3` archive access
//!
//! An `.sb3` file is a zip archive whose `project.json` entry holds the
//! block graph. Assets (costumes, sounds) are ignored.

use std::io::{Cursor, Read};

use zip::ZipArchive;
use zip::result::ZipError;

use super::{ProjectError, ProjectResult};

/// Archive entry holding the project document
pub const PROJECT_ENTRY: &str = "project.json";

/// Extract the raw `project.json` bytes from an `.sb3` archive
pub fn read_project_entry(archive: &[u8]) -> ProjectResult<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entry = zip.by_name(PROJECT_ENTRY).map_err(|err| match err {
        ZipError::FileNotFound => ProjectError::MissingEntry(PROJECT_ENTRY),
        other => ProjectError::Archive(other),
    })?;

    let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut data)?;
    Ok(data)
}

/// Whether the bytes look like a bare JSON document rather than a zip archive
pub fn is_bare_json(data: &[u8]) -> bool {
    data.iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| *byte == b'{')
}
