// File classification
//
// Decides whether a file opened by the user is a patch, an input movie or a
// resource for the loader.

use camino::Utf8Path;
use std::fs::File;
use std::io::{self, Read};

const MOVIE_EXTENSION: &str = "mmo";

/// What an opened file should be treated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// IPS, UPS or BPS patch, detected from the header
    Patch,
    /// Input movie, played back through the engine
    Movie,
    /// Anything else is handed to the loader
    Resource,
}

/// True if the file starts with an IPS (`PATCH`), UPS (`UPS1`) or BPS (`BPS1`) header.
pub fn is_patch_file(path: &Utf8Path) -> io::Result<bool> {
    let mut header = Vec::with_capacity(5);
    File::open(path)?.take(5).read_to_end(&mut header)?;
    Ok(is_patch_header(&header))
}

fn is_patch_header(header: &[u8]) -> bool {
    header.starts_with(b"PATCH") || header.starts_with(b"UPS1") || header.starts_with(b"BPS1")
}

/// Classify a file picked or dropped by the user.
pub fn detect_file_kind(path: &Utf8Path) -> io::Result<FileKind> {
    if is_patch_file(path)? {
        return Ok(FileKind::Patch);
    }

    let is_movie = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MOVIE_EXTENSION));

    Ok(if is_movie {
        FileKind::Movie
    } else {
        FileKind::Resource
    })
}
