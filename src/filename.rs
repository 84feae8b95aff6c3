//! Output filename derivation and collision-free paths.

use crate::openalex::PaperRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Upper bound on the stem length in UTF-8 bytes.
///
/// Filesystems cap names at 255 bytes; the rest is left for `_N` and `.pdf`.
pub const MAX_STEM_BYTES: usize = 200;

const FALLBACK_STEM: &str = "Unknown_Paper";

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make `name` safe as a filename stem.
///
/// Spaces become underscores, characters invalid on common filesystems and
/// control characters are dropped, and the result is truncated and stripped of
/// trailing dots/spaces. Returns `None` if nothing usable is left.
pub fn sanitize_stem(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && !c.is_control())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .scan(0usize, |bytes, c| {
            *bytes += c.len_utf8();
            (*bytes <= MAX_STEM_BYTES).then_some(c)
        })
        .collect();

    let stem = cleaned.trim_end_matches(['.', ' ', '_']).trim_start_matches('.');
    if stem.is_empty() || stem.chars().all(|c| c == '_') {
        return None;
    }
    if RESERVED_NAMES.iter().any(|r| stem.eq_ignore_ascii_case(r)) {
        return None;
    }
    Some(stem.to_string())
}

/// Derive the output filename for a record: title, else DOI, else a generic name.
pub fn derive_filename(record: &PaperRecord) -> String {
    let stem = sanitize_stem(&record.title)
        .or_else(|| {
            record
                .doi
                .as_deref()
                .and_then(|doi| sanitize_stem(&doi.replace('/', "_")))
        })
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    format!("{}.pdf", stem)
}

/// First path under `dir` named `file_name` or `stem_N.ext` that does not exist yet.
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(file_name);
    (1u32..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Write `bytes` to a fresh file under `dir`, never replacing an existing one.
///
/// The file is created with create-new semantics; if another writer takes the
/// chosen name first, the next suffix is tried.
pub fn write_unique(dir: &Path, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    loop {
        let path = unique_path(dir, file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                write_all(file, bytes)?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}

fn write_all(mut file: File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
        _ => (file_name, ""),
    }
}
