//! Zip archives for multi-file worker results.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Per-page suffix the worker appends to output stems: `_3` or `_page_3`.
static PAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:_page)?_\d+$").expect("valid regex"));

/// An archive built in memory.
#[derive(Debug)]
pub struct Archive {
    pub bytes: Vec<u8>,
    /// Files that were actually packed, in input order.
    pub included: Vec<PathBuf>,
}

/// Pack every listed file that still exists into a zip, in order.
///
/// Missing files are skipped: the worker may list an output that was
/// already consumed or removed. Entries are stored under their file name,
/// made unique when two outputs share one.
pub fn build_archive(paths: &[PathBuf]) -> Result<Archive, std::io::Error> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut included = Vec::with_capacity(paths.len());
    let mut taken = HashSet::with_capacity(paths.len());

    for path in paths {
        let Ok(data) = std::fs::read(path) else {
            debug!("Skipping missing output {}", path.display());
            continue;
        };
        let name = entry_name(path, included.len(), &mut taken);
        writer.start_file(name, options).map_err(std::io::Error::other)?;
        writer.write_all(&data)?;
        included.push(path.clone());
    }

    let cursor = writer.finish().map_err(std::io::Error::other)?;
    Ok(Archive {
        bytes: cursor.into_inner(),
        included,
    })
}

/// [`build_archive`] on the blocking pool. Reading every page and deflating
/// it would otherwise stall the runtime threads other sessions run on.
pub async fn build_archive_blocking(paths: &[PathBuf]) -> Result<Archive, std::io::Error> {
    let paths = paths.to_vec();
    tokio::task::spawn_blocking(move || build_archive(&paths))
        .await
        .map_err(|e| std::io::Error::other(format!("archive task failed: {e}")))?
}

/// Entry name for `path`: its file name, suffixed `_2`, `_3`, ... when an
/// earlier entry (from another directory) already took it.
fn entry_name(path: &Path, index: usize, taken: &mut HashSet<String>) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("file_{}", index + 1));
    if taken.insert(base.clone()) {
        return base;
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (base.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Archive file name for a set of per-page outputs, e.g. `report_1.jpg` → `report.zip`.
pub fn archive_name_for(first_output: &Path) -> String {
    let stem = first_output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = PAGE_SUFFIX.replace(&stem, "");
    let base: &str = if base.is_empty() { "converted" } else { &base };
    format!("{base}.zip")
}

/// Archive path next to the first per-page output.
pub fn archive_path_for(first_output: &Path) -> PathBuf {
    let name = archive_name_for(first_output);
    match first_output.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn derives_archive_name_from_page_suffix() {
        assert_eq!(archive_name_for(Path::new("/t/report_1.jpg")), "report.zip");
        assert_eq!(archive_name_for(Path::new("/t/report_page_12.jpg")), "report.zip");
        assert_eq!(archive_name_for(Path::new("/t/q3_2024_1.jpg")), "q3_2024.zip");
        assert_eq!(archive_name_for(Path::new("/t/scan.jpg")), "scan.zip");
        assert_eq!(archive_name_for(Path::new("/t/_1.jpg")), "converted.zip");
        assert_eq!(
            archive_path_for(Path::new("/t/out/report_1.jpg")),
            PathBuf::from("/t/out/report.zip")
        );
    }

    #[test]
    fn archive_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("doc_1.jpg");
        let b = dir.path().join("doc_2.jpg");
        let c = dir.path().join("doc_3.jpg");
        std::fs::write(&a, b"one").unwrap();
        std::fs::write(&c, b"three").unwrap();

        let archive = build_archive(&[a.clone(), b, c.clone()]).unwrap();
        assert_eq!(archive.included, vec![a, c]);

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        let mut content = String::new();
        zip.by_name("doc_3.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "three");
    }

    #[test]
    fn archive_of_nothing_is_empty() {
        let archive = build_archive(&[PathBuf::from("/definitely/missing.jpg")]).unwrap();
        assert!(archive.included.is_empty());
    }

    #[test]
    fn same_file_name_in_two_directories_gets_unique_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        let first = dir.path().join("a/page.jpg");
        let second = dir.path().join("b/page.jpg");
        std::fs::write(&first, b"A").unwrap();
        std::fs::write(&second, b"B").unwrap();

        let archive = build_archive(&[first, second]).unwrap();
        assert_eq!(archive.included.len(), 2);

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut content = String::new();
        zip.by_name("page_2.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "B");
        assert!(zip.by_name("page.jpg").is_ok());
    }

    #[test]
    fn collision_suffix_skips_names_already_taken() {
        let mut taken = HashSet::new();
        assert_eq!(entry_name(Path::new("/x/p_2.jpg"), 0, &mut taken), "p_2.jpg");
        assert_eq!(entry_name(Path::new("/x/p.jpg"), 1, &mut taken), "p.jpg");
        assert_eq!(entry_name(Path::new("/y/p.jpg"), 2, &mut taken), "p_3.jpg");
        assert_eq!(entry_name(Path::new("/z/README"), 3, &mut taken), "README");
        assert_eq!(entry_name(Path::new("/w/README"), 4, &mut taken), "README_2");
    }

    #[tokio::test]
    async fn blocking_build_matches_direct_build() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("doc_1.jpg");
        std::fs::write(&page, b"one").unwrap();

        let archive = build_archive_blocking(&[page.clone()]).await.unwrap();
        assert_eq!(archive.included, vec![page]);
        assert!(!archive.bytes.is_empty());
    }
}
