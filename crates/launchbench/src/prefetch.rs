//! OS prefetch cache purging.
//!
//! Windows records the files an executable touches at startup in
//! `<EXE>-<hash>.pf` files and preloads them on the next launch. Deleting
//! those entries keeps prefetching out of the measurement.

use std::io;
use std::path::Path;

/// Whether `file_name` is a prefetch entry for `exe_name`.
fn is_prefetch_entry(file_name: &str, exe_name: &str) -> bool {
    let file_name = file_name.to_ascii_lowercase();
    file_name.starts_with(&exe_name.to_ascii_lowercase()) && file_name.ends_with(".pf")
}

/// Delete the prefetch entries for `exe_name` in `prefetch_dir`.
///
/// Returns the number of files deleted. A missing directory holds no
/// entries.
pub fn purge_prefetch(prefetch_dir: &Path, exe_name: &str) -> io::Result<usize> {
    let entries = match std::fs::read_dir(prefetch_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let doomed: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| is_prefetch_entry(&name.to_string_lossy(), exe_name))
        })
        .collect();

    tracing::info!("Deleting {} prefetch files", doomed.len());
    for path in &doomed {
        std::fs::remove_file(path)?;
    }
    Ok(doomed.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_entry_match_is_case_insensitive() {
        assert!(is_prefetch_entry("CHROME.EXE-4A7B1C2D.pf", "chrome.exe"));
        assert!(is_prefetch_entry("chrome.exe-4A7B1C2D.PF", "Chrome.exe"));
        assert!(!is_prefetch_entry("FIREFOX.EXE-11111111.pf", "chrome.exe"));
        assert!(!is_prefetch_entry("CHROME.EXE-4A7B1C2D.db", "chrome.exe"));
    }

    #[test]
    fn test_purge_deletes_only_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "CHROME.EXE-0000AAAA.pf",
            "CHROME.EXE-0000BBBB.pf",
            "FIREFOX.EXE-0000CCCC.pf",
            "Layout.ini",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        assert_eq!(purge_prefetch(dir.path(), "chrome.exe").unwrap(), 2);

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["FIREFOX.EXE-0000CCCC.pf", "Layout.ini"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(purge_prefetch(&dir.path().join("Prefetch"), "chrome.exe").unwrap(), 0);
    }
}
