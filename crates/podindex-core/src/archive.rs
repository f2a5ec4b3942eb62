//! Single-member extraction from a gzip-compressed tarball.

use crate::config::ExtractOptions;
use crate::{PodindexError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Extract `options.member` from `options.archive` into `options.out_dir`.
///
/// Entry names are compared with `.` components dropped, so `./feeds.db`
/// and `feeds.db` name the same member. Returns the extracted file's path.
pub fn extract_member(options: &ExtractOptions) -> Result<PathBuf> {
    let archive_path = options.archive.as_path();
    info!("Extracting {} from archive {}", options.member, archive_path.display());

    let file =
        File::open(archive_path).map_err(|e| PodindexError::io_with_path(e, archive_path))?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    let wanted = normalize(Path::new(&options.member));
    let entries = archive
        .entries()
        .map_err(|e| PodindexError::io_with_path(e, archive_path))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PodindexError::io_with_path(e, archive_path))?;
        let entry_path = entry
            .path()
            .map_err(|e| PodindexError::io_with_path(e, archive_path))?
            .into_owned();
        if normalize(&entry_path) != wanted {
            continue;
        }

        info!(
            "Extracting {} size={}",
            entry_path.display(),
            entry.header().size().unwrap_or(0)
        );

        std::fs::create_dir_all(&options.out_dir)
            .map_err(|e| PodindexError::io_with_path(e, &options.out_dir))?;
        let unpacked = entry
            .unpack_in(&options.out_dir)
            .map_err(|e| PodindexError::io_with_path(e, &options.out_dir))?;
        if !unpacked {
            return Err(PodindexError::Validation {
                field: "member".to_string(),
                message: format!(
                    "{} would extract outside {}",
                    entry_path.display(),
                    options.out_dir.display()
                ),
            });
        }
        return Ok(options.out_dir.join(&wanted));
    }

    Err(PodindexError::MemberNotFound {
        archive: archive_path.to_path_buf(),
        member: options.member.clone(),
    })
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn create_archive(dir: &Path, members: &[(&str, &[u8])]) -> PathBuf {
        let archive_path = dir.join("podcastindex_feeds.db.tgz");
        let file = File::create(&archive_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
        archive_path
    }

    #[test]
    fn test_extract_dot_prefixed_member() {
        let temp_dir = TempDir::new().unwrap();
        let archive = create_archive(
            temp_dir.path(),
            &[("./README", &b"readme"[..]), ("./podcastindex_feeds.db", &b"sqlite bytes"[..])],
        );
        let out_dir = temp_dir.path().join("out");

        let options = ExtractOptions::for_archive(&archive)
            .unwrap()
            .with_out_dir(&out_dir);
        let extracted = extract_member(&options).unwrap();

        assert_eq!(extracted, out_dir.join("podcastindex_feeds.db"));
        assert_eq!(std::fs::read(&extracted).unwrap(), b"sqlite bytes");
        assert!(!out_dir.join("README").exists());
    }

    #[test]
    fn test_extract_named_member() {
        let temp_dir = TempDir::new().unwrap();
        let archive = create_archive(temp_dir.path(), &[("data/feeds.db", &b"abc"[..])]);

        let options = ExtractOptions::for_archive(&archive)
            .unwrap()
            .with_member("./data/feeds.db")
            .with_out_dir(temp_dir.path());
        let extracted = extract_member(&options).unwrap();

        assert_eq!(extracted, temp_dir.path().join("data/feeds.db"));
        assert_eq!(std::fs::read(extracted).unwrap(), b"abc");
    }

    #[test]
    fn test_member_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let archive = create_archive(temp_dir.path(), &[("./other.db", &b"abc"[..])]);

        let options = ExtractOptions::for_archive(&archive)
            .unwrap()
            .with_out_dir(temp_dir.path());
        let err = extract_member(&options).unwrap_err();

        assert!(matches!(
            err,
            PodindexError::MemberNotFound { ref member, .. } if member == "podcastindex_feeds.db"
        ));
    }

    #[test]
    fn test_missing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let options = ExtractOptions::for_archive(temp_dir.path().join("absent.tgz")).unwrap();
        assert!(matches!(
            extract_member(&options),
            Err(PodindexError::Io { .. })
        ));
    }
}
