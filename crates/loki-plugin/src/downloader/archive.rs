//! Plugin binary extraction from release archives.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader};
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::platform::Platform;
use crate::repository::Convention;
use crate::{PluginError, Result};

/// Which archive member holds the binary.
#[derive(Debug, Clone)]
pub enum EntrySelector<'a> {
    /// Hub archives name the binary after the plugin, version and platform
    Hub {
        name: &'a str,
        version: &'a str,
        platform: &'a Platform,
    },
    /// GitHub archives follow the layout of the URL they came from
    GitHub {
        url: &'a str,
        base_url: &'a str,
        org: &'a str,
        name: &'a str,
        platform: &'a Platform,
    },
}

impl EntrySelector<'_> {
    pub fn entry_name(&self) -> Result<String> {
        match self {
            EntrySelector::Hub {
                name,
                version,
                platform,
            } => Ok(format!(
                "plugin-{}-{}-{}-{}",
                name, version, platform.os, platform.arch
            )),
            EntrySelector::GitHub {
                url,
                base_url,
                org,
                name,
                platform,
            } => Convention::for_url(base_url, org, url)
                .map(|c| c.entry_name(name, platform))
                .ok_or_else(|| PluginError::UnknownOrigin {
                    url: url.to_string(),
                }),
        }
    }
}

pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Copy the selected member of `archive_path` to `dest` and mark it executable.
    ///
    /// Only the selected member is decompressed, on the blocking thread pool.
    /// On failure nothing is left at `dest`.
    pub async fn extract(
        archive_path: &Path,
        selector: &EntrySelector<'_>,
        dest: &Path,
    ) -> Result<u64> {
        let entry_name = selector.entry_name()?;
        let archive_path = archive_path.to_path_buf();
        let dest = dest.to_path_buf();

        tokio::task::spawn_blocking(move || Self::extract_entry(&archive_path, &entry_name, &dest))
            .await
            .map_err(|e| {
                PluginError::io(
                    "plugin extraction task failed",
                    io::Error::new(io::ErrorKind::Other, e),
                )
            })?
    }

    pub fn extract_entry(archive_path: &Path, entry_name: &str, dest: &Path) -> Result<u64> {
        let file = File::open(archive_path).map_err(|e| {
            PluginError::io(
                format!("failed to open plugin archive {}", archive_path.display()),
                e,
            )
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| PluginError::Archive {
            archive: archive_path.to_path_buf(),
            source: e,
        })?;

        let mut entry = match archive.by_name(entry_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(PluginError::EntryNotFound {
                    archive: archive_path.to_path_buf(),
                    entry: entry_name.to_string(),
                })
            }
            Err(e) => {
                return Err(PluginError::Archive {
                    archive: archive_path.to_path_buf(),
                    source: e,
                })
            }
        };

        let mut out = create_executable(dest).map_err(|e| {
            PluginError::io(format!("failed to create file {}", dest.display()), e)
        })?;

        match io::copy(&mut entry, &mut out).and_then(|n| out.sync_all().map(|_| n)) {
            Ok(written) => {
                log::debug!(
                    "Extracted {} ({} bytes) to {}",
                    entry_name,
                    written,
                    dest.display()
                );
                Ok(written)
            }
            Err(e) => {
                drop(out);
                let _ = std::fs::remove_file(dest);
                Err(PluginError::io("failed to copy body to file", e))
            }
        }
    }
}

fn create_executable(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o744);
        let file = options.open(path)?;
        // The mode only applies to new files
        file.set_permissions(std::fs::Permissions::from_mode(0o744))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    {
        options.open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn linux() -> Platform {
        Platform::new("linux", "amd64")
    }

    #[test]
    fn test_hub_entry_name() {
        let platform = linux();
        let selector = EntrySelector::Hub {
            name: "aws",
            version: "v22.18.0",
            platform: &platform,
        };
        assert_eq!(selector.entry_name().unwrap(), "plugin-aws-v22.18.0-linux-amd64");
    }

    #[test]
    fn test_hub_entry_name_has_no_windows_suffix() {
        let platform = Platform::new("windows", "amd64");
        let selector = EntrySelector::Hub {
            name: "aws",
            version: "v22.18.0",
            platform: &platform,
        };
        assert_eq!(selector.entry_name().unwrap(), "plugin-aws-v22.18.0-windows-amd64");
    }

    #[test]
    fn test_github_entry_name_suffix() {
        let url = "https://github.com/loki/loki-source-hackernews/releases/download/v1.1.4/loki-source-hackernews_windows_amd64.zip";
        fn entry_for(url: &str, platform: &Platform) -> String {
            EntrySelector::GitHub {
                url,
                base_url: "https://github.com",
                org: "loki",
                name: "hackernews",
                platform,
            }
            .entry_name()
            .unwrap()
        }

        assert_eq!(
            entry_for(url, &Platform::new("windows", "amd64")),
            "loki-source-hackernews.exe"
        );
        assert_eq!(entry_for(url, &linux()), "loki-source-hackernews");
    }

    #[test]
    fn test_unknown_origin() {
        let platform = linux();
        let selector = EntrySelector::GitHub {
            url: "https://mirror.example.com/hackernews.zip",
            base_url: "https://github.com",
            org: "loki",
            name: "hackernews",
            platform: &platform,
        };
        assert!(matches!(
            selector.entry_name(),
            Err(PluginError::UnknownOrigin { .. })
        ));
    }

    #[tokio::test]
    async fn test_extract_with_hub_selector() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("plugin.zip");
        write_zip(
            &archive,
            &[
                ("plugin-aws-v22.18.0-linux-amd64", "linux binary"),
                ("plugin-aws-v22.18.0-windows-amd64", "windows binary"),
            ],
        );

        let platform = linux();
        let selector = EntrySelector::Hub {
            name: "aws",
            version: "v22.18.0",
            platform: &platform,
        };
        let dest = temp_dir.path().join("plugin");
        ArchiveExtractor::extract(&archive, &selector, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"linux binary");
    }

    #[test]
    fn test_extracts_only_the_selected_entry() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("plugin.zip");
        write_zip(
            &archive,
            &[
                ("plugin-aws-v1-linux-amd64", "linux binary"),
                ("plugin-aws-v1-darwin-arm64", "darwin binary"),
            ],
        );

        let dest = temp_dir.path().join("plugin");
        let written =
            ArchiveExtractor::extract_entry(&archive, "plugin-aws-v1-linux-amd64", &dest).unwrap();

        assert_eq!(written, 12);
        assert_eq!(std::fs::read(&dest).unwrap(), b"linux binary");
    }

    #[cfg(unix)]
    #[test]
    fn test_extracted_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("plugin.zip");
        write_zip(&archive, &[("loki-source-aws", "#!/bin/sh\n")]);

        let dest = temp_dir.path().join("plugin");
        std::fs::write(&dest, b"stale content that is much longer").unwrap();
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o600)).unwrap();

        ArchiveExtractor::extract_entry(&archive, "loki-source-aws", &dest).unwrap();

        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o744);
        assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\n");
    }

    #[test]
    fn test_missing_entry() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("plugin.zip");
        write_zip(&archive, &[("plugin-aws-v1-darwin-arm64", "darwin binary")]);

        let dest = temp_dir.path().join("plugin");
        let err = ArchiveExtractor::extract_entry(&archive, "plugin-aws-v1-linux-amd64", &dest)
            .unwrap_err();

        assert!(matches!(
            err,
            PluginError::EntryNotFound { ref entry, .. } if entry == "plugin-aws-v1-linux-amd64"
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("plugin.zip");
        std::fs::write(&archive, b"not a zip file").unwrap();

        let err = ArchiveExtractor::extract_entry(&archive, "anything", &temp_dir.path().join("plugin"))
            .unwrap_err();
        assert!(matches!(err, PluginError::Archive { .. }));
    }
}
