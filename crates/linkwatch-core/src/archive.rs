//! Retention archiver.
//!
//! Retires records older than the retention cutoff into one compressed
//! bundle per sweep date (`YYYY-MM-DD.gz`). A bundle is a sequence of gzip
//! members, one per record, each carrying the record's store filename in its
//! gzip header and the original document bytes unmodified as its payload —
//! concatenated gzip members are themselves valid gzip, which is what makes
//! same-day bundles appendable.
//!
//! Crash consistency: the sweep rebuilds the bundle in a temporary file
//! (existing bytes plus new members), fsyncs, atomically renames it over the
//! bundle path, and only then removes the originals from the store. A
//! failure anywhere before the rename leaves both store and bundle exactly
//! as they were, and the next sweep retries the same records. A failure
//! after the rename leaves a record durable in its bundle but still present
//! in the store; the next sweep recognizes it by its member name and
//! finishes the removal instead of appending a second copy.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use flate2::Compression;
use flate2::GzBuilder;
use flate2::bufread::GzDecoder;

use crate::error::{ArchiveError, StoreError};
use crate::record::DiagnosticRecord;
use crate::store::RecordStore;
use crate::timestamp;

/// What one sweep did.
#[derive(Debug)]
pub struct SweepReport {
    /// Records moved out of the store.
    pub archived: usize,
    /// Bundle written to, when any record was eligible.
    pub bundle: Option<PathBuf>,
}

/// The archive bundle directory.
pub struct Archiver {
    dir: PathBuf,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Retire every stored record with `timestamp < now - retention` into
    /// the bundle dated by this sweep's run date.
    ///
    /// Idempotent: with no newly-eligible records, nothing is written and
    /// nothing is removed — no bundle is created or touched.
    pub fn sweep(
        &self,
        store: &RecordStore,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ArchiveError> {
        let cutoff = now - retention;
        let eligible = store.entries_before(cutoff)?;
        if eligible.is_empty() {
            return Ok(SweepReport {
                archived: 0,
                bundle: None,
            });
        }

        // An eligible record whose store filename already names a bundle
        // member was archived by an earlier sweep whose removal step failed.
        // It must not be appended again; only its removal is outstanding.
        let already_bundled = self.member_names()?;
        let mut fresh = Vec::new();
        let mut retired = Vec::new();
        for entry in eligible {
            let name = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if already_bundled.contains(&name) {
                retired.push(entry);
            } else {
                fresh.push((name, entry));
            }
        }

        let mut bundle = None;
        if !fresh.is_empty() {
            fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::DirUnavailable {
                dir: self.dir.clone(),
                source: e,
            })?;
            let bundle_path = self.dir.join(timestamp::bundle_filename(now));

            // Rebuild into a temp file so the live bundle is replaced
            // atomically.
            let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| {
                ArchiveError::BundleWrite {
                    path: bundle_path.clone(),
                    source: e,
                }
            })?;
            if bundle_path.exists() {
                let existing = fs::read(&bundle_path).map_err(|e| ArchiveError::BundleRead {
                    path: bundle_path.clone(),
                    source: e,
                })?;
                tmp.write_all(&existing)
                    .map_err(|e| ArchiveError::BundleWrite {
                        path: bundle_path.clone(),
                        source: e,
                    })?;
            }

            for (name, entry) in &fresh {
                let bytes = fs::read(&entry.path).map_err(|e| {
                    ArchiveError::Store(StoreError::ReadFailed {
                        path: entry.path.clone(),
                        source: e,
                    })
                })?;
                let member = gzip_member(name, &bytes).map_err(|e| ArchiveError::BundleWrite {
                    path: bundle_path.clone(),
                    source: e,
                })?;
                tmp.write_all(&member)
                    .map_err(|e| ArchiveError::BundleWrite {
                        path: bundle_path.clone(),
                        source: e,
                    })?;
            }

            tmp.as_file()
                .sync_all()
                .map_err(|e| ArchiveError::BundleWrite {
                    path: bundle_path.clone(),
                    source: e,
                })?;
            tmp.persist(&bundle_path)
                .map_err(|e| ArchiveError::BundleWrite {
                    path: bundle_path.clone(),
                    source: e.error,
                })?;

            log::info!(
                "archived {} record(s) into {}",
                fresh.len(),
                bundle_path.display()
            );
            bundle = Some(bundle_path);
        }

        // Every eligible record is now durable in a bundle; the originals
        // may go. A removal failure here leaves the record in both places
        // until the next sweep finishes the job via the member-name check
        // above.
        let archived = fresh.len() + retired.len();
        for entry in fresh.iter().map(|(_, e)| e).chain(retired.iter()) {
            if let Err(e) = fs::remove_file(&entry.path) {
                log::warn!("archived but could not remove {}: {e}", entry.path.display());
            }
        }

        Ok(SweepReport { archived, bundle })
    }

    /// Member names across every existing bundle.
    fn member_names(&self) -> Result<HashSet<String>, ArchiveError> {
        let mut names = HashSet::new();
        for bundle in self.bundles()? {
            for (name, _) in read_members(&bundle)? {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// All bundle paths, sorted by date.
    pub fn bundles(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ArchiveError::DirUnavailable {
                    dir: self.dir.clone(),
                    source: e,
                });
            }
        };
        let mut bundles = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| ArchiveError::DirUnavailable {
                dir: self.dir.clone(),
                source: e,
            })?;
            let name = dirent.file_name();
            if timestamp::parse_bundle_filename(&name.to_string_lossy()).is_some() {
                bundles.push(dirent.path());
            }
        }
        bundles.sort();
        Ok(bundles)
    }
}

/// One gzip member: record filename in the header, document bytes as payload.
fn gzip_member(name: &str, bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut member = Vec::new();
    let mut enc = GzBuilder::new()
        .filename(name)
        .write(&mut member, Compression::default());
    enc.write_all(bytes)?;
    enc.finish()?;
    Ok(member)
}

/// Decode every (filename, payload) pair in a bundle, in append order.
fn read_members(path: &Path) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let data = fs::read(path).map_err(|e| ArchiveError::BundleRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut out = Vec::new();
    let mut rest: &[u8] = &data;
    while !rest.is_empty() {
        let mut dec = GzDecoder::new(rest);
        let mut payload = Vec::new();
        dec.read_to_end(&mut payload)
            .map_err(|e| ArchiveError::BundleRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = dec
            .header()
            .and_then(|h| h.filename())
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        rest = dec.into_inner();
        out.push((name, payload));
    }
    Ok(out)
}

/// Decode every (filename, record) pair in a bundle, in append order.
pub fn read_bundle(path: &Path) -> Result<Vec<(String, DiagnosticRecord)>, ArchiveError> {
    let mut out = Vec::new();
    for (name, payload) in read_members(path)? {
        let record =
            serde_json::from_slice(&payload).map_err(|e| ArchiveError::BundleRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
        out.push((name, record));
    }
    Ok(out)
}
