//! Local durable storage: a directory of JSON files addressed by key.
//!
//! Holds the autosaved diagram, persisted auth tokens and versioned backups.
//! Every write goes through a temp file and a rename so a crash never leaves a
//! half-written document behind.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use time::macros::format_description;

use super::document::{self, DiagramDocument, export_filename};
use super::settings::AppSettings;
use crate::graph_utils::graph::Graph;

pub const AUTOSAVE_KEY: &str = "pulsar-diagram-autosave";
pub const AUTH_KEY: &str = "pulsar-auth";

const PROBE_KEY: &str = "__storage_test__";

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.autosave_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Write and remove a probe entry to find out whether storage works at all.
    pub fn is_available(&self) -> bool {
        let probe = || -> std::io::Result<()> {
            self.set_raw(PROBE_KEY, PROBE_KEY)?;
            self.remove(PROBE_KEY)?;
            Ok(())
        };
        probe().is_ok()
    }

    pub fn get_raw(&self, key: &str) -> std::io::Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        Ok(Some(buf))
    }

    pub fn set_raw(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        atomic_write(&self.key_path(key), value.as_bytes())
    }

    /// Remove a key. Removing a missing key succeeds.
    pub fn remove(&self, key: &str) -> std::io::Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get_raw(key)? {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let s = serde_json::to_string(value)?;
        self.set_raw(key, &s)?;
        Ok(())
    }

    pub fn save_document(&self, doc: &DiagramDocument) -> anyhow::Result<PathBuf> {
        self.set_json(AUTOSAVE_KEY, doc)?;
        Ok(self.key_path(AUTOSAVE_KEY))
    }

    /// The autosaved document, if present and structurally valid.
    ///
    /// Unreadable or invalid data is reported as a warning and treated as absent.
    pub fn load_document(&self) -> Option<DiagramDocument> {
        let raw = match self.get_raw(AUTOSAVE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("failed to read autosave: {}", e);
                return None;
            }
        };
        match document::import_document(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("discarding invalid autosave: {}", e);
                None
            }
        }
    }

    /// The autosaved graph, or the bundled sample when nothing usable is stored.
    pub fn load_or_default(&self) -> Graph {
        self.load_document().map(DiagramDocument::into_graph).unwrap_or_else(Graph::sample)
    }

    pub fn clear(&self) -> std::io::Result<()> {
        self.remove(AUTOSAVE_KEY)
    }

    /// A backup path that does not exist yet. Millisecond stamps keep names
    /// sortable; a `_NN` suffix separates backups taken within the same millisecond.
    pub fn versioned_state_path_now(&self) -> PathBuf {
        let now = OffsetDateTime::now_utc();
        let fmt = format_description!("[year][month][day]_[hour][minute][second]_[subsecond digits:3]");
        let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
        let mut path = self.dir.join(format!("state_{}.json", stamp));
        let mut n = 1u32;
        while path.exists() {
            path = self.dir.join(format!("state_{}_{:02}.json", stamp, n));
            n += 1;
        }
        path
    }

    /// Write a timestamped backup next to the autosave.
    pub fn save_versioned(&self, doc: &DiagramDocument) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        let s = serde_json::to_string_pretty(doc)?;
        let path = self.versioned_state_path_now();
        atomic_write(&path, s.as_bytes())?;
        Ok(path)
    }

    pub fn list_versions(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = Vec::new();
        if self.dir.exists() {
            for e in fs::read_dir(&self.dir)? {
                let p = e?.path();
                if let Some(name) = p.file_name().and_then(|s| s.to_str())
                    && name.starts_with("state_") && name.ends_with(".json")
                {
                    entries.push(p);
                }
            }
        }
        // sort descending by filename (timestamp)
        entries.sort();
        entries.reverse();
        Ok(entries)
    }
}

pub fn load_from_path(path: &Path) -> anyhow::Result<DiagramDocument> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    Ok(document::import_document(&buf)?)
}

/// Write a pretty-printed export file named after the diagram into `dir`.
pub fn export_to_dir(doc: &DiagramDocument, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let today = OffsetDateTime::now_utc().date();
    let path = dir.join(export_filename(&doc.name, today));
    let mut s = serde_json::to_string_pretty(doc)?;
    // ensure newline at end
    s.push('\n');
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}
