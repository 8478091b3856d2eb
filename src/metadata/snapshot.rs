use super::store::{MetadataStore, StoreState};
use crate::core::{Result, SchemaError};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// MessagePack snapshot of the metadata store on disk.
///
/// Writes go to a sibling `.tmp` file that is synced and renamed over the
/// target.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, store: &MetadataStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let state = store.state()?;
        let serialized = rmp_serde::to_vec(&state)
            .map_err(|e| SchemaError::Io(format!("Failed to serialize metadata: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        writer.write_all(&serialized)?;
        writer.flush()?;
        writer.get_mut().sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        log::debug!("metadata snapshot written to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Option<MetadataStore>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;
        let state: StoreState = rmp_serde::from_slice(&data)
            .map_err(|e| SchemaError::Io(format!("Failed to deserialize metadata: {}", e)))?;
        Ok(Some(MetadataStore::from_state(state)))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
