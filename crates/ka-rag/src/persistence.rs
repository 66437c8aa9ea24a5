//! On-disk artifacts for the vector index and chunk store
//!
//! Two JSON files live side by side in the index directory:
//!
//! * `vector_index.json` holds the dimension, the row count and the vectors as
//!   base64 of little-endian `f32`s, row-major.
//! * `chunk_store.json` holds the chunk records in row order.
//!
//! Both carry the same `consistency_token`, fresh for every save. Each file is
//! written to a temporary sibling and renamed into place, so a crash leaves at
//! worst two complete files from different saves; the token mismatch then makes
//! the load fail and the caller starts empty.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use ka_core::{Chunk, Error, Result};

use crate::index::{ChunkStore, FlatL2Index};

pub const INDEX_FILE: &str = "vector_index.json";
pub const METADATA_FILE: &str = "chunk_store.json";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    format_version: u32,
    consistency_token: String,
    dimension: usize,
    rows: usize,
    vectors: String,
}

#[derive(Serialize, Deserialize)]
struct MetadataArtifact {
    format_version: u32,
    consistency_token: String,
    rows: usize,
    chunks: Vec<Chunk>,
}

impl FlatL2Index {
    /// Write the index to `path`, stamped with `token`.
    pub fn save(&self, path: &Path, token: &str) -> Result<()> {
        let artifact = IndexArtifact {
            format_version: FORMAT_VERSION,
            consistency_token: token.to_string(),
            dimension: self.dimension(),
            rows: self.size(),
            vectors: encode_vectors(self.raw()),
        };
        write_atomically(path, &serde_json::to_vec(&artifact)?)
    }

    /// Read an index written by [`FlatL2Index::save`], returning it with its token.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let artifact: IndexArtifact = serde_json::from_slice(&fs::read(path)?)?;
        check_version(artifact.format_version, path)?;

        let index = FlatL2Index::from_raw(artifact.dimension, decode_vectors(&artifact.vectors)?)?;
        if index.size() != artifact.rows {
            return Err(Error::Serialization(format!(
                "{} declares {} rows but holds {}",
                path.display(),
                artifact.rows,
                index.size()
            )));
        }
        Ok((index, artifact.consistency_token))
    }
}

impl ChunkStore {
    /// Write the chunk records to `path`, stamped with `token`.
    pub fn save_metadata(&self, path: &Path, token: &str) -> Result<()> {
        let artifact = MetadataArtifact {
            format_version: FORMAT_VERSION,
            consistency_token: token.to_string(),
            rows: self.size(),
            chunks: self.chunks().to_vec(),
        };
        write_atomically(path, &serde_json::to_vec(&artifact)?)
    }

    /// Read chunk records written by [`ChunkStore::save_metadata`], with their token.
    pub fn load_metadata(path: &Path) -> Result<(Self, String)> {
        let artifact: MetadataArtifact = serde_json::from_slice(&fs::read(path)?)?;
        check_version(artifact.format_version, path)?;

        if artifact.chunks.len() != artifact.rows {
            return Err(Error::Serialization(format!(
                "{} declares {} rows but holds {}",
                path.display(),
                artifact.rows,
                artifact.chunks.len()
            )));
        }
        Ok((ChunkStore::from_chunks(artifact.chunks), artifact.consistency_token))
    }
}

/// Persist both structures under one fresh consistency token.
pub fn save_pair(dir: &Path, index: &FlatL2Index, store: &ChunkStore) -> Result<String> {
    fs::create_dir_all(dir)?;
    let token = Uuid::new_v4().to_string();

    index.save(&dir.join(INDEX_FILE), &token)?;
    store.save_metadata(&dir.join(METADATA_FILE), &token)?;
    Ok(token)
}

/// Load both structures, failing unless they come from the same save and
/// match the expected dimension.
pub fn load_pair(dir: &Path, dimension: usize) -> Result<(FlatL2Index, ChunkStore)> {
    let index_path = dir.join(INDEX_FILE);
    let metadata_path = dir.join(METADATA_FILE);

    if !index_path.exists() && !metadata_path.exists() {
        return Err(Error::NotFound(format!(
            "no persisted index in {}",
            dir.display()
        )));
    }

    let (index, index_token) = FlatL2Index::load(&index_path)?;
    let (store, metadata_token) = ChunkStore::load_metadata(&metadata_path)?;

    if index_token != metadata_token {
        return Err(Error::Serialization(format!(
            "index token {} does not match chunk store token {}",
            index_token, metadata_token
        )));
    }
    if index.dimension() != dimension {
        return Err(Error::Configuration(format!(
            "persisted index has dimension {}, configured dimension is {}",
            index.dimension(),
            dimension
        )));
    }
    if index.size() != store.size() {
        return Err(Error::Serialization(format!(
            "index has {} rows but chunk store has {}",
            index.size(),
            store.size()
        )));
    }

    Ok((index, store))
}

/// Load both structures or, on any failure, start from an empty pair.
///
/// Discarding a corrupt corpus is logged at warn level with the reason.
pub fn load_or_empty(dir: &Path, dimension: usize) -> (FlatL2Index, ChunkStore) {
    match load_pair(dir, dimension) {
        Ok((index, store)) => {
            info!(
                rows = index.size(),
                documents = store.document_count(),
                "loaded persisted index from {}",
                dir.display()
            );
            (index, store)
        }
        Err(Error::NotFound(_)) => {
            info!("no persisted index in {}, starting empty", dir.display());
            (FlatL2Index::new(dimension), ChunkStore::new())
        }
        Err(e) => {
            warn!(
                error = %e,
                "discarding persisted index in {} and starting empty",
                dir.display()
            );
            (FlatL2Index::new(dimension), ChunkStore::new())
        }
    }
}

fn check_version(version: u32, path: &Path) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "{} has format version {}, expected {}",
            path.display(),
            version,
            FORMAT_VERSION
        )));
    }
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn encode_vectors(data: &[f32]) -> String {
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

fn decode_vectors(encoded: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Serialization(format!("invalid vector data: {}", e)))?;

    if bytes.len() % 4 != 0 {
        return Err(Error::Serialization(format!(
            "vector data length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
