//! Knowledge-base loader.
//!
//! Lists the files directly inside the corpus directory, keeps those with
//! the configured extension, and reads them in ascending byte-wise filename
//! order. That order decides which index row belongs to which file, so it
//! must never depend on directory iteration order. Symlinked files are
//! followed.

use globset::{Glob, GlobMatcher};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{RagError, Result};
use crate::models::Document;

/// Load every matching document from the configured corpus directory.
pub fn load(config: &CorpusConfig) -> Result<Vec<Document>> {
    load_dir(&config.dir, &config.extension)
}

/// Load every `*.{extension}` file directly inside `dir`, sorted by filename.
///
/// A missing directory is a [`RagError::Corpus`]; an empty one is not.
pub fn load_dir(dir: &Path, extension: &str) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(RagError::Corpus(format!(
            "corpus directory does not exist: {}",
            dir.display()
        )));
    }

    let matcher = extension_matcher(extension)?;

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| {
            RagError::Corpus(format!("failed to list {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }
        let name = entry.file_name().to_str().ok_or_else(|| {
            RagError::Corpus(format!(
                "file name is not valid UTF-8: {}",
                entry.path().display()
            ))
        })?;
        names.push(name.to_string());
    }

    names.sort();

    let mut documents = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        let bytes = std::fs::read(&path).map_err(|e| {
            RagError::Corpus(format!("failed to read {}: {}", path.display(), e))
        })?;
        let content = String::from_utf8(bytes).map_err(|_| {
            RagError::Corpus(format!("{} is not valid UTF-8", path.display()))
        })?;
        documents.push(Document {
            source_id: name,
            content,
        });
    }

    Ok(documents)
}

/// Stable digest of the corpus, stored with the index to detect edits made
/// without a rebuild.
pub fn fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.source_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn extension_matcher(extension: &str) -> Result<GlobMatcher> {
    let ext = extension.trim_start_matches('.');
    let glob = Glob::new(&format!("*.{}", ext)).map_err(|e| {
        RagError::Configuration(format!("invalid corpus extension '{}': {}", extension, e))
    })?;
    Ok(glob.compile_matcher())
}
