//! Content hash computation for resource source trees.
//!
//! Every file under every source root becomes a blake3 leaf (relative path plus
//! file digest); leaves are ordered by root then path and folded into a Merkle root.

use crate::types::ContentHash;
use rs_merkle::{Hasher, MerkleTree};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// blake3 adapter for rs_merkle
#[derive(Clone)]
pub struct Blake3Algorithm;

impl Hasher for Blake3Algorithm {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }
}

/// Compute the content hash of a set of source roots.
///
/// A root that does not exist still contributes a marker leaf, so a root appearing
/// later changes the hash. Entries that cannot be walked or read (symlink loops,
/// permission errors) contribute an error marker leaf and are logged.
pub fn compute_sources_hash(roots: &[PathBuf]) -> ContentHash {
    let mut leaves: Vec<[u8; 32]> = Vec::new();

    for root in roots {
        if !root.exists() {
            leaves.push(Blake3Algorithm::hash(
                format!("missing:{}", root.display()).as_bytes(),
            ));
            continue;
        }

        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Skipping unwalkable entry in content hash");
                    leaves.push(error_leaf(root, e.path()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match file_leaf(root, entry.path()) {
                Ok(leaf) => leaves.push(leaf),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file in content hash");
                    leaves.push(error_leaf(root, Some(entry.path())));
                }
            }
        }
    }

    let tree = MerkleTree::<Blake3Algorithm>::from_leaves(&leaves);
    tree.root()
        .unwrap_or_else(|| Blake3Algorithm::hash(b"weft:empty-sources"))
}

fn file_leaf(root: &Path, path: &Path) -> std::io::Result<[u8; 32]> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let bytes = std::fs::read(path)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(&[0]);
    hasher.update(relative.to_string_lossy().as_bytes());
    hasher.update(&[0]);
    hasher.update(blake3::hash(&bytes).as_bytes());
    Ok(*hasher.finalize().as_bytes())
}

fn error_leaf(root: &Path, path: Option<&Path>) -> [u8; 32] {
    let relative = path
        .map(|p| p.strip_prefix(root).unwrap_or(p).to_string_lossy().into_owned())
        .unwrap_or_default();
    Blake3Algorithm::hash(format!("unreadable:{}:{}", root.display(), relative).as_bytes())
}
