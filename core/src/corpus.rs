use crate::RawDocument;
use anyhow::{bail, Result};
use bzip2::read::MultiBzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Shards are bzip2-compressed line-delimited JSON.
pub const SHARD_EXTENSION: &str = "bz2";

pub struct CorpusReader {
    shards: Vec<PathBuf>,
}

impl CorpusReader {
    /// Accepts a single shard file or a directory tree of shards. Directory
    /// scans are sorted by path so repeated indexing runs see the same order.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut shards: Vec<PathBuf> = Vec::new();
        if path.is_file() {
            shards.push(path.to_path_buf());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some(SHARD_EXTENSION) {
                    shards.push(p.to_path_buf());
                }
            }
            shards.sort();
        } else {
            bail!("corpus path not found: {}", path.display());
        }
        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Lazy stream of raw documents across all shards. Unreadable shards and
    /// malformed lines are skipped, never fatal.
    pub fn docs(&self) -> DocStream<'_> {
        DocStream { shards: self.shards.iter(), current: None }
    }
}

type ShardLines = Lines<BufReader<MultiBzDecoder<File>>>;

pub struct DocStream<'a> {
    shards: std::slice::Iter<'a, PathBuf>,
    current: Option<ShardLines>,
}

impl Iterator for DocStream<'_> {
    type Item = RawDocument;

    fn next(&mut self) -> Option<RawDocument> {
        loop {
            match self.current.as_mut() {
                Some(lines) => match lines.next() {
                    Some(Ok(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        // Malformed lines exist in the dump; skip them.
                        if let Ok(doc) = serde_json::from_str::<RawDocument>(line) {
                            return Some(doc);
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(%err, "shard read failed, skipping remainder");
                        self.current = None;
                    }
                    None => self.current = None,
                },
                None => {
                    let path = self.shards.next()?;
                    match File::open(path) {
                        Ok(f) => {
                            self.current = Some(BufReader::new(MultiBzDecoder::new(f)).lines());
                        }
                        Err(err) => {
                            tracing::warn!(path = %path.display(), %err, "cannot open shard, skipping");
                        }
                    }
                }
            }
        }
    }
}
