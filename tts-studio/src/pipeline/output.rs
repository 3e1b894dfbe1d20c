//! Output directory layout and file naming.

use crate::history::HistoryStore;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `{root}/wav`, `{root}/mp3`, plus history and summaries in `{root}`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub wav_dir: PathBuf,
    pub mp3_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            wav_dir: root.join("wav"),
            mp3_dir: root.join("mp3"),
            root,
        }
    }

    /// Create all output directories.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.root, &self.wav_dir, &self.mp3_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn names(&self, voice: &str, text_basename: &str) -> OutputNames {
        OutputNames {
            base: format!("{}_{}", voice, text_basename),
        }
    }

    pub fn wav_path(&self, names: &OutputNames, chunked: bool) -> PathBuf {
        self.wav_dir.join(names.file_name(chunked, "wav"))
    }

    pub fn mp3_path(&self, names: &OutputNames, chunked: bool) -> PathBuf {
        self.mp3_dir.join(names.file_name(chunked, "mp3"))
    }

    pub fn summary_path(&self, names: &OutputNames) -> PathBuf {
        self.root.join(format!("{}_summary.txt", names.base))
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::in_dir(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// File names derived from `{voice}_{text}`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNames {
    pub base: String,
}

impl OutputNames {
    /// `{base}.ext` for single-pass output, `{base}_full.ext` for chunked.
    pub fn file_name(&self, chunked: bool, ext: &str) -> String {
        let suffix = if chunked { "_full" } else { "" };
        format!("{}{}.{}", self.base, suffix, ext)
    }
}
