//! Generation history: a JSON array of records in the output directory.
//!
//! The file is rewritten in full on every change. A missing file is an
//! empty history; a file that does not parse is an error and is left alone.

use crate::tts::GenerationParams;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HISTORY_FILE_NAME: &str = "generation_history.json";

/// One completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: u64,
    pub timestamp: DateTime<Local>,
    pub voice_name: String,
    pub text_source: String,
    pub text_length: usize,
    pub wav_path: PathBuf,
    pub mp3_path: Option<PathBuf>,
    pub chunk_count: usize,
    pub mode: String,
    pub parameters: GenerationParams,
}

/// Data for a new record; id, timestamp and mode are filled in on insert.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub voice_name: String,
    pub text_source: String,
    pub text_length: usize,
    pub wav_path: PathBuf,
    pub mp3_path: Option<PathBuf>,
    pub chunk_count: usize,
    pub parameters: GenerationParams,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryStats {
    pub total_generations: usize,
    pub unique_voices: usize,
    pub total_characters: usize,
    pub chunked_generations: usize,
    pub single_pass_generations: usize,
    pub voices_used: Vec<String>,
}

pub fn mode_label(chunk_count: usize) -> &'static str {
    if chunk_count > 0 { "chunked" } else { "single-pass" }
}

/// File-backed history store.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `{output_dir}/generation_history.json`.
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(HISTORY_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<GenerationRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("History file {} is corrupt", self.path.display()))
    }

    fn save(&self, records: &[GenerationRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary history file")?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, records)
                .context("Failed to write history JSON")?;
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to save history {}", self.path.display()))?;
        Ok(())
    }

    /// Append a record and return it.
    pub fn add(&self, entry: NewGeneration) -> Result<GenerationRecord> {
        let mut records = self.load()?;
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        let record = GenerationRecord {
            id,
            timestamp: Local::now(),
            mode: mode_label(entry.chunk_count).to_string(),
            voice_name: entry.voice_name,
            text_source: entry.text_source,
            text_length: entry.text_length,
            wav_path: entry.wav_path,
            mp3_path: entry.mp3_path,
            chunk_count: entry.chunk_count,
            parameters: entry.parameters,
        };

        records.push(record.clone());
        self.save(&records)?;
        Ok(record)
    }

    /// All records, newest first.
    pub fn all(&self) -> Result<Vec<GenerationRecord>> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    pub fn by_voice(&self, voice_name: &str) -> Result<Vec<GenerationRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| r.voice_name == voice_name)
            .collect())
    }

    pub fn by_id(&self, id: u64) -> Result<Option<GenerationRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Remove one record. Returns false if no record had that id.
    pub fn delete(&self, id: u64) -> Result<bool> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }

    pub fn statistics(&self) -> Result<HistoryStats> {
        let records = self.load()?;
        let voices: BTreeSet<&str> = records.iter().map(|r| r.voice_name.as_str()).collect();
        let chunked = records.iter().filter(|r| r.chunk_count > 0).count();

        Ok(HistoryStats {
            total_generations: records.len(),
            unique_voices: voices.len(),
            total_characters: records.iter().map(|r| r.text_length).sum(),
            chunked_generations: chunked,
            single_pass_generations: records.len() - chunked,
            voices_used: voices.into_iter().map(String::from).collect(),
        })
    }

    /// Write the history as CSV, oldest first.
    pub fn export_csv(&self, output: &Path) -> Result<usize> {
        let records = self.load()?;
        let file = File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "id,timestamp,voice_name,text_source,text_length,mode,chunk_count,wav_path,mp3_path"
        )?;
        for r in &records {
            let mp3 = r
                .mp3_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let fields = [
                r.id.to_string(),
                r.timestamp.to_rfc3339(),
                r.voice_name.clone(),
                r.text_source.clone(),
                r.text_length.to_string(),
                r.mode.clone(),
                r.chunk_count.to_string(),
                r.wav_path.display().to_string(),
                mp3,
            ];
            let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            writeln!(writer, "{}", line.join(","))?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(voice: &str, chunks: usize) -> NewGeneration {
        NewGeneration {
            voice_name: voice.to_string(),
            text_source: "story.txt".to_string(),
            text_length: 120,
            wav_path: PathBuf::from(format!("/out/wav/{}_story.wav", voice)),
            mp3_path: None,
            chunk_count: chunks,
            parameters: GenerationParams::default(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::in_dir(dir.path());
        assert!(store.all().unwrap().is_empty());
        assert_eq!(store.statistics().unwrap(), HistoryStats::default());
    }

    #[test]
    fn test_add_assigns_ids_and_mode() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::in_dir(dir.path());

        let first = store.add(entry("anna", 0)).unwrap();
        let second = store.add(entry("bob", 3)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.mode, "single-pass");
        assert_eq!(second.id, 2);
        assert_eq!(second.mode, "chunked");

        // Ids keep growing after a delete
        assert!(store.delete(1).unwrap());
        assert!(!store.delete(1).unwrap());
        assert_eq!(store.add(entry("anna", 0)).unwrap().id, 3);
    }

    #[test]
    fn test_queries_and_statistics() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::in_dir(dir.path());
        store.add(entry("anna", 0)).unwrap();
        store.add(entry("bob", 4)).unwrap();
        store.add(entry("anna", 2)).unwrap();

        let all = store.all().unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(store.by_voice("anna").unwrap().len(), 2);
        assert_eq!(store.by_id(2).unwrap().unwrap().voice_name, "bob");
        assert!(store.by_id(9).unwrap().is_none());

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_generations, 3);
        assert_eq!(stats.unique_voices, 2);
        assert_eq!(stats.total_characters, 360);
        assert_eq!(stats.chunked_generations, 2);
        assert_eq!(stats.single_pass_generations, 1);
        assert_eq!(stats.voices_used, vec!["anna", "bob"]);

        store.clear().unwrap();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error_and_untouched() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::in_dir(dir.path());
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.all().is_err());
        assert!(store.add(entry("anna", 0)).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_export_csv_quotes_fields() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::in_dir(dir.path());
        let mut e = entry("anna", 0);
        e.text_source = "Hello, \"world\"".to_string();
        store.add(e).unwrap();

        let csv_path = dir.path().join("history.csv");
        assert_eq!(store.export_csv(&csv_path).unwrap(), 1);
        let csv = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,timestamp,voice_name,text_source,text_length,mode,chunk_count,wav_path,mp3_path"
        );
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].contains(",anna,\"Hello, \"\"world\"\"\",120,single-pass,0,"));
        assert!(lines[1].ends_with(","));
    }

    #[test]
    fn test_csv_field() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
