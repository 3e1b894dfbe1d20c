//! Text library: a flat directory of UTF-8 `.txt` files.

use super::{estimate_generation_time, is_plain_name, sanitize_filename, MAX_TEXT_FILE_BYTES};
use crate::text::{char_count, is_long_text};
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of a text for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TextInfo {
    pub chars: usize,
    pub chunked: bool,
    /// Rough chunk count, only for chunked texts
    pub estimated_chunks: Option<usize>,
    pub preview: String,
    pub estimated_time: String,
}

impl TextInfo {
    /// Describe `text`; `max_chars` is both the single-pass threshold and
    /// the chunk size used for the estimate.
    pub fn describe(text: &str, max_chars: usize) -> Self {
        let chars = char_count(text);
        let chunked = is_long_text(text, max_chars);
        let estimated_chunks = chunked.then(|| chars.div_ceil(max_chars.max(1)));
        let preview = if chars > 100 {
            format!("{}...", text.chars().take(100).collect::<String>())
        } else {
            text.to_string()
        };

        Self {
            chars,
            chunked,
            estimated_chunks,
            preview,
            estimated_time: estimate_generation_time(chars, chunked),
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.chunked { "CHUNKED" } else { "SINGLE-PASS" }
    }
}

/// Read and trim a text file, rejecting empty content.
pub fn read_text_file(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))?;
    let text = raw.trim();
    if text.is_empty() {
        anyhow::bail!("Text file {} is empty", path.display());
    }
    Ok(text.to_string())
}

/// Text files stored under one directory.
#[derive(Debug, Clone)]
pub struct TextLibrary {
    root: PathBuf,
}

impl TextLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` inside the library. Names with path separators are
    /// rejected.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            anyhow::bail!("Invalid text name '{}'", name);
        }
        Ok(self.root.join(name))
    }

    /// `.txt` file names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map(|e| e == "txt").unwrap_or(false))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Trimmed content of a stored text.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            anyhow::bail!("Text '{}' not found in {}", name, self.root.display());
        }
        read_text_file(&path)
    }

    /// Save `content` (trimmed) under a sanitized name ending in `.txt`.
    pub fn save(&self, name: &str, content: &str) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("Text content is empty");
        }

        let mut file_name = sanitize_filename(name);
        if !file_name.ends_with(".txt") {
            file_name.push_str(".txt");
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let path = self.path_of(&file_name)?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved text {} ({} characters)", file_name, char_count(content));
        Ok(file_name)
    }

    /// Copy an existing `.txt` file into the library, under `name` or the
    /// source's file name.
    pub fn import(&self, source: &Path, name: Option<&str>) -> Result<String> {
        let is_txt = source
            .extension()
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if !is_txt {
            anyhow::bail!("Only .txt files are allowed");
        }

        let size = fs::metadata(source)
            .with_context(|| format!("Cannot read {}", source.display()))?
            .len();
        if size > MAX_TEXT_FILE_BYTES {
            anyhow::bail!("File too large (max 1MB)");
        }

        let bytes = fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
        let content = String::from_utf8(bytes).context("File is not valid UTF-8 text")?;

        let name = match name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        self.save(&name, &content)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        info!("Deleted text {}", name);
        Ok(())
    }

    pub fn info(&self, name: &str, max_chars: usize) -> Result<TextInfo> {
        Ok(TextInfo::describe(&self.read(name)?, max_chars))
    }
}

/// Base name of a text source used in output file names.
pub fn text_basename(name: &str) -> String {
    let stem = name.strip_suffix(".txt").unwrap_or(name);
    sanitize_filename(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> (TempDir, TextLibrary) {
        let dir = TempDir::new().unwrap();
        let lib = TextLibrary::new(dir.path().join("texts"));
        (dir, lib)
    }

    #[test]
    fn test_save_read_list_delete() {
        let (_dir, lib) = library();
        let name = lib.save("chapter one", "  Hello there.  \n").unwrap();
        assert_eq!(name, "chapter one.txt");
        lib.save("b.txt", "Second").unwrap();

        assert_eq!(lib.list().unwrap(), vec!["b.txt", "chapter one.txt"]);
        assert_eq!(lib.read("chapter one.txt").unwrap(), "Hello there.");

        lib.delete("b.txt").unwrap();
        assert_eq!(lib.list().unwrap(), vec!["chapter one.txt"]);
    }

    #[test]
    fn test_empty_content_rejected() {
        let (_dir, lib) = library();
        assert!(lib.save("x", "   \n ").is_err());

        fs::create_dir_all(lib.root()).unwrap();
        fs::write(lib.path_of("blank.txt").unwrap(), "\n\n").unwrap();
        assert!(lib.read("blank.txt").is_err());
        assert!(lib.read("missing.txt").is_err());
    }

    #[test]
    fn test_import_validation() {
        let (dir, lib) = library();
        let good = dir.path().join("story.txt");
        fs::write(&good, "Once upon a time.").unwrap();
        assert_eq!(lib.import(&good, None).unwrap(), "story.txt");

        let wrong_ext = dir.path().join("story.md");
        fs::write(&wrong_ext, "text").unwrap();
        assert!(lib.import(&wrong_ext, None).is_err());

        let binary = dir.path().join("bin.txt");
        fs::write(&binary, [0xff, 0xfe, 0xfd]).unwrap();
        assert!(lib.import(&binary, None).is_err());
    }

    #[test]
    fn test_import_under_given_name_and_size_cap() {
        let (dir, lib) = library();
        let source = dir.path().join("draft.txt");
        fs::write(&source, "  Chapter one.  ").unwrap();
        assert_eq!(lib.import(&source, Some("chapter")).unwrap(), "chapter.txt");
        assert_eq!(lib.read("chapter.txt").unwrap(), "Chapter one.");

        let huge = dir.path().join("huge.txt");
        fs::write(&huge, "a".repeat(MAX_TEXT_FILE_BYTES as usize + 1)).unwrap();
        assert!(lib.import(&huge, Some("huge")).is_err());
        assert!(lib.read("huge.txt").is_err());
    }

    #[test]
    fn test_names_cannot_leave_root() {
        let (dir, lib) = library();
        fs::write(dir.path().join("secret.txt"), "outside").unwrap();

        assert!(lib.path_of("../secret.txt").is_err());
        assert!(lib.path_of("a\\b.txt").is_err());
        assert!(lib.read("../secret.txt").is_err());
        assert!(lib.delete("../secret.txt").is_err());
        assert!(dir.path().join("secret.txt").exists());

        // Saved names are sanitized instead of rejected
        assert_eq!(lib.save("../escape", "x").unwrap(), "_escape.txt");
        assert!(lib.root().join("_escape.txt").exists());
    }

    #[test]
    fn test_info_modes() {
        let short = TextInfo::describe("Short text.", 500);
        assert!(!short.chunked);
        assert_eq!(short.estimated_chunks, None);
        assert_eq!(short.mode_label(), "SINGLE-PASS");

        let long_text = "a".repeat(1200);
        let long = TextInfo::describe(&long_text, 500);
        assert!(long.chunked);
        assert_eq!(long.estimated_chunks, Some(3));
        assert_eq!(long.preview.chars().count(), 103);
    }

    #[test]
    fn test_text_basename() {
        assert_eq!(text_basename("story.txt"), "story");
        assert_eq!(text_basename("inline"), "inline");
        assert_eq!(text_basename("a/b.txt"), "a_b");
    }
}
