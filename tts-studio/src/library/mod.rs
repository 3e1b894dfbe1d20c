//! Voice and text libraries plus shared naming and formatting helpers.

pub mod texts;
pub mod voices;

pub use texts::TextLibrary;
pub use voices::VoiceLibrary;

use std::path::Path;

/// Audio extensions recognized as voice reference material.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "m4a", "opus"];

/// Largest accepted audio upload.
pub const MAX_AUDIO_FILE_BYTES: u64 = 50_000_000;

/// Largest accepted text import.
pub const MAX_TEXT_FILE_BYTES: u64 = 1_000_000;

/// Make a user supplied name safe to use as a file or directory name.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `name` refers to an entry directly inside a library root.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Whether `path` has a recognized audio extension (case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Human readable duration: "45.0s", "1m 30s", "2h 5m".
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }
    let total = seconds as u64;
    if total >= 3600 {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    } else {
        format!("{}m {}s", total / 60, total % 60)
    }
}

/// Human readable size: "1.5 MB".
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Rough generation time at half a second per character, with a 20%
/// overhead for chunked texts.
pub fn estimate_generation_time(char_count: usize, chunked: bool) -> String {
    let mut secs = char_count as f64 * 0.5;
    if chunked {
        secs *= 1.2;
    }
    let secs = secs as u64;
    if secs < 60 {
        format!("~{}s", secs)
    } else if secs < 3600 {
        format!("~{}m", secs / 60)
    } else {
        format!("~{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my voice"), "my voice");
        assert_eq!(sanitize_filename("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_filename("a<b>c:d\"e|f?g*h\\i"), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_filename("  .hidden. "), "hidden");
        assert_eq!(sanitize_filename("..."), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
    }

    #[test]
    fn test_is_plain_name() {
        assert!(is_plain_name("anna"));
        assert!(is_plain_name("story.txt"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name("a\\b"));
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("a.wav")));
        assert!(is_audio_file(Path::new("b.MP3")));
        assert!(is_audio_file(Path::new("dir/c.Opus")));
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("noext")));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45.0), "45.0s");
        assert_eq!(format_duration(90.4), "1m 30s");
        assert_eq!(format_duration(7500.0), "2h 5m");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_estimate_generation_time() {
        assert_eq!(estimate_generation_time(100, false), "~50s");
        assert_eq!(estimate_generation_time(1000, true), "~10m");
        assert_eq!(estimate_generation_time(10_000, false), "~1h 23m");
    }
}
