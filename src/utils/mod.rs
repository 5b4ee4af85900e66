//! Utility functions and helpers

use std::time::Duration;

use sha2::{Digest, Sha256};

/// First four bytes of the SHA-256 of `content`, hex encoded
pub fn hash_content(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..4])
}

/// `<base>.<hash>.<ext>` for a packed group
pub fn hash_filename(base: &str, content: &[u8], ext: &str) -> String {
    format!("{base}.{}.{ext}", hash_content(content))
}

/// Replace characters that do not belong in a file name
///
/// Labels may come from entry file paths, so path separators are flattened.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim_start_matches("./")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Human-readable byte count, as printed in the build summary
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Human-readable elapsed time
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    match duration.as_secs() {
        0 => format!("{millis}ms"),
        secs if secs < 60 => format!("{:.2}s", duration.as_secs_f64()),
        secs => {
            let rest = duration.as_secs_f64() - (secs / 60 * 60) as f64;
            format!("{}m {rest:.2}s", secs / 60)
        }
    }
}
