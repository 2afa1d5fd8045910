//! Progress indicators for upload runs

use indicatif::{ProgressBar, ProgressStyle};

/// Bar counting files through the upload phase; `msg` shows the file in flight
pub fn create_upload_progress(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({elapsed_precise}, eta {eta}) {msg}";
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Binary-prefixed size, e.g. `1.50 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", size, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(734_003_200), "700.00 MB");
        assert_eq!(format_bytes(3 * 1073741824), "3.00 GB");
    }

    #[test]
    fn test_upload_progress_length() {
        let pb = create_upload_progress(12, "Uploading");
        assert_eq!(pb.length(), Some(12));
        pb.inc(5);
        assert_eq!(pb.position(), 5);
        pb.finish_and_clear();
    }
}
