//! SubRip (`.srt`) serialization of subtitle entries.

use crate::defaults;
use crate::error::Result;
use crate::pipeline::types::{SourceId, SubtitleEntry};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Formats seconds as `HH:MM:SS,mmm`, rounded to the nearest millisecond.
///
/// Negative and non-finite inputs are clamped to zero. Hours keep growing
/// past 99 rather than wrapping.
pub fn format_timestamp(seconds: f64) -> String {
    let millis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, ms) = (rest / 1000, rest % 1000);
    format!("{hours:02}:{minutes:02}:{secs:02},{ms:03}")
}

/// Renders entries as numbered SubRip blocks, sorted by start time.
///
/// The sort is stable, so entries sharing a start keep their input order.
pub fn render(entries: &[SubtitleEntry]) -> String {
    let mut sorted: Vec<&SubtitleEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out = String::new();
    for (i, entry) in sorted.into_iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(entry.start),
            format_timestamp(entry.end),
            entry.text
        ));
    }
    out
}

/// Subtitle file for `video` inside `output_dir`: `<output_dir>/<stem>.srt`.
pub fn subtitle_path(output_dir: &Path, video: &Path) -> PathBuf {
    // Appended rather than set with `with_extension`, which would eat any
    // dotted suffix of the stem ("show.s01e01").
    let mut name = video
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "subtitles".into());
    name.push(".");
    name.push(defaults::SUBTITLE_EXTENSION);
    output_dir.join(name)
}

/// Writes `entries` to `path` in SubRip format.
pub fn write_file(path: &Path, entries: &[SubtitleEntry]) -> Result<()> {
    fs::write(path, render(entries))?;
    Ok(())
}

/// Groups entries by the video they came from.
pub fn group_by_source(entries: Vec<SubtitleEntry>) -> BTreeMap<SourceId, Vec<SubtitleEntry>> {
    let mut groups: BTreeMap<SourceId, Vec<SubtitleEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.source.clone()).or_default().push(entry);
    }
    groups
}

/// Writes one subtitle file per source video and returns the written paths.
pub fn write_all(output_dir: &Path, entries: Vec<SubtitleEntry>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (source, group) in group_by_source(entries) {
        let path = subtitle_path(output_dir, &source);
        log::info!(
            "Writing {} subtitle(s) for {} to {}",
            group.len(),
            source.display(),
            path.display()
        );
        write_file(&path, &group)?;
        written.push(path);
    }
    Ok(written)
}
