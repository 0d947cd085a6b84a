//! Per-file and per-hunk unified diff splitting.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git a/";

/// Marker that begins a hunk within a file diff.
const HUNK_MARKER: &str = "@@ ";

/// Abbreviated blob id git prints for "no object" (`index 0000000..`).
const NULL_BLOB_PREFIX: char = '0';

#[allow(clippy::unwrap_used)] // Static pattern.
static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$").unwrap()
});

/// A per-file slice of a unified diff.
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path of the file (extracted from the `b/` side of `diff --git a/... b/...`).
    pub path: String,
    /// Raw text of this file's diff (header + all hunks).
    pub content: String,
}

/// A single hunk within one file's diff.
#[derive(Debug, Clone)]
pub struct HunkDiff {
    /// Parsed `@@` line, `None` when the line does not follow the unified format.
    pub header: Option<HunkHeader>,
    /// Raw text of this hunk starting from the `@@` line.
    pub content: String,
}

/// Line ranges from a `@@ -a,b +c,d @@` hunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkHeader {
    /// First line of the pre-image range (the line before it when `old_count` is 0).
    pub old_start: u32,
    /// Number of pre-image lines covered by the hunk.
    pub old_count: u32,
    /// First line of the post-image range (the line before it when `new_count` is 0).
    pub new_start: u32,
    /// Number of post-image lines covered by the hunk.
    pub new_count: u32,
}

/// Metadata lines of a file section (everything before the first hunk).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// Pre-image path, `None` for new files.
    pub old_path: Option<String>,
    /// Post-image path, `None` for deleted files.
    pub new_path: Option<String>,
    /// Section carries `new file mode`.
    pub is_new: bool,
    /// Section carries `deleted file mode`.
    pub is_deleted: bool,
    /// Section carries `rename from`/`rename to`.
    pub is_rename: bool,
    /// Section carries `copy from`/`copy to`.
    pub is_copy: bool,
    /// Abbreviated pre-image blob id from the `index` line.
    pub old_blob: Option<String>,
    /// Abbreviated post-image blob id from the `index` line.
    pub new_blob: Option<String>,
}

impl HunkHeader {
    /// Parses a `@@ -a[,b] +c[,d] @@[ section]` line.
    ///
    /// Omitted counts default to 1, as in the unified diff format.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = HUNK_HEADER_RE.captures(line.trim_end_matches(['\n', '\r']))?;
        let number = |i: usize, default: u32| -> Option<u32> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(default),
            }
        };

        Some(Self {
            old_start: number(1, 0)?,
            old_count: number(2, 1)?,
            new_start: number(3, 0)?,
            new_count: number(4, 1)?,
        })
    }

    /// Net number of lines this hunk adds to the file.
    pub fn line_delta(&self) -> i64 {
        i64::from(self.new_count) - i64::from(self.old_count)
    }

    /// Number of pre-image lines that precede this hunk.
    pub fn old_lines_before(&self) -> i64 {
        lines_before(self.old_start, self.old_count)
    }

    /// Returns a copy positioned at the given number of preceding lines
    /// on each side, keeping the counts.
    pub fn positioned(&self, old_before: i64, new_before: i64) -> Self {
        Self {
            old_start: start_from_lines_before(old_before, self.old_count),
            old_count: self.old_count,
            new_start: start_from_lines_before(new_before, self.new_count),
            new_count: self.new_count,
        }
    }
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// An empty range names the line *after which* it sits; a non-empty range
/// names its own first line.
fn lines_before(start: u32, count: u32) -> i64 {
    if count == 0 {
        i64::from(start)
    } else {
        i64::from(start) - 1
    }
}

fn start_from_lines_before(before: i64, count: u32) -> u32 {
    let before = before.max(0) as u32;
    if count == 0 {
        before
    } else {
        before + 1
    }
}

/// Returns any text that precedes the first file section.
pub fn preamble(diff: &str) -> &str {
    if diff.starts_with(FILE_DIFF_MARKER) {
        return "";
    }
    match diff.find(&format!("\n{FILE_DIFF_MARKER}")) {
        Some(pos) => &diff[..=pos],
        None => diff,
    }
}

/// Splits a flat unified diff at `diff --git a/` boundaries.
///
/// Returns one [`FileDiff`] for each file section found in the input.
/// Text before the first section is not part of any file; see [`preamble`].
pub fn split_by_file(diff: &str) -> Vec<FileDiff> {
    let positions = marker_positions(diff, FILE_DIFF_MARKER);

    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            let content = &diff[pos..end];
            let first_line = content.lines().next().unwrap_or("");
            let header = parse_file_header(file_header(content));
            let path = header
                .new_path
                .clone()
                .or_else(|| header.old_path.clone())
                .unwrap_or_else(|| extract_path_from_diff_header(first_line));

            FileDiff {
                path,
                content: content.to_string(),
            }
        })
        .collect()
}

/// Returns the metadata part of a file section: everything before the first hunk.
pub fn file_header(content: &str) -> &str {
    match marker_positions(content, HUNK_MARKER).first() {
        Some(&pos) => &content[..pos],
        None => content,
    }
}

/// Splits a [`FileDiff`] into per-hunk segments.
///
/// A file with no hunks (e.g., binary files, mode-only changes) returns
/// an empty `Vec`. The file header is available via [`file_header`].
pub fn split_file_by_hunk(file_diff: &FileDiff) -> Vec<HunkDiff> {
    let content = &file_diff.content;
    let hunk_positions = marker_positions(content, HUNK_MARKER);

    hunk_positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = hunk_positions.get(i + 1).copied().unwrap_or(content.len());
            let hunk_content = &content[pos..end];
            let header = hunk_content.lines().next().and_then(HunkHeader::parse);

            HunkDiff {
                header,
                content: hunk_content.to_string(),
            }
        })
        .collect()
}

/// Parses the metadata lines of a file section.
pub fn parse_file_header(header: &str) -> FileHeader {
    let mut parsed = FileHeader::default();

    for line in header.lines() {
        if line.starts_with("new file mode") {
            parsed.is_new = true;
        } else if line.starts_with("deleted file mode") {
            parsed.is_deleted = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            parsed.is_rename = true;
            parsed.old_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("rename to ") {
            parsed.is_rename = true;
            parsed.new_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("copy from ") {
            parsed.is_copy = true;
            parsed.old_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("copy to ") {
            parsed.is_copy = true;
            parsed.new_path = Some(path.to_string());
        } else if let Some(ids) = line.strip_prefix("index ") {
            // Format: "index abc1234..def5678[ 100644]"
            let range = ids.split_whitespace().next().unwrap_or("");
            if let Some((old, new)) = range.split_once("..") {
                parsed.old_blob = Some(old.to_string());
                parsed.new_blob = Some(new.to_string());
            }
        } else if let Some(path) = line.strip_prefix("--- ") {
            if parsed.old_path.is_none() {
                parsed.old_path = strip_side_prefix(path, "a/");
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            if parsed.new_path.is_none() {
                parsed.new_path = strip_side_prefix(path, "b/");
            }
        }
    }

    if parsed.is_new {
        parsed.old_path = None;
    }
    if parsed.is_deleted {
        parsed.new_path = None;
    }

    parsed
}

/// Returns true for an abbreviated blob id that names no object.
pub fn is_null_blob(id: &str) -> bool {
    id.chars().all(|c| c == NULL_BLOB_PREFIX)
}

/// `/dev/null` means the side does not exist.
fn strip_side_prefix(path: &str, prefix: &str) -> Option<String> {
    let path = path.trim_end_matches('\t');
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

/// Byte offsets of every line that starts with `marker`.
fn marker_positions(text: &str, marker: &str) -> Vec<usize> {
    let mut positions = Vec::new();

    if text.starts_with(marker) {
        positions.push(0);
    }
    let search = format!("\n{marker}");
    let mut start = 0;
    while let Some(pos) = text[start..].find(&search) {
        // +1 to skip the newline; the section starts at the marker.
        positions.push(start + pos + 1);
        start = start + pos + 1;
    }

    positions
}

/// Extracts the file path from the `b/` side of a `diff --git` header line.
fn extract_path_from_diff_header(header_line: &str) -> String {
    // Find the last " b/" to handle paths that may contain spaces.
    if let Some(b_pos) = header_line.rfind(" b/") {
        header_line[b_pos + 3..].to_string()
    } else {
        header_line
            .strip_prefix(FILE_DIFF_MARKER)
            .unwrap_or(header_line)
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ── test helpers ────────────────────────────────────────────

    fn make_file_header(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n\
             index abc1234..def5678 100644\n\
             --- a/{path}\n\
             +++ b/{path}\n"
        )
    }

    fn make_hunk(old_start: u32, old_count: u32, new_start: u32, new_count: u32, body: &str) -> String {
        format!("@@ -{old_start},{old_count} +{new_start},{new_count} @@\n{body}")
    }

    // ── HunkHeader ─────────────────────────────────────────────

    #[test]
    fn hunk_header_full_form() {
        let header = HunkHeader::parse("@@ -10,6 +10,7 @@ class ComponentA:").unwrap();
        assert_eq!(header.old_start, 10);
        assert_eq!(header.old_count, 6);
        assert_eq!(header.new_start, 10);
        assert_eq!(header.new_count, 7);
        assert_eq!(header.line_delta(), 1);
    }

    #[test]
    fn hunk_header_omitted_counts_default_to_one() {
        let header = HunkHeader::parse("@@ -3 +3 @@\n").unwrap();
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_count, 1);
    }

    #[test]
    fn hunk_header_rejects_garbage() {
        assert!(HunkHeader::parse("@@ nonsense @@").is_none());
        assert!(HunkHeader::parse("+@@ -1 +1 @@").is_none());
    }

    #[test]
    fn hunk_header_display_uses_explicit_counts() {
        let header = HunkHeader::parse("@@ -3 +3,2 @@").unwrap();
        assert_eq!(header.to_string(), "@@ -3,1 +3,2 @@");
    }

    #[test]
    fn positioned_handles_empty_ranges() {
        // Pure deletion: the post-image range names the line before it.
        let deletion = HunkHeader::parse("@@ -5,2 +4,0 @@").unwrap();
        assert_eq!(deletion.old_lines_before(), 4);
        assert_eq!(deletion.positioned(4, 4), deletion);
        assert_eq!(deletion.positioned(6, 6).to_string(), "@@ -7,2 +6,0 @@");

        // Insertion at the top of a new file.
        let creation = HunkHeader::parse("@@ -0,0 +1,3 @@").unwrap();
        assert_eq!(creation.old_lines_before(), 0);
        assert_eq!(creation.positioned(0, 0), creation);
    }

    // ── split_by_file ──────────────────────────────────────────

    #[test]
    fn split_by_file_empty_input() {
        assert!(split_by_file("").is_empty());
        assert!(split_by_file("   \n\n  \t  ").is_empty());
    }

    #[test]
    fn split_by_file_multiple_files() {
        let file1 = format!("{}{}", make_file_header("a.rs"), make_hunk(1, 1, 1, 2, " x\n+y\n"));
        let file2 = format!("{}{}", make_file_header("b.rs"), make_hunk(1, 1, 1, 2, " x\n+z\n"));
        let diff = format!("{file1}{file2}");

        let result = split_by_file(&diff);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].path, "a.rs");
        assert_eq!(result[1].path, "b.rs");
        let rejoined: String = result.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(rejoined, diff);
    }

    #[test]
    fn preamble_is_text_before_first_section() {
        let diff = format!("\n{}", make_file_header("a.rs"));
        assert_eq!(preamble(&diff), "\n");
        assert_eq!(preamble(&make_file_header("a.rs")), "");
        assert_eq!(preamble("no markers\n"), "no markers\n");
    }

    #[test]
    fn split_by_file_deleted_file_uses_old_path() {
        let diff = "diff --git a/gone.rs b/gone.rs\n\
                    deleted file mode 100644\n\
                    index abc1234..0000000\n\
                    --- a/gone.rs\n\
                    +++ /dev/null\n\
                    @@ -1 +0,0 @@\n\
                    -fn gone() {}\n";
        let result = split_by_file(diff);
        assert_eq!(result[0].path, "gone.rs");
    }

    #[test]
    fn split_by_file_rename_uses_new_path() {
        let diff = "diff --git a/old_name.rs b/new_name.rs\n\
                    similarity index 95%\n\
                    rename from old_name.rs\n\
                    rename to new_name.rs\n";
        let result = split_by_file(diff);
        assert_eq!(result[0].path, "new_name.rs");
    }

    // ── split_file_by_hunk ─────────────────────────────────────

    #[test]
    fn split_file_by_hunk_no_hunks() {
        let file_diff = FileDiff {
            path: "script.sh".to_string(),
            content: "diff --git a/script.sh b/script.sh\n\
                      old mode 100644\n\
                      new mode 100755\n"
                .to_string(),
        };
        assert!(split_file_by_hunk(&file_diff).is_empty());
        assert_eq!(file_header(&file_diff.content), file_diff.content);
    }

    #[test]
    fn split_file_by_hunk_multiple_hunks() {
        let header = make_file_header("lib.rs");
        let hunk1 = make_hunk(1, 3, 1, 4, " a\n+b\n c\n d\n");
        let hunk2 = make_hunk(10, 2, 11, 3, " e\n+f\n g\n");
        let content = format!("{header}{hunk1}{hunk2}");
        let file_diff = FileDiff {
            path: "lib.rs".to_string(),
            content: content.clone(),
        };

        let hunks = split_file_by_hunk(&file_diff);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].content, hunk1);
        assert_eq!(hunks[1].header.unwrap().old_start, 10);
        assert_eq!(file_header(&content), header);
    }

    // ── parse_file_header ──────────────────────────────────────

    #[test]
    fn parse_file_header_new_file() {
        let header = parse_file_header(
            "diff --git a/new.rs b/new.rs\n\
             new file mode 100644\n\
             index 0000000..5551234\n\
             --- /dev/null\n\
             +++ b/new.rs\n",
        );
        assert!(header.is_new);
        assert_eq!(header.old_path, None);
        assert_eq!(header.new_path.as_deref(), Some("new.rs"));
        assert_eq!(header.new_blob.as_deref(), Some("5551234"));
        assert!(is_null_blob(header.old_blob.as_deref().unwrap()));
    }

    #[test]
    fn parse_file_header_rename() {
        let header = parse_file_header(
            "diff --git a/old.rs b/new.rs\n\
             similarity index 90%\n\
             rename from old.rs\n\
             rename to new.rs\n\
             index abc1234..def5678 100644\n",
        );
        assert!(header.is_rename);
        assert_eq!(header.old_path.as_deref(), Some("old.rs"));
        assert_eq!(header.new_path.as_deref(), Some("new.rs"));
        assert_eq!(header.old_blob.as_deref(), Some("abc1234"));
    }

    #[test]
    fn path_extraction_with_spaces() {
        assert_eq!(
            extract_path_from_diff_header("diff --git a/my file.rs b/my file.rs"),
            "my file.rs"
        );
    }
}
