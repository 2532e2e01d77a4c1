//! Word-level diff codec for content part edits.
//!
//! A [`Diff`] is a line-oriented encoding of the transformation from an
//! original word sequence to an edited one. Each line carries a tag
//! (unchanged / deleted / inserted) and the space-joined words of that span.
//! Concatenating the unchanged and deleted lines reproduces the original
//! text; concatenating the unchanged and inserted lines reproduces the
//! edited text. Inter-word whitespace is normalized to single spaces.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for diff computation, restoration, and merging.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A caller-supplied argument was malformed or unrecognized.
    #[error("Invalid diff argument: {0}")]
    Validation(String),

    /// Two diffs that must share an original text do not.
    #[error("Diff precondition violated: {0}")]
    Precondition(String),

    /// A merge splice point fell inside a span already changed by an
    /// earlier diff.
    #[error("Diff merge failed: {0}")]
    Merge(String),

    /// A stored diff encoding does not match the expected line format.
    #[error("Malformed diff encoding: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Diff model
// ---------------------------------------------------------------------------

/// The tag of a single span in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    /// Present in both the original and the edited text.
    Unchanged,
    /// Present only in the original text.
    Deleted,
    /// Present only in the edited text.
    Inserted,
}

impl DiffTag {
    /// Single-character prefix used by the line encoding.
    fn prefix(self) -> char {
        match self {
            Self::Unchanged => '=',
            Self::Deleted => '-',
            Self::Inserted => '+',
        }
    }

    /// Parse a line-encoding prefix back into a tag.
    fn from_prefix(c: &str) -> Option<Self> {
        match c {
            "=" => Some(Self::Unchanged),
            "-" => Some(Self::Deleted),
            "+" => Some(Self::Inserted),
            _ => None,
        }
    }
}

/// A single tagged span of a diff: one or more words joined by single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub text: String,
}

impl DiffLine {
    /// Number of words in this span.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Which side of a diff to project when restoring text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Original,
    Edited,
}

impl DiffSide {
    /// Parse a side selector string (`"original"` or `"edited"`).
    pub fn parse(side: &str) -> Result<Self, DiffError> {
        match side {
            "original" => Ok(Self::Original),
            "edited" => Ok(Self::Edited),
            other => Err(DiffError::Validation(format!(
                "Unknown diff side '{other}'. Must be 'original' or 'edited'"
            ))),
        }
    }
}

/// An immutable word-level diff between two texts.
///
/// Produced by [`compute_diff`] or [`Diff::decode`]; restored to either side
/// with [`Diff::restore`]. A diff never contains a "replace" span: replaced
/// regions are represented as a deleted span immediately followed by an
/// inserted span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub lines: Vec<DiffLine>,
}

impl Diff {
    /// Returns `true` if the diff contains no deleted or inserted spans.
    pub fn is_identity(&self) -> bool {
        self.lines.iter().all(|l| l.tag == DiffTag::Unchanged)
    }

    /// Number of words on the original side (unchanged + deleted spans).
    pub fn original_word_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.tag != DiffTag::Inserted)
            .map(DiffLine::word_count)
            .sum()
    }

    /// Project the diff onto one side, reproducing that side's text with
    /// whitespace collapsed to single spaces.
    pub fn restore(&self, side: DiffSide) -> String {
        let skipped = match side {
            DiffSide::Original => DiffTag::Inserted,
            DiffSide::Edited => DiffTag::Deleted,
        };
        self.lines
            .iter()
            .filter(|l| l.tag != skipped)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serialize to the line-oriented storage encoding.
    ///
    /// One line per span: a tag prefix (`=`, `-`, `+`), a space, and the
    /// span text. The empty diff encodes as the empty string.
    pub fn encode(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{} {}", l.tag.prefix(), l.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Restore a diff from its storage encoding.
    ///
    /// Any line that does not consist of a known tag prefix, a space, and a
    /// non-empty span text is a decode failure; corrupted records are never
    /// silently repaired.
    pub fn decode(encoded: &str) -> Result<Self, DiffError> {
        if encoded.is_empty() {
            return Ok(Self { lines: Vec::new() });
        }

        let mut lines = Vec::new();
        for (idx, raw) in encoded.lines().enumerate() {
            let (prefix, text) = raw.split_once(' ').ok_or_else(|| {
                DiffError::Decode(format!("Line {idx} has no tag separator: {raw:?}"))
            })?;
            let tag = DiffTag::from_prefix(prefix).ok_or_else(|| {
                DiffError::Decode(format!("Line {idx} has unknown tag prefix {prefix:?}"))
            })?;
            if text.is_empty() {
                return Err(DiffError::Decode(format!("Line {idx} has an empty span")));
            }
            lines.push(DiffLine {
                tag,
                text: text.to_string(),
            });
        }
        Ok(Self { lines })
    }
}

// ---------------------------------------------------------------------------
// Diff computation
// ---------------------------------------------------------------------------

/// Compute the word-level diff from `original` to `edited`.
///
/// Both texts are split on whitespace (line breaks carry no structural
/// meaning). The longest common subsequence over whole words decides which
/// words are unchanged; every remaining word becomes part of a deleted or
/// inserted span. No span is ever dropped as noise. Within a changed region
/// the deleted span always precedes the inserted span.
pub fn compute_diff(original: &str, edited: &str) -> Diff {
    let old: Vec<&str> = original.split_whitespace().collect();
    let new: Vec<&str> = edited.split_whitespace().collect();
    let m = old.len();
    let n = new.len();

    // Build LCS table over words.
    let mut lcs = vec![vec![0u32; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            if old[i - 1] == new[j - 1] {
                lcs[i][j] = lcs[i - 1][j - 1] + 1;
            } else {
                lcs[i][j] = lcs[i - 1][j].max(lcs[i][j - 1]);
            }
        }
    }

    // Backtrack to a per-word operation sequence.
    #[derive(Clone, Copy)]
    enum WordOp<'a> {
        Equal(&'a str),
        Delete(&'a str),
        Insert(&'a str),
    }

    let mut ops = Vec::with_capacity(m + n);
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            ops.push(WordOp::Equal(old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || lcs[i][j - 1] >= lcs[i - 1][j]) {
            ops.push(WordOp::Insert(new[j - 1]));
            j -= 1;
        } else {
            ops.push(WordOp::Delete(old[i - 1]));
            i -= 1;
        }
    }
    ops.reverse();

    // Group consecutive operations into tagged spans. Deleted and inserted
    // words of one changed region are collected together so the deleted span
    // always comes out before the inserted span.
    let mut lines = Vec::new();
    let mut equal_run: Vec<&str> = Vec::new();
    let mut deleted_run: Vec<&str> = Vec::new();
    let mut inserted_run: Vec<&str> = Vec::new();

    fn flush_changed(lines: &mut Vec<DiffLine>, deleted: &mut Vec<&str>, inserted: &mut Vec<&str>) {
        if !deleted.is_empty() {
            lines.push(DiffLine {
                tag: DiffTag::Deleted,
                text: deleted.join(" "),
            });
            deleted.clear();
        }
        if !inserted.is_empty() {
            lines.push(DiffLine {
                tag: DiffTag::Inserted,
                text: inserted.join(" "),
            });
            inserted.clear();
        }
    }

    fn flush_equal(lines: &mut Vec<DiffLine>, equal: &mut Vec<&str>) {
        if !equal.is_empty() {
            lines.push(DiffLine {
                tag: DiffTag::Unchanged,
                text: equal.join(" "),
            });
            equal.clear();
        }
    }

    for op in ops {
        match op {
            WordOp::Equal(w) => {
                flush_changed(&mut lines, &mut deleted_run, &mut inserted_run);
                equal_run.push(w);
            }
            WordOp::Delete(w) => {
                flush_equal(&mut lines, &mut equal_run);
                deleted_run.push(w);
            }
            WordOp::Insert(w) => {
                flush_equal(&mut lines, &mut equal_run);
                inserted_run.push(w);
            }
        }
    }
    flush_changed(&mut lines, &mut deleted_run, &mut inserted_run);
    flush_equal(&mut lines, &mut equal_run);

    Diff { lines }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
