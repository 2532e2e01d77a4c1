//! Conflict detection and multi-edit merge over a shared original text.
//!
//! Concurrent edits to the same content part are diffs of the same original.
//! [`conflict`] reports whether two such diffs touch overlapping regions of
//! the original; [`merge`] splices a chronologically ordered set of
//! non-conflicting diffs into one combined result. [`merge_chained`] is the
//! alternate mode for adjacent edits where each diff's original is the
//! previous diff's edited text.

use crate::diff::{Diff, DiffError, DiffLine, DiffSide, DiffTag};

// ---------------------------------------------------------------------------
// Changed runs
// ---------------------------------------------------------------------------

/// A maximal run of changed spans (deleted and inserted collapsed together),
/// positioned by word offsets into the shared original text.
///
/// `start == end` for a pure insertion: the run sits between original words
/// without consuming any.
#[derive(Debug)]
struct ChangedRun {
    /// Original word offset where the run begins.
    start: usize,
    /// Original word offset one past the last deleted word.
    end: usize,
    /// Words inserted by this run, in edited order.
    inserted: Vec<String>,
}

/// Partition a diff into its changed runs over original word offsets.
fn changed_runs(diff: &Diff) -> Vec<ChangedRun> {
    let mut runs = Vec::new();
    let mut offset = 0usize;
    let mut current: Option<ChangedRun> = None;

    for line in &diff.lines {
        match line.tag {
            DiffTag::Unchanged => {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
                offset += line.word_count();
            }
            DiffTag::Deleted => {
                let words = line.word_count();
                let run = current.get_or_insert_with(|| ChangedRun {
                    start: offset,
                    end: offset,
                    inserted: Vec::new(),
                });
                run.end += words;
                offset += words;
            }
            DiffTag::Inserted => {
                let run = current.get_or_insert_with(|| ChangedRun {
                    start: offset,
                    end: offset,
                    inserted: Vec::new(),
                });
                run.inserted
                    .extend(line.text.split_whitespace().map(String::from));
            }
        }
    }
    if let Some(run) = current.take() {
        runs.push(run);
    }
    runs
}

/// Positional overlap between two changed runs.
///
/// A zero-width run (pure insertion) overlaps any run whose span contains its
/// anchor point, boundaries included: an insertion at the edge of a deleted
/// region, or two insertions at the same point, cannot be ordered safely.
/// Two non-empty runs that merely share a boundary are disjoint.
fn runs_overlap(a: &ChangedRun, b: &ChangedRun) -> bool {
    if a.start == a.end {
        return b.start <= a.start && a.start <= b.end;
    }
    if b.start == b.end {
        return a.start <= b.start && b.start <= a.end;
    }
    a.start < b.end && b.start < a.end
}

// ---------------------------------------------------------------------------
// Conflict detection
// ---------------------------------------------------------------------------

/// Decide whether two diffs of the same original modify overlapping regions.
///
/// Returns `false` when every changed run of one diff is positionally
/// disjoint from every changed run of the other (safe to auto-merge).
/// Fails with a precondition error when the two diffs do not restore to the
/// same original text.
pub fn conflict(a: &Diff, b: &Diff) -> Result<bool, DiffError> {
    if a.restore(DiffSide::Original) != b.restore(DiffSide::Original) {
        return Err(DiffError::Precondition(
            "diffs do not share the same original text".to_string(),
        ));
    }

    let runs_a = changed_runs(a);
    let runs_b = changed_runs(b);
    Ok(runs_a
        .iter()
        .any(|ra| runs_b.iter().any(|rb| runs_overlap(ra, rb))))
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge diffs of the same original, ordered ascending by acceptance time,
/// and return the combined edited text.
///
/// See [`merge_diffs`] for the splicing rules and failure conditions.
pub fn merge(diffs: &[Diff]) -> Result<String, DiffError> {
    Ok(merge_diffs(diffs)?.restore(DiffSide::Edited))
}

/// Merge diffs of the same original into one combined diff.
///
/// The first diff seeds the merge; each later diff's changed runs are
/// located in the running result by original word offset and spliced in,
/// splitting an unchanged span in two when a splice point falls inside it.
/// Splicing fails when a later diff changes words already changed by an
/// earlier diff, or deletes across an earlier diff's insertion point.
/// Nothing is ever silently dropped: any inconsistency is a merge error.
pub fn merge_diffs(diffs: &[Diff]) -> Result<Diff, DiffError> {
    let first = diffs.first().ok_or_else(|| {
        DiffError::Validation("merge requires at least one diff".to_string())
    })?;
    let original = first.restore(DiffSide::Original);
    let orig_words: Vec<String> = original.split_whitespace().map(String::from).collect();

    // Per-word deletion marks plus insertions anchored at word offsets,
    // kept in acceptance order for same-anchor rendering.
    let mut deleted = vec![false; orig_words.len()];
    struct Insertion {
        anchor: usize,
        words: Vec<String>,
    }
    let mut insertions: Vec<Insertion> = Vec::new();

    for (idx, diff) in diffs.iter().enumerate() {
        if idx > 0 && diff.restore(DiffSide::Original) != original {
            return Err(DiffError::Precondition(format!(
                "diff {idx} does not restore to the shared original text"
            )));
        }
        for run in changed_runs(diff) {
            if deleted[run.start..run.end].iter().any(|d| *d) {
                return Err(DiffError::Merge(format!(
                    "diff {idx} changes words {}..{} already changed by an earlier diff",
                    run.start, run.end
                )));
            }
            if let Some(ins) = insertions
                .iter()
                .find(|ins| run.start < ins.anchor && ins.anchor < run.end)
            {
                return Err(DiffError::Merge(format!(
                    "diff {idx} deletes across an earlier insertion point at word {}",
                    ins.anchor
                )));
            }
            for d in &mut deleted[run.start..run.end] {
                *d = true;
            }
            if !run.inserted.is_empty() {
                insertions.push(Insertion {
                    anchor: run.end,
                    words: run.inserted,
                });
            }
        }
    }

    // Regenerate the merged line sequence: walk original word offsets,
    // emitting anchored insertions after any deleted words they trail.
    let mut lines: Vec<DiffLine> = Vec::new();
    let mut equal_buf: Vec<&str> = Vec::new();
    let mut deleted_buf: Vec<&str> = Vec::new();

    fn flush(lines: &mut Vec<DiffLine>, tag: DiffTag, buf: &mut Vec<&str>) {
        if !buf.is_empty() {
            lines.push(DiffLine {
                tag,
                text: buf.join(" "),
            });
            buf.clear();
        }
    }

    for offset in 0..=orig_words.len() {
        for ins in insertions.iter().filter(|ins| ins.anchor == offset) {
            flush(&mut lines, DiffTag::Unchanged, &mut equal_buf);
            flush(&mut lines, DiffTag::Deleted, &mut deleted_buf);
            lines.push(DiffLine {
                tag: DiffTag::Inserted,
                text: ins.words.join(" "),
            });
        }
        if offset < orig_words.len() {
            if deleted[offset] {
                flush(&mut lines, DiffTag::Unchanged, &mut equal_buf);
                deleted_buf.push(&orig_words[offset]);
            } else {
                flush(&mut lines, DiffTag::Deleted, &mut deleted_buf);
                equal_buf.push(&orig_words[offset]);
            }
        }
    }
    flush(&mut lines, DiffTag::Unchanged, &mut equal_buf);
    flush(&mut lines, DiffTag::Deleted, &mut deleted_buf);

    Ok(Diff { lines })
}

/// Apply a chain of diffs where each diff's original is the previous diff's
/// edited result, returning the final edited text.
///
/// This is the mode for adjacent edits to the same still-open part: the
/// diffs do not share one base text, they stack. Fails with a precondition
/// error as soon as a link's original does not match the running text.
pub fn merge_chained(diffs: &[Diff]) -> Result<String, DiffError> {
    let first = diffs.first().ok_or_else(|| {
        DiffError::Validation("merge requires at least one diff".to_string())
    })?;
    let mut text = first.restore(DiffSide::Edited);
    for (idx, diff) in diffs.iter().enumerate().skip(1) {
        if diff.restore(DiffSide::Original) != text {
            return Err(DiffError::Precondition(format!(
                "diff {idx} original does not match the previous edited text"
            )));
        }
        text = diff.restore(DiffSide::Edited);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;

    const BASE: &str = "alpha beta gamma delta epsilon";

    // -- conflict ------------------------------------------------------------

    #[test]
    fn conflict_requires_shared_original() {
        let a = compute_diff("one two", "one three");
        let b = compute_diff("four five", "four six");
        let err = conflict(&a, &b).unwrap_err();
        assert!(matches!(err, DiffError::Precondition(_)));
    }

    #[test]
    fn noop_diff_never_conflicts() {
        let edit = compute_diff(BASE, "alpha beta gamma delta omega");
        let noop = compute_diff(BASE, BASE);
        assert!(!conflict(&edit, &noop).unwrap());
        assert!(!conflict(&noop, &edit).unwrap());
    }

    #[test]
    fn full_deletion_conflicts_with_any_change() {
        let edit = compute_diff(BASE, "alpha beta gamma delta epsilon zeta");
        let wipe = compute_diff(BASE, "");
        assert!(conflict(&edit, &wipe).unwrap());
        assert!(conflict(&wipe, &edit).unwrap());
    }

    #[test]
    fn disjoint_edits_do_not_conflict() {
        let a = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let b = compute_diff(BASE, "alpha beta gamma DELTA epsilon");
        assert!(!conflict(&a, &b).unwrap());
    }

    #[test]
    fn overlapping_replacements_conflict() {
        let a = compute_diff(BASE, "alpha two three delta epsilon");
        let b = compute_diff(BASE, "alpha beta other delta epsilon");
        assert!(conflict(&a, &b).unwrap());
    }

    #[test]
    fn insertions_at_same_point_conflict() {
        let a = compute_diff(BASE, "alpha beta one gamma delta epsilon");
        let b = compute_diff(BASE, "alpha beta two gamma delta epsilon");
        assert!(conflict(&a, &b).unwrap());
    }

    #[test]
    fn adjacent_replacements_do_not_conflict() {
        let a = compute_diff(BASE, "alpha B gamma delta epsilon");
        let b = compute_diff(BASE, "alpha beta G delta epsilon");
        assert!(!conflict(&a, &b).unwrap());
    }

    // -- merge ---------------------------------------------------------------

    #[test]
    fn merge_single_diff_is_edited_projection() {
        let d = compute_diff(BASE, "alpha beta gamma delta omega");
        assert_eq!(merge(std::slice::from_ref(&d)).unwrap(), d.restore(DiffSide::Edited));
    }

    #[test]
    fn merge_disjoint_edits_combines_both() {
        let a = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let b = compute_diff(BASE, "alpha beta gamma DELTA epsilon");
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged, "alpha BETA gamma DELTA epsilon");
    }

    #[test]
    fn merge_insertion_and_replacement() {
        let a = compute_diff(BASE, "alpha beta gamma delta epsilon zeta");
        let b = compute_diff(BASE, "ALPHA beta gamma delta epsilon");
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged, "ALPHA beta gamma delta epsilon zeta");
    }

    #[test]
    fn merge_preserves_original_projection() {
        let a = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let b = compute_diff(BASE, "alpha beta gamma DELTA epsilon");
        let combined = merge_diffs(&[a, b]).unwrap();
        assert_eq!(combined.restore(DiffSide::Original), BASE);
    }

    #[test]
    fn merge_with_noop_reproduces_edit() {
        let a = "Kylo Ren is the master of the Knights of Ren, a Sith, and the son of Leia Organa.";
        let b = "Kylo Ren is the master of the Knights of Ren, a dark side Force user, and the son of Han Solo and Leia Organa.";
        let edit = compute_diff(a, b);
        let noop = compute_diff(a, a);
        let combined = merge_diffs(&[edit, noop]).unwrap();
        assert_eq!(combined.restore(DiffSide::Original), a);
        assert_eq!(combined.restore(DiffSide::Edited), b);
    }

    #[test]
    fn merge_rejects_overlapping_changes() {
        let a = compute_diff(BASE, "alpha two three delta epsilon");
        let b = compute_diff(BASE, "alpha beta other delta epsilon");
        let err = merge(&[a, b]).unwrap_err();
        assert!(matches!(err, DiffError::Merge(_)));
    }

    #[test]
    fn merge_rejects_deletion_across_insertion_point() {
        // First diff inserts between gamma and delta; second deletes that
        // whole middle region, stranding the insertion.
        let a = compute_diff(BASE, "alpha beta gamma extra delta epsilon");
        let b = compute_diff(BASE, "alpha epsilon");
        let err = merge(&[a, b]).unwrap_err();
        assert!(matches!(err, DiffError::Merge(_)));
    }

    #[test]
    fn merge_rejects_mismatched_base() {
        let a = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let b = compute_diff("some other text", "some other words");
        let err = merge(&[a, b]).unwrap_err();
        assert!(matches!(err, DiffError::Precondition(_)));
    }

    #[test]
    fn merge_empty_input_is_invalid() {
        let err = merge(&[]).unwrap_err();
        assert!(matches!(err, DiffError::Validation(_)));
    }

    // -- merge_chained -------------------------------------------------------

    #[test]
    fn chained_merge_applies_sequentially() {
        let step1 = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let step2 = compute_diff("alpha BETA gamma delta epsilon", "alpha BETA gamma delta");
        let merged = merge_chained(&[step1, step2]).unwrap();
        assert_eq!(merged, "alpha BETA gamma delta");
    }

    #[test]
    fn chained_merge_rejects_broken_link() {
        let step1 = compute_diff(BASE, "alpha BETA gamma delta epsilon");
        let step2 = compute_diff("unrelated base", "unrelated edit");
        let err = merge_chained(&[step1, step2]).unwrap_err();
        assert!(matches!(err, DiffError::Precondition(_)));
    }
}
