//! The edit lifecycle coordinator.
//!
//! State machine per edit: `pending -> {accepted | rejected}`, terminal.
//! An edit never returns to pending, and finalization is exactly-once: the
//! transient store's finalize claim serializes racing terminal tallies, and
//! the durable insert's per-edit-id idempotence backs that up.

use std::sync::{Arc, Weak};

use chrono::{Duration, Utc};

use lorebase_core::diff::{compute_diff, Diff, DiffSide};
use lorebase_core::edit::{
    validate_part_text, validate_rationale, AuthorIdentity, ContentPart, PendingEdit, Vote,
    VoteChoice,
};
use lorebase_core::error::CoreError;
use lorebase_core::merge::{conflict, merge};
use lorebase_core::tally::{tally, Verdict};
use lorebase_core::types::DbId;
use lorebase_db::models::finalized_edit::CreateFinalizedEdit;
use lorebase_store::{NewEdit, PendingEditStore, StoreError};

use crate::error::{EngineError, EngineResult};
use crate::notify::{EditNotification, EditNotifier, NotificationKind};
use crate::scheduler::Scheduler;
use crate::storage::DurableEditStore;

// ---------------------------------------------------------------------------
// Schedule offsets
// ---------------------------------------------------------------------------

/// Days after creation at which deferred tallies run. Votes trigger a tally
/// synchronously, so these are the backstop for edits that stop receiving
/// votes; the day-10 run pairs with the tally policy's hard deadline.
const TALLY_OFFSETS_DAYS: [i64; 2] = [5, 10];

/// Reminder notifications: (days after creation, days of voting remaining).
const REMINDER_OFFSETS_DAYS: [(i64, i64); 2] = [(4, 6), (8, 2)];

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Orchestrates pending edits from proposal to a terminal verdict.
///
/// Shared as `Arc<Self>` so scheduled task bodies can hold a handle back to
/// it. All mutation goes through the transient store's atomic primitives;
/// concurrent invocations for the same edit are safe by construction.
pub struct EditLifecycleCoordinator<D, N> {
    store: Arc<PendingEditStore>,
    durable: D,
    notifier: N,
    scheduler: Arc<dyn Scheduler>,
    /// Handle scheduled task bodies use to call back into the coordinator.
    /// Weak, so dropping the last external `Arc` stops future task bodies
    /// without a reference cycle through the scheduler.
    self_handle: Weak<Self>,
}

impl<D, N> EditLifecycleCoordinator<D, N>
where
    D: DurableEditStore + 'static,
    N: EditNotifier + 'static,
{
    pub fn new(
        store: Arc<PendingEditStore>,
        durable: D,
        notifier: N,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_handle| Self {
            store,
            durable,
            notifier,
            scheduler,
            self_handle: self_handle.clone(),
        })
    }

    /// The transient store backing this coordinator.
    pub fn store(&self) -> &PendingEditStore {
        &self.store
    }

    // -- Proposal ------------------------------------------------------------

    /// Propose an edit to one content part.
    ///
    /// Validates the inputs, computes the word-level diff from
    /// `original_text` to `edit_text`, persists the pending edit, schedules
    /// the deferred tallies and reminders, and sends the proposal
    /// notification.
    #[allow(clippy::too_many_arguments)]
    pub async fn propose(
        &self,
        content_id: DbId,
        content_part: ContentPart,
        part_id: DbId,
        original_text: &str,
        edit_text: &str,
        rationale: Option<String>,
        author: AuthorIdentity,
    ) -> EngineResult<PendingEdit> {
        validate_part_text(original_text)?;
        validate_part_text(edit_text)?;
        validate_rationale(rationale.as_deref())?;

        let diff = compute_diff(original_text, edit_text);
        let now = Utc::now();
        let edit = self
            .store
            .store_edit(
                NewEdit {
                    content_id,
                    content_part,
                    part_id,
                    diff: diff.encode(),
                    rationale,
                    author,
                },
                now,
            )
            .await?;

        tracing::info!(
            edit_id = edit.edit_id,
            content_id,
            content_part = %content_part,
            part_id,
            "Edit proposed"
        );

        for offset_days in TALLY_OFFSETS_DAYS {
            let handle = self.self_handle.clone();
            let edit_id = edit.edit_id;
            self.scheduler.submit(
                now + Duration::days(offset_days),
                Box::pin(async move {
                    let Some(this) = handle.upgrade() else {
                        tracing::debug!(edit_id, "Coordinator gone; scheduled tally skipped");
                        return;
                    };
                    if let Err(e) = this.run_scheduled_tally(edit_id).await {
                        tracing::error!(edit_id, error = %e, "Scheduled tally failed");
                    }
                }),
            );
        }

        for (offset_days, days_remaining) in REMINDER_OFFSETS_DAYS {
            let handle = self.self_handle.clone();
            let edit_id = edit.edit_id;
            self.scheduler.submit(
                now + Duration::days(offset_days),
                Box::pin(async move {
                    let Some(this) = handle.upgrade() else {
                        tracing::debug!(edit_id, "Coordinator gone; scheduled reminder skipped");
                        return;
                    };
                    if let Err(e) = this.run_reminder(edit_id, days_remaining).await {
                        tracing::error!(edit_id, error = %e, "Scheduled reminder failed");
                    }
                }),
            );
        }

        self.send_notification(NotificationKind::Proposed, &edit, None, None)
            .await;

        Ok(edit)
    }

    // -- Voting --------------------------------------------------------------

    /// Record a vote and immediately re-tally.
    ///
    /// Duplicate votes and votes on already-finalized edits surface to the
    /// caller. The returned verdict is computed from freshly read state; a
    /// terminal verdict has already been finalized when this returns.
    pub async fn cast_vote(
        &self,
        edit_id: DbId,
        voter_id: DbId,
        choice: VoteChoice,
    ) -> EngineResult<Verdict> {
        self.store
            .store_vote(edit_id, voter_id, choice, Utc::now())
            .await?;
        tracing::debug!(edit_id, voter_id, choice = %choice, "Vote recorded");
        self.evaluate(edit_id).await
    }

    // -- Scheduled task bodies -----------------------------------------------

    /// Deferred tally body. Safe to re-run: if the edit is no longer
    /// pending, the tally was already decided elsewhere and this is a no-op.
    pub async fn run_scheduled_tally(&self, edit_id: DbId) -> EngineResult<Verdict> {
        self.evaluate(edit_id).await
    }

    /// Deferred reminder body. Safe to re-run; a finalized edit sends
    /// nothing.
    pub async fn run_reminder(&self, edit_id: DbId, days_remaining: i64) -> EngineResult<()> {
        match self.store.get_edit(edit_id).await {
            Ok(edit) => {
                self.send_notification(
                    NotificationKind::Reminder,
                    &edit,
                    Some(days_remaining),
                    None,
                )
                .await;
                Ok(())
            }
            Err(StoreError::MissingEdit(_)) => {
                tracing::debug!(edit_id, "Reminder skipped; edit already finalized");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // -- Queries -------------------------------------------------------------

    /// All pending edits for a content piece.
    pub async fn pending_for_content(&self, content_id: DbId) -> EngineResult<Vec<PendingEdit>> {
        Ok(self.store.edits_for_content(content_id).await?)
    }

    /// All pending edits proposed by one author.
    pub async fn pending_for_author(
        &self,
        author: &AuthorIdentity,
    ) -> EngineResult<Vec<PendingEdit>> {
        Ok(self.store.edits_for_author(author).await?)
    }

    /// All pending edits targeting one content part.
    pub async fn pending_for_part(
        &self,
        content_part: ContentPart,
        part_id: DbId,
    ) -> EngineResult<Vec<PendingEdit>> {
        Ok(self.store.edits_for_part(content_part, part_id).await?)
    }

    /// Whether an edit conflicts with any other pending edit of the same
    /// content part.
    ///
    /// Sibling edits against a different base revision count as conflicting:
    /// they cannot be auto-merged either.
    pub async fn get_conflict(&self, edit_id: DbId) -> EngineResult<bool> {
        let edit = self.store.get_edit(edit_id).await?;
        let diff = Diff::decode(&edit.diff)?;
        let original = diff.restore(DiffSide::Original);

        let siblings = self
            .store
            .edits_for_part(edit.content_part, edit.part_id)
            .await?;
        for other in siblings.iter().filter(|e| e.edit_id != edit_id) {
            let other_diff = Diff::decode(&other.diff)?;
            if other_diff.restore(DiffSide::Original) != original {
                return Ok(true);
            }
            if conflict(&diff, &other_diff)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -- Tally and finalization ----------------------------------------------

    /// Re-read the edit's state, tally it, and finalize on a terminal
    /// verdict.
    ///
    /// A missing edit means a concurrent tally already finalized it; that
    /// race is expected and reported as `Continue` rather than an error.
    async fn evaluate(&self, edit_id: DbId) -> EngineResult<Verdict> {
        let data = match self.store.get_validation_data(edit_id).await {
            Ok(data) => data,
            Err(StoreError::MissingEdit(_)) => {
                tracing::debug!(edit_id, "Tally skipped; edit already finalized");
                return Ok(Verdict::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        let author_count = self.durable.author_count(data.edit.content_id).await?;
        let verdict = tally(data.edit.created_at, &data.votes, author_count, Utc::now());
        tracing::debug!(
            edit_id,
            author_count,
            vote_count = data.votes.len(),
            verdict = %verdict,
            "Edit tallied"
        );

        if verdict.is_terminal() {
            self.finalize(&data.edit, &data.votes, verdict).await?;
        }
        Ok(verdict)
    }

    /// Move an edit from pending into durable storage.
    ///
    /// Order matters: claim, durable write, transient delete, notification.
    /// The durable write is the authoritative commit point. A crash after
    /// it leaves an orphaned pending copy that a later tally (or the claim
    /// TTL) cleans up, never a lost or double-applied edit.
    async fn finalize(
        &self,
        edit: &PendingEdit,
        votes: &[Vote],
        verdict: Verdict,
    ) -> EngineResult<()> {
        if !verdict.is_terminal() {
            return Err(EngineError::Core(CoreError::Internal(
                "finalize called with a non-terminal verdict".to_string(),
            )));
        }

        let now = Utc::now();
        if !self.store.begin_finalize(edit.edit_id, now).await? {
            tracing::debug!(
                edit_id = edit.edit_id,
                "Finalize already claimed by a concurrent tally"
            );
            return Ok(());
        }

        let diff = Diff::decode(&edit.diff)?;
        let applied_text = match verdict {
            Verdict::Accept => Some(self.applied_text(edit, &diff).await?),
            _ => None,
        };

        let for_count = votes
            .iter()
            .filter(|v| v.choice == VoteChoice::For)
            .count();
        let vote_result = format!("{for_count} for, {} against", votes.len() - for_count);

        let record = CreateFinalizedEdit {
            edit_id: edit.edit_id,
            content_id: edit.content_id,
            content_part: edit.content_part.as_str().to_string(),
            part_id: edit.part_id,
            diff: edit.diff.clone(),
            applied_text,
            rationale: edit.rationale.clone(),
            author_kind: edit.author.kind_str().to_string(),
            author_value: edit.author.value_string(),
            votes: votes.to_vec(),
            voter_ids: votes.iter().map(|v| v.voter_id).collect(),
            proposed_at: edit.created_at,
            decided_at: now,
        };

        match verdict {
            Verdict::Accept => self.durable.store_accepted_edit(&record).await?,
            _ => self.durable.store_rejected_edit(&record).await?,
        }

        self.store
            .delete_validation_data(
                edit.edit_id,
                edit.content_id,
                edit.content_part,
                edit.part_id,
                &edit.author,
                &record.voter_ids,
            )
            .await?;

        tracing::info!(
            edit_id = edit.edit_id,
            content_id = edit.content_id,
            verdict = %verdict,
            "Edit finalized"
        );

        let kind = if verdict == Verdict::Accept {
            NotificationKind::Accepted
        } else {
            NotificationKind::Rejected
        };
        self.send_notification(kind, edit, None, Some(vote_result))
            .await;

        Ok(())
    }

    /// The part text an accepted edit produces.
    ///
    /// Edits accepted earlier against the same original are merged in,
    /// ascending by decision time, so concurrent non-conflicting edits
    /// compose. A merge failure falls back to this edit's own projection;
    /// callers were expected to consult [`get_conflict`](Self::get_conflict)
    /// beforehand, so this is the documented best-effort path, and the
    /// failure is logged rather than silently absorbed.
    async fn applied_text(&self, edit: &PendingEdit, diff: &Diff) -> EngineResult<String> {
        let original = diff.restore(DiffSide::Original);
        let prior = self
            .durable
            .accepted_diffs_for_part(edit.content_id, edit.content_part, edit.part_id)
            .await?;

        let mut diffs = Vec::with_capacity(prior.len() + 1);
        for encoded in &prior {
            match Diff::decode(encoded) {
                Ok(d) if d.restore(DiffSide::Original) == original => diffs.push(d),
                // An accepted edit against another base revision is not part
                // of this validation window's merge set.
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        edit_id = edit.edit_id,
                        error = %e,
                        "Stored accepted diff is corrupted; excluded from merge"
                    );
                }
            }
        }
        diffs.push(diff.clone());

        match merge(&diffs) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(
                    edit_id = edit.edit_id,
                    error = %e,
                    "Merge with previously accepted edits failed; applying this edit alone"
                );
                Ok(diff.restore(DiffSide::Edited))
            }
        }
    }

    // -- Notifications -------------------------------------------------------

    /// Build and send a notification. Lookup or delivery problems are
    /// logged; they never fail the calling operation.
    async fn send_notification(
        &self,
        kind: NotificationKind,
        edit: &PendingEdit,
        days_remaining: Option<i64>,
        vote_result: Option<String>,
    ) {
        let content_name = match self.durable.content_name(edit.content_id).await {
            Ok(Some(name)) => name,
            Ok(None) => format!("content {}", edit.content_id),
            Err(e) => {
                tracing::error!(
                    content_id = edit.content_id,
                    error = %e,
                    "Content name lookup failed for notification"
                );
                format!("content {}", edit.content_id)
            }
        };

        let recipients = match self.durable.author_emails(edit.content_id).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(
                    content_id = edit.content_id,
                    error = %e,
                    "Recipient lookup failed for notification"
                );
                Vec::new()
            }
        };

        let edit_text = match Diff::decode(&edit.diff) {
            Ok(diff) => diff.restore(DiffSide::Edited),
            Err(e) => {
                tracing::error!(
                    edit_id = edit.edit_id,
                    error = %e,
                    "Stored diff could not be decoded for notification"
                );
                String::new()
            }
        };

        self.notifier
            .notify(EditNotification {
                kind,
                content_id: edit.content_id,
                edit_id: edit.edit_id,
                recipients,
                content_name,
                edit_text,
                days_remaining,
                vote_result,
            })
            .await;
    }
}
