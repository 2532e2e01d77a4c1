//! The pending-edit store: transient records, votes, and secondary indices.
//!
//! Key layout (logical):
//! - `edit:next-id` — string counter for edit id allocation.
//! - `edit:{id}` — the edit's field record, JSON-encoded.
//! - `edit:{id}:votes` — hash of voter id to vote record.
//! - `edit:{id}:finalizing` — finalize claim marker (see [`PendingEditStore::begin_finalize`]).
//! - `content:{id}:edits`, `part:{kind}:{id}:edits`, `author:{kind}:{value}:edits`,
//!   `voter:{id}:edits` — secondary index sets of edit ids.
//!
//! All multi-key writes go through one atomic batch; id allocation and the
//! finalize claim use the version-guard retry loop.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use lorebase_core::edit::{AuthorIdentity, ContentPart, PendingEdit, Vote, VoteChoice};
use lorebase_core::types::{DbId, Timestamp};

use crate::error::StoreError;
use crate::kv::{KvOp, KvValue, MemoryKv};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Counter key holding the next edit id to hand out.
const EDIT_ID_COUNTER_KEY: &str = "edit:next-id";

/// A finalize claim older than this is considered abandoned (the claimant
/// crashed before the durable write) and may be re-acquired.
const FINALIZE_CLAIM_TTL_SECS: i64 = 300;

fn edit_key(edit_id: DbId) -> String {
    format!("edit:{edit_id}")
}

fn votes_key(edit_id: DbId) -> String {
    format!("edit:{edit_id}:votes")
}

fn claim_key(edit_id: DbId) -> String {
    format!("edit:{edit_id}:finalizing")
}

fn content_index_key(content_id: DbId) -> String {
    format!("content:{content_id}:edits")
}

fn part_index_key(content_part: ContentPart, part_id: DbId) -> String {
    format!("part:{}:{part_id}:edits", content_part.as_str())
}

fn author_index_key(author: &AuthorIdentity) -> String {
    format!(
        "author:{}:{}:edits",
        author.kind_str(),
        author.value_string()
    )
}

fn voter_index_key(voter_id: DbId) -> String {
    format!("voter:{voter_id}:edits")
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Input for storing a new pending edit; the store allocates the id and
/// stamps the creation time.
#[derive(Debug, Clone)]
pub struct NewEdit {
    pub content_id: DbId,
    pub content_part: ContentPart,
    pub part_id: DbId,
    pub diff: String,
    pub rationale: Option<String>,
    pub author: AuthorIdentity,
}

/// Snapshot of everything the tally needs for one edit.
#[derive(Debug, Clone)]
pub struct ValidationData {
    pub edit: PendingEdit,
    pub votes: Vec<Vote>,
}

/// Hash-field encoding of a vote; the voter id is the field key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredVote {
    choice: VoteChoice,
    cast_at: Timestamp,
}

// ---------------------------------------------------------------------------
// PendingEditStore
// ---------------------------------------------------------------------------

/// Transient store owning every pending edit and its votes for the
/// validation window.
#[derive(Debug, Default)]
pub struct PendingEditStore {
    kv: MemoryKv,
}

impl PendingEditStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Id allocation -------------------------------------------------------

    /// Atomically allocate the next edit id.
    ///
    /// Optimistic retry loop: read the counter with its version, write the
    /// incremented value guarded on that version, retry on a concurrent
    /// bump. Contention windows are microseconds, so unbounded retries are
    /// fine; no lock is held between read and write.
    pub async fn allocate_edit_id(&self) -> Result<DbId, StoreError> {
        loop {
            let (value, version) = self.kv.get_versioned(EDIT_ID_COUNTER_KEY).await;
            let next: DbId = match &value {
                None => 1,
                Some(KvValue::Str(s)) => s.parse().map_err(|_| {
                    StoreError::Decode(format!("Edit id counter holds non-numeric value '{s}'"))
                })?,
                Some(other) => {
                    return Err(StoreError::Decode(format!(
                        "Edit id counter holds a {} value",
                        other.type_name()
                    )))
                }
            };
            let applied = self
                .kv
                .apply(
                    vec![KvOp::PutStr {
                        key: EDIT_ID_COUNTER_KEY.to_string(),
                        value: (next + 1).to_string(),
                    }],
                    &[(EDIT_ID_COUNTER_KEY.to_string(), version)],
                )
                .await?;
            if applied {
                return Ok(next);
            }
        }
    }

    // -- Edits ---------------------------------------------------------------

    /// Allocate an id and persist a new pending edit with all of its
    /// secondary index entries in one atomic batch.
    pub async fn store_edit(&self, new: NewEdit, now: Timestamp) -> Result<PendingEdit, StoreError> {
        let edit_id = self.allocate_edit_id().await?;
        let edit = PendingEdit {
            edit_id,
            content_id: new.content_id,
            content_part: new.content_part,
            part_id: new.part_id,
            diff: new.diff,
            rationale: new.rationale,
            created_at: now,
            author: new.author,
        };

        let record =
            serde_json::to_string(&edit).map_err(|e| StoreError::Encode(e.to_string()))?;
        let member = edit_id.to_string();

        self.kv
            .apply(
                vec![
                    KvOp::PutStr {
                        key: edit_key(edit_id),
                        value: record,
                    },
                    KvOp::SetAdd {
                        key: content_index_key(edit.content_id),
                        member: member.clone(),
                    },
                    KvOp::SetAdd {
                        key: part_index_key(edit.content_part, edit.part_id),
                        member: member.clone(),
                    },
                    KvOp::SetAdd {
                        key: author_index_key(&edit.author),
                        member,
                    },
                ],
                &[],
            )
            .await?;

        Ok(edit)
    }

    /// Fetch a pending edit by id.
    pub async fn get_edit(&self, edit_id: DbId) -> Result<PendingEdit, StoreError> {
        match self.kv.get(&edit_key(edit_id)).await {
            None => Err(StoreError::MissingEdit(edit_id)),
            Some(KvValue::Str(record)) => serde_json::from_str(&record).map_err(|e| {
                StoreError::Decode(format!("Edit {edit_id} record is corrupted: {e}"))
            }),
            Some(other) => Err(StoreError::Decode(format!(
                "Edit {edit_id} key holds a {} value",
                other.type_name()
            ))),
        }
    }

    // -- Votes ---------------------------------------------------------------

    /// Record a vote.
    ///
    /// Fails with [`StoreError::MissingEdit`] when the edit is no longer
    /// pending (expected race with finalization) and
    /// [`StoreError::DuplicateVote`] when the voter already voted. The
    /// atomic set-if-not-exists on the per-edit vote hash is the sole
    /// duplicate check; the voter index written afterwards is advisory only.
    pub async fn store_vote(
        &self,
        edit_id: DbId,
        voter_id: DbId,
        choice: VoteChoice,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        // Existence check first so votes on finalized edits fail fast. A
        // finalize racing in after this check leaves an orphaned vote hash,
        // which the idempotent cleanup tolerates.
        self.get_edit(edit_id).await?;

        let record = serde_json::to_string(&StoredVote {
            choice,
            cast_at: now,
        })
        .map_err(|e| StoreError::Encode(e.to_string()))?;

        let newly_set = self
            .kv
            .hash_set_nx(&votes_key(edit_id), &voter_id.to_string(), &record)
            .await?;
        if !newly_set {
            return Err(StoreError::DuplicateVote { edit_id, voter_id });
        }

        self.kv
            .apply(
                vec![KvOp::SetAdd {
                    key: voter_index_key(voter_id),
                    member: edit_id.to_string(),
                }],
                &[],
            )
            .await?;

        Ok(())
    }

    /// Fetch all recorded votes for an edit, ordered by cast time.
    ///
    /// An edit with no votes yet returns an empty list; this does not check
    /// whether the edit itself exists.
    pub async fn get_votes(&self, edit_id: DbId) -> Result<Vec<Vote>, StoreError> {
        let hash = match self.kv.get(&votes_key(edit_id)).await {
            None => return Ok(Vec::new()),
            Some(KvValue::Hash(hash)) => hash,
            Some(other) => {
                return Err(StoreError::Decode(format!(
                    "Vote hash for edit {edit_id} holds a {} value",
                    other.type_name()
                )))
            }
        };

        let mut votes = Vec::with_capacity(hash.len());
        for (field, record) in hash {
            let voter_id: DbId = field.parse().map_err(|_| {
                StoreError::Decode(format!(
                    "Vote hash for edit {edit_id} has non-numeric voter id '{field}'"
                ))
            })?;
            let stored: StoredVote = serde_json::from_str(&record).map_err(|e| {
                StoreError::Decode(format!(
                    "Vote record for edit {edit_id} voter {voter_id} is corrupted: {e}"
                ))
            })?;
            votes.push(Vote {
                voter_id,
                choice: stored.choice,
                cast_at: stored.cast_at,
            });
        }
        votes.sort_by_key(|v| (v.cast_at, v.voter_id));
        Ok(votes)
    }

    /// Fetch the edit together with its current vote set.
    pub async fn get_validation_data(&self, edit_id: DbId) -> Result<ValidationData, StoreError> {
        let edit = self.get_edit(edit_id).await?;
        let votes = self.get_votes(edit_id).await?;
        Ok(ValidationData { edit, votes })
    }

    // -- Index lookups -------------------------------------------------------

    /// All pending edits for a content piece.
    pub async fn edits_for_content(&self, content_id: DbId) -> Result<Vec<PendingEdit>, StoreError> {
        self.edits_for_index(&content_index_key(content_id)).await
    }

    /// All pending edits targeting one content part.
    pub async fn edits_for_part(
        &self,
        content_part: ContentPart,
        part_id: DbId,
    ) -> Result<Vec<PendingEdit>, StoreError> {
        self.edits_for_index(&part_index_key(content_part, part_id))
            .await
    }

    /// All pending edits proposed by one author.
    pub async fn edits_for_author(
        &self,
        author: &AuthorIdentity,
    ) -> Result<Vec<PendingEdit>, StoreError> {
        self.edits_for_index(&author_index_key(author)).await
    }

    /// All pending edits a voter has voted on (advisory index).
    pub async fn edits_for_voter(&self, voter_id: DbId) -> Result<Vec<PendingEdit>, StoreError> {
        self.edits_for_index(&voter_index_key(voter_id)).await
    }

    async fn edits_for_index(&self, index_key: &str) -> Result<Vec<PendingEdit>, StoreError> {
        let members = match self.kv.get(index_key).await {
            None => return Ok(Vec::new()),
            Some(KvValue::Set(members)) => members,
            Some(other) => {
                return Err(StoreError::Decode(format!(
                    "Index '{index_key}' holds a {} value",
                    other.type_name()
                )))
            }
        };

        let mut edits = Vec::with_capacity(members.len());
        for member in members {
            let edit_id: DbId = member.parse().map_err(|_| {
                StoreError::Decode(format!(
                    "Index '{index_key}' has non-numeric edit id '{member}'"
                ))
            })?;
            match self.get_edit(edit_id).await {
                Ok(edit) => edits.push(edit),
                // The advisory voter index may outlive the edit record.
                Err(StoreError::MissingEdit(_)) => {
                    tracing::debug!(edit_id, index_key, "Index entry for finalized edit skipped");
                }
                Err(e) => return Err(e),
            }
        }
        edits.sort_by_key(|e| e.edit_id);
        Ok(edits)
    }

    // -- Finalization --------------------------------------------------------

    /// Claim the right to finalize an edit.
    ///
    /// Concurrent terminal tallies race on this claim with the same
    /// version-guard discipline as id allocation; exactly one caller gets
    /// `true` and performs the durable write. A claim left behind by a
    /// crashed claimant expires after [`FINALIZE_CLAIM_TTL_SECS`] and can be
    /// re-acquired, so an edit is never stuck pending.
    pub async fn begin_finalize(&self, edit_id: DbId, now: Timestamp) -> Result<bool, StoreError> {
        let key = claim_key(edit_id);
        let (value, version) = self.kv.get_versioned(&key).await;

        if let Some(value) = value {
            let KvValue::Str(stamp) = value else {
                return Err(StoreError::Decode(format!(
                    "Finalize claim for edit {edit_id} holds a {} value",
                    value.type_name()
                )));
            };
            let claimed_at = chrono::DateTime::parse_from_rfc3339(&stamp).map_err(|e| {
                StoreError::Decode(format!(
                    "Finalize claim for edit {edit_id} has invalid timestamp: {e}"
                ))
            })?;
            if now.signed_duration_since(claimed_at) < Duration::seconds(FINALIZE_CLAIM_TTL_SECS) {
                return Ok(false);
            }
        }

        let applied = self
            .kv
            .apply(
                vec![KvOp::PutStr {
                    key: key.clone(),
                    value: now.to_rfc3339(),
                }],
                &[(key, version)],
            )
            .await?;
        Ok(applied)
    }

    /// Remove everything the validation window holds for an edit: the field
    /// record, the vote hash, the finalize claim, and every secondary index
    /// entry, in one atomic batch.
    ///
    /// Idempotent: deleting an already-deleted edit is a no-op, because
    /// scheduled tally tasks may race with this cleanup.
    pub async fn delete_validation_data(
        &self,
        edit_id: DbId,
        content_id: DbId,
        content_part: ContentPart,
        part_id: DbId,
        author: &AuthorIdentity,
        voter_ids: &[DbId],
    ) -> Result<(), StoreError> {
        let member = edit_id.to_string();
        let mut ops = vec![
            KvOp::Delete {
                key: edit_key(edit_id),
            },
            KvOp::Delete {
                key: votes_key(edit_id),
            },
            KvOp::Delete {
                key: claim_key(edit_id),
            },
            KvOp::SetRemove {
                key: content_index_key(content_id),
                member: member.clone(),
            },
            KvOp::SetRemove {
                key: part_index_key(content_part, part_id),
                member: member.clone(),
            },
            KvOp::SetRemove {
                key: author_index_key(author),
                member: member.clone(),
            },
        ];
        for voter_id in voter_ids {
            ops.push(KvOp::SetRemove {
                key: voter_index_key(*voter_id),
                member: member.clone(),
            });
        }

        self.kv.apply(ops, &[]).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_edit(content_id: DbId, part_id: DbId) -> NewEdit {
        NewEdit {
            content_id,
            content_part: ContentPart::Text,
            part_id,
            diff: "= hello\n- old\n+ new".to_string(),
            rationale: Some("clarity".to_string()),
            author: AuthorIdentity::registered(42),
        }
    }

    // -- Id allocation -------------------------------------------------------

    #[tokio::test]
    async fn edit_ids_are_monotonic() {
        let store = PendingEditStore::new();
        let first = store.allocate_edit_id().await.unwrap();
        let second = store.allocate_edit_id().await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn concurrent_allocation_yields_distinct_ids() {
        use std::sync::Arc;

        let store = Arc::new(PendingEditStore::new());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.allocate_edit_id().await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    // -- Edits ---------------------------------------------------------------

    #[tokio::test]
    async fn store_and_get_edit_round_trip() {
        let store = PendingEditStore::new();
        let stored = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();
        let fetched = store.get_edit(stored.edit_id).await.unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn get_missing_edit_fails() {
        let store = PendingEditStore::new();
        let err = store.get_edit(99).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingEdit(99)));
    }

    #[tokio::test]
    async fn index_lookups_find_stored_edit() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        let by_content = store.edits_for_content(3).await.unwrap();
        assert_eq!(by_content, vec![edit.clone()]);

        let by_part = store.edits_for_part(ContentPart::Text, 7).await.unwrap();
        assert_eq!(by_part, vec![edit.clone()]);

        let by_author = store
            .edits_for_author(&AuthorIdentity::registered(42))
            .await
            .unwrap();
        assert_eq!(by_author, vec![edit]);
    }

    #[tokio::test]
    async fn index_lookup_for_other_keys_is_empty() {
        let store = PendingEditStore::new();
        store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        assert!(store.edits_for_content(4).await.unwrap().is_empty());
        assert!(store
            .edits_for_part(ContentPart::Name, 7)
            .await
            .unwrap()
            .is_empty());
    }

    // -- Votes ---------------------------------------------------------------

    #[tokio::test]
    async fn vote_round_trip() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        store
            .store_vote(edit.edit_id, 10, VoteChoice::For, Utc::now())
            .await
            .unwrap();
        store
            .store_vote(edit.edit_id, 11, VoteChoice::Against, Utc::now())
            .await
            .unwrap();

        let votes = store.get_votes(edit.edit_id).await.unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].voter_id, 10);
        assert_eq!(votes[0].choice, VoteChoice::For);
        assert_eq!(votes[1].voter_id, 11);
        assert_eq!(votes[1].choice, VoteChoice::Against);
    }

    #[tokio::test]
    async fn duplicate_vote_is_rejected() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        store
            .store_vote(edit.edit_id, 10, VoteChoice::For, Utc::now())
            .await
            .unwrap();
        let err = store
            .store_vote(edit.edit_id, 10, VoteChoice::Against, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateVote {
                edit_id: _,
                voter_id: 10
            }
        ));

        // The first vote is untouched.
        let votes = store.get_votes(edit.edit_id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].choice, VoteChoice::For);
    }

    #[tokio::test]
    async fn vote_on_missing_edit_is_rejected() {
        let store = PendingEditStore::new();
        let err = store
            .store_vote(99, 10, VoteChoice::For, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingEdit(99)));
    }

    // -- Deletion ------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_record_votes_and_indices() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();
        store
            .store_vote(edit.edit_id, 10, VoteChoice::For, Utc::now())
            .await
            .unwrap();

        store
            .delete_validation_data(
                edit.edit_id,
                edit.content_id,
                edit.content_part,
                edit.part_id,
                &edit.author,
                &[10],
            )
            .await
            .unwrap();

        assert!(matches!(
            store.get_edit(edit.edit_id).await,
            Err(StoreError::MissingEdit(_))
        ));
        assert!(store.get_votes(edit.edit_id).await.unwrap().is_empty());
        assert!(store.edits_for_content(3).await.unwrap().is_empty());
        assert!(store
            .edits_for_part(ContentPart::Text, 7)
            .await
            .unwrap()
            .is_empty());
        assert!(store.edits_for_voter(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_twice_is_a_noop() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        for _ in 0..2 {
            store
                .delete_validation_data(
                    edit.edit_id,
                    edit.content_id,
                    edit.content_part,
                    edit.part_id,
                    &edit.author,
                    &[],
                )
                .await
                .unwrap();
        }
    }

    // -- Finalize claim ------------------------------------------------------

    #[tokio::test]
    async fn only_one_finalize_claim_succeeds() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        let now = Utc::now();
        assert!(store.begin_finalize(edit.edit_id, now).await.unwrap());
        assert!(!store.begin_finalize(edit.edit_id, now).await.unwrap());
    }

    #[tokio::test]
    async fn stale_finalize_claim_can_be_reacquired() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        let then = Utc::now();
        assert!(store.begin_finalize(edit.edit_id, then).await.unwrap());

        let later = then + Duration::seconds(FINALIZE_CLAIM_TTL_SECS + 1);
        assert!(store.begin_finalize(edit.edit_id, later).await.unwrap());
    }

    #[tokio::test]
    async fn finalize_claim_is_cleared_by_delete() {
        let store = PendingEditStore::new();
        let edit = store.store_edit(new_edit(3, 7), Utc::now()).await.unwrap();

        let now = Utc::now();
        assert!(store.begin_finalize(edit.edit_id, now).await.unwrap());
        store
            .delete_validation_data(
                edit.edit_id,
                edit.content_id,
                edit.content_part,
                edit.part_id,
                &edit.author,
                &[],
            )
            .await
            .unwrap();

        // A fresh claim succeeds because the old marker is gone.
        assert!(store.begin_finalize(edit.edit_id, now).await.unwrap());
    }
}
