//! Pending edit, vote, content part, and author identity types.
//!
//! These are the typed records the transient store persists and the engine
//! orchestrates. Decoding and validation happen at the store boundary, so
//! everything here is a closed enum or a validated constructor rather than
//! a loosely typed map.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of an edit rationale.
pub const MAX_RATIONALE_LENGTH: usize = 2_000;

/// Maximum length of a content part's text.
pub const MAX_PART_TEXT_LENGTH: usize = 100_000;

// ---------------------------------------------------------------------------
// Content parts
// ---------------------------------------------------------------------------

/// The six editable facets of a content piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    Name,
    AlternateName,
    Text,
    ContentType,
    Keyword,
    Citation,
}

/// All content part kinds, in canonical order.
pub const ALL_CONTENT_PARTS: &[ContentPart] = &[
    ContentPart::Name,
    ContentPart::AlternateName,
    ContentPart::Text,
    ContentPart::ContentType,
    ContentPart::Keyword,
    ContentPart::Citation,
];

impl ContentPart {
    /// String representation for display, index keys, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::AlternateName => "alternate_name",
            Self::Text => "text",
            Self::ContentType => "content_type",
            Self::Keyword => "keyword",
            Self::Citation => "citation",
        }
    }

    /// Parse a content part kind from its string form.
    pub fn parse(kind: &str) -> Result<Self, CoreError> {
        ALL_CONTENT_PARTS
            .iter()
            .copied()
            .find(|p| p.as_str() == kind)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown content part '{kind}'. Must be one of: {}",
                    ALL_CONTENT_PARTS
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl std::fmt::Display for ContentPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Author identity
// ---------------------------------------------------------------------------

/// Who proposed an edit: a registered user or an anonymous contributor
/// identified by IP address literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AuthorIdentity {
    /// A registered user, by user id.
    Registered(DbId),
    /// An anonymous contributor, by IPv4/IPv6 address literal.
    Anonymous(String),
}

impl AuthorIdentity {
    /// Identity for a registered user.
    pub fn registered(user_id: DbId) -> Self {
        Self::Registered(user_id)
    }

    /// Identity for an anonymous contributor.
    ///
    /// The address must be a syntactically valid IPv4 or IPv6 literal.
    pub fn anonymous(ip: &str) -> Result<Self, CoreError> {
        ip.parse::<IpAddr>().map_err(|_| {
            CoreError::Validation(format!(
                "Anonymous author must be a valid IP address literal, got '{ip}'"
            ))
        })?;
        Ok(Self::Anonymous(ip.to_string()))
    }

    /// Discriminator string for storage columns and index keys.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Registered(_) => "user",
            Self::Anonymous(_) => "ip",
        }
    }

    /// Identity value rendered for storage columns and index keys.
    pub fn value_string(&self) -> String {
        match self {
            Self::Registered(id) => id.to_string(),
            Self::Anonymous(ip) => ip.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// A voter's choice on a pending edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
}

impl VoteChoice {
    /// String representation for display and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::For => "for",
            Self::Against => "against",
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded vote on a pending edit.
///
/// The store enforces at most one vote per (edit, voter) pair; votes are
/// append-only until the edit reaches a terminal verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: DbId,
    pub choice: VoteChoice,
    pub cast_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Pending edits
// ---------------------------------------------------------------------------

/// A proposed, not-yet-finalized change to exactly one content part.
///
/// Lives exclusively in the transient store from proposal until a terminal
/// verdict, at which point it is frozen into an accepted or rejected record
/// in durable storage and removed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    /// Unique, monotonically allocated edit id.
    pub edit_id: DbId,
    /// The content piece the edit targets.
    pub content_id: DbId,
    /// Which facet of the content piece is edited.
    pub content_part: ContentPart,
    /// Id of the edited part row.
    pub part_id: DbId,
    /// Encoded word-level diff from the original part text to the proposal.
    pub diff: String,
    /// Optional free-text rationale supplied by the author.
    pub rationale: Option<String>,
    /// When the edit was proposed (UTC).
    pub created_at: Timestamp,
    /// Who proposed the edit.
    pub author: AuthorIdentity,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an optional edit rationale (<= 2000 chars).
pub fn validate_rationale(rationale: Option<&str>) -> Result<(), CoreError> {
    if let Some(text) = rationale {
        if text.len() > MAX_RATIONALE_LENGTH {
            return Err(CoreError::Validation(format!(
                "Rationale exceeds maximum length of {MAX_RATIONALE_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

/// Validate a content part text (<= 100 000 chars).
pub fn validate_part_text(text: &str) -> Result<(), CoreError> {
    if text.len() > MAX_PART_TEXT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Part text exceeds maximum length of {MAX_PART_TEXT_LENGTH} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ContentPart ---------------------------------------------------------

    #[test]
    fn content_part_round_trips_through_strings() {
        for part in ALL_CONTENT_PARTS {
            assert_eq!(ContentPart::parse(part.as_str()).unwrap(), *part);
        }
    }

    #[test]
    fn content_part_rejects_unknown_kind() {
        let err = ContentPart::parse("image").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn content_part_serde_uses_snake_case() {
        let json = serde_json::to_string(&ContentPart::AlternateName).unwrap();
        assert_eq!(json, "\"alternate_name\"");
    }

    // -- AuthorIdentity ------------------------------------------------------

    #[test]
    fn anonymous_accepts_ipv4_and_ipv6() {
        assert!(AuthorIdentity::anonymous("203.0.113.9").is_ok());
        assert!(AuthorIdentity::anonymous("2001:db8::1").is_ok());
    }

    #[test]
    fn anonymous_rejects_non_ip_strings() {
        assert!(AuthorIdentity::anonymous("").is_err());
        assert!(AuthorIdentity::anonymous("not-an-ip").is_err());
        assert!(AuthorIdentity::anonymous("999.1.2.3").is_err());
    }

    #[test]
    fn identity_kind_and_value_strings() {
        let user = AuthorIdentity::registered(42);
        assert_eq!(user.kind_str(), "user");
        assert_eq!(user.value_string(), "42");

        let anon = AuthorIdentity::anonymous("203.0.113.9").unwrap();
        assert_eq!(anon.kind_str(), "ip");
        assert_eq!(anon.value_string(), "203.0.113.9");
    }

    #[test]
    fn identity_serde_round_trip() {
        let anon = AuthorIdentity::anonymous("203.0.113.9").unwrap();
        let json = serde_json::to_string(&anon).unwrap();
        assert!(json.contains("\"kind\":\"anonymous\""));
        let parsed: AuthorIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, anon);
    }

    // -- PendingEdit serde ---------------------------------------------------

    #[test]
    fn pending_edit_serde_round_trip() {
        let edit = PendingEdit {
            edit_id: 7,
            content_id: 3,
            content_part: ContentPart::Text,
            part_id: 11,
            diff: "= hello\n- old\n+ new".to_string(),
            rationale: Some("fixes a typo".to_string()),
            created_at: chrono::Utc::now(),
            author: AuthorIdentity::registered(42),
        };
        let json = serde_json::to_string(&edit).unwrap();
        let parsed: PendingEdit = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, edit);
    }

    // -- Validation ----------------------------------------------------------

    #[test]
    fn rationale_within_limit_accepted() {
        assert!(validate_rationale(None).is_ok());
        assert!(validate_rationale(Some("short and sweet")).is_ok());
    }

    #[test]
    fn rationale_over_limit_rejected() {
        let long = "x".repeat(MAX_RATIONALE_LENGTH + 1);
        assert!(validate_rationale(Some(&long)).is_err());
    }

    #[test]
    fn part_text_over_limit_rejected() {
        let long = "y".repeat(MAX_PART_TEXT_LENGTH + 1);
        assert!(validate_part_text(&long).is_err());
    }
}
