//! Core domain types for recobra
//!
//! These types represent the canonical data model for the sales-recovery
//! conversation pipeline.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Agent** | The automated outreach bot that drives the conversation |
//! | **Customer** | The prospective borrower on the other end (the counterparty) |
//! | **Transcript** | Ordered message history between Agent and Customer for one lead |
//! | **Handoff** | The point where the Agent offers to move the lead to a human-driven process |
//! | **Digest** | Deterministic content hash of a transcript, used as cache key |
//!
//! Transcripts are read-only inputs sourced externally (chat exports, database
//! rows). [`ClassificationResult`] and [`CacheEntry`] are derived artifacts and
//! are regenerated whenever the owning transcript's digest changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Messages
// ============================================

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// The automated outreach agent
    Agent,
    /// The prospective customer
    Customer,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Agent => "agent",
            SenderRole::Customer => "customer",
        }
    }
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SenderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(SenderRole::Agent),
            "customer" => Ok(SenderRole::Customer),
            _ => Err(format!("unknown sender role: {}", s)),
        }
    }
}

/// A single message in a conversation. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub sender: SenderRole,
    /// Text content. `None` when the source record was malformed; matching
    /// treats it as an empty string and never fails.
    pub text: Option<String>,
    /// When the message was sent
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: SenderRole, text: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: Some(text.into()),
            sent_at,
        }
    }

    /// Text content for matching purposes. Malformed/missing text is empty.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Ordered message history between the agent and a customer.
///
/// Ordering is chronological and authoritative: pattern matching always scans
/// in document order unless a component contract states otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }
}

// ============================================
// Pattern tags
// ============================================

/// Semantic tags the pattern library groups its patterns under.
///
/// Tags are evaluated independently per message; a single message may satisfy
/// several tags at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    /// Agent invites the customer to continue with a human-driven process
    HandoffInvitation,
    /// Customer accepts the invitation
    HandoffAcceptance,
    /// Customer declines the invitation
    HandoffDecline,
    /// Agent confirms the handoff went through
    HandoffCompletion,
    /// Agent transferred the conversation to a human
    HumanTransfer,
    /// Agent sent a canned template message
    TemplateSent,
    /// Agent asked for document/eligibility pre-validation
    PreValidation,
}

impl PatternTag {
    /// All tags, in evaluation order
    pub const ALL: [PatternTag; 7] = [
        PatternTag::HandoffInvitation,
        PatternTag::HandoffAcceptance,
        PatternTag::HandoffDecline,
        PatternTag::HandoffCompletion,
        PatternTag::HumanTransfer,
        PatternTag::TemplateSent,
        PatternTag::PreValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTag::HandoffInvitation => "handoff_invitation",
            PatternTag::HandoffAcceptance => "handoff_acceptance",
            PatternTag::HandoffDecline => "handoff_decline",
            PatternTag::HandoffCompletion => "handoff_completion",
            PatternTag::HumanTransfer => "human_transfer",
            PatternTag::TemplateSent => "template_sent",
            PatternTag::PreValidation => "pre_validation",
        }
    }
}

impl std::fmt::Display for PatternTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Classification output
// ============================================

/// Where the handoff conversation stands.
///
/// State transition model:
/// `NotOffered → Offered → {Accepted, Declined} → Completed`, with
/// `Offered → UnclearResponse` when the next customer message matches neither
/// acceptance nor decline. `Declined` and `Completed` are terminal; `Accepted`
/// may still advance to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffState {
    /// No invitation found in the transcript
    NotOffered,
    /// Invitation sent, no customer response yet
    Offered,
    /// Customer accepted; handoff not yet confirmed
    Accepted,
    /// Customer declined
    Declined,
    /// Agent confirmed the handoff went through
    Completed,
    /// Customer replied but matched neither acceptance nor decline
    UnclearResponse,
}

impl HandoffState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffState::NotOffered => "not_offered",
            HandoffState::Offered => "offered",
            HandoffState::Accepted => "accepted",
            HandoffState::Declined => "declined",
            HandoffState::Completed => "completed",
            HandoffState::UnclearResponse => "unclear_response",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandoffState::Declined | HandoffState::Completed)
    }
}

impl std::fmt::Display for HandoffState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HandoffState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_offered" => Ok(HandoffState::NotOffered),
            "offered" => Ok(HandoffState::Offered),
            "accepted" => Ok(HandoffState::Accepted),
            "declined" => Ok(HandoffState::Declined),
            "completed" => Ok(HandoffState::Completed),
            "unclear_response" => Ok(HandoffState::UnclearResponse),
            _ => Err(format!("unknown handoff state: {}", s)),
        }
    }
}

/// Supporting evidence for a detection: which message matched, and what text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Tag that matched
    pub tag: PatternTag,
    /// Index of the matching message within the transcript
    pub message_index: usize,
    /// The matched portion of the (folded) message text
    pub matched_text: String,
}

/// Derived status flags for one transcript. Never hand-edited; regenerated
/// whenever the owning transcript's digest changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Handoff state machine outcome
    pub handoff: HandoffState,
    /// An agent message matched a human-transfer pattern
    pub human_transfer: bool,
    /// An agent message matched a canned-template marker
    pub template_sent: bool,
    /// An agent message matched a pre-validation prompt
    pub pre_validation: bool,
    /// Matched text and message indexes backing the flags above
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

// ============================================
// Cache entries
// ============================================

/// A stored cache record. One entry per digest; replacement is whole-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content hash of the normalized transcript text (primary key)
    pub digest: String,
    /// Serialized classification/summary payload
    pub payload: serde_json::Value,
    /// Refreshed on every lookup hit and every write
    pub last_accessed: DateTime<Utc>,
}
