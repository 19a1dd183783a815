//! Analysis pipeline
//!
//! Ties the pieces together: digest → cache lookup → on miss, classify (and
//! optionally summarize) → normalize enumerated fields → store. The result is
//! handed to the external reporting/dashboard layer as plain field/value
//! pairs.
//!
//! Cache failures are never fatal here: a read or write error, or a corrupt
//! cached payload, degrades to a cache miss with a warning and the transcript
//! is analyzed from scratch.

use crate::cache::ResultCache;
use crate::classifier::ConversationClassifier;
use crate::error::{Error, Result};
use crate::patterns::PatternLibrary;
use crate::summary::{self, SummaryClient};
use crate::types::{ClassificationResult, Transcript};
use crate::validator::{normalize_fields, EnumConstraint, FieldRepair, RepairAction};

/// Payload field holding the recommended next action
pub const NEXT_ACTION_FIELD: &str = "next_action";
/// Payload field holding the free-text summary
pub const SUMMARY_FIELD: &str = "summary";

/// What one pipeline run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Content digest of the analyzed transcript
    pub digest: String,
    /// Derived status flags
    pub result: ClassificationResult,
    /// Full stored payload (classification plus any summary fields)
    pub payload: serde_json::Value,
    /// Whether the payload came from the cache
    pub from_cache: bool,
    /// Enumerated-field repairs applied on this run (empty on a cache hit)
    pub repairs: Vec<FieldRepair>,
}

/// Batch-friendly analysis front end. One instance is shared by many workers;
/// classification itself is pure and synchronous.
pub struct AnalysisPipeline {
    classifier: ConversationClassifier,
    constraints: Vec<EnumConstraint>,
}

impl AnalysisPipeline {
    pub fn new(classifier: ConversationClassifier, constraints: Vec<EnumConstraint>) -> Self {
        Self {
            classifier,
            constraints,
        }
    }

    /// Pipeline with the built-in Spanish pattern table.
    pub fn with_spanish_patterns(constraints: Vec<EnumConstraint>) -> Result<Self> {
        Ok(Self::new(
            ConversationClassifier::new(PatternLibrary::spanish()?),
            constraints,
        ))
    }

    pub fn classifier(&self) -> &ConversationClassifier {
        &self.classifier
    }

    /// Classify a transcript, consulting and updating the cache.
    pub fn analyze(&self, cache: &ResultCache, transcript: &Transcript) -> Result<AnalysisOutcome> {
        self.run(cache, transcript, None)
    }

    /// Classify and summarize a transcript, consulting and updating the cache.
    ///
    /// Requires a validation rule for [`NEXT_ACTION_FIELD`]; the summarizer's
    /// recommendation is repaired against it before storage.
    pub fn analyze_with_summary(
        &self,
        cache: &ResultCache,
        transcript: &Transcript,
        client: &dyn SummaryClient,
    ) -> Result<AnalysisOutcome> {
        self.run(cache, transcript, Some(client))
    }

    fn run(
        &self,
        cache: &ResultCache,
        transcript: &Transcript,
        summarizer: Option<&dyn SummaryClient>,
    ) -> Result<AnalysisOutcome> {
        let digest = ResultCache::digest_of(transcript);

        if let Some(outcome) = self.try_cached(cache, &digest, summarizer.is_some()) {
            return Ok(outcome);
        }

        let result = self.classifier.classify(transcript);
        let mut payload = serde_json::to_value(&result)?;
        let map = payload
            .as_object_mut()
            .expect("classification serializes to an object");

        // Constraints configured for classifier output fields apply here;
        // summary fields are not present yet and are skipped.
        let mut repairs = normalize_fields(map, &self.constraints);

        if let Some(client) = summarizer {
            let constraint = self.next_action_constraint()?;
            let lead = summary::summarize_with_client(transcript, &result, constraint, client)?;
            map.insert(SUMMARY_FIELD.to_string(), lead.summary.into());
            map.insert(NEXT_ACTION_FIELD.to_string(), lead.next_action.into());
            if lead.next_action_repair != RepairAction::PassedThrough {
                repairs.push(FieldRepair {
                    field_name: NEXT_ACTION_FIELD.to_string(),
                    action: lead.next_action_repair,
                });
            }
        }

        if let Err(e) = cache.store(&digest, &payload) {
            tracing::warn!(digest = %digest, error = %e, "cache store failed; result not persisted");
        }

        Ok(AnalysisOutcome {
            digest,
            result,
            payload,
            from_cache: false,
            repairs,
        })
    }

    /// Attempt to serve the result from the cache. Any failure along the way
    /// (read error, corrupt payload, missing fields after an eviction) is a
    /// miss, never an error.
    fn try_cached(
        &self,
        cache: &ResultCache,
        digest: &str,
        need_summary: bool,
    ) -> Option<AnalysisOutcome> {
        let entry = match cache.lookup(digest) {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(digest = %digest, error = %e, "cache lookup failed; recomputing");
                return None;
            }
        };

        let result: ClassificationResult = match serde_json::from_value(entry.payload.clone()) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(digest = %digest, error = %e, "corrupt cached payload; recomputing");
                return None;
            }
        };

        if need_summary
            && (entry.payload.get(SUMMARY_FIELD).is_none()
                || entry.payload.get(NEXT_ACTION_FIELD).is_none())
        {
            // A summary field was evicted; recompute and re-store to restore it.
            return None;
        }

        Some(AnalysisOutcome {
            digest: digest.to_string(),
            result,
            payload: entry.payload,
            from_cache: true,
            repairs: vec![],
        })
    }

    fn next_action_constraint(&self) -> Result<&EnumConstraint> {
        self.constraints
            .iter()
            .find(|c| c.field_name == NEXT_ACTION_FIELD)
            .ok_or_else(|| {
                Error::Config(format!(
                    "a validation rule for `{}` is required for summarization",
                    NEXT_ACTION_FIELD
                ))
            })
    }
}
