//! Conversation classifier
//!
//! Derives discrete status flags from a transcript by running the pattern
//! library over messages in document order. Pure function of transcript +
//! library: no side effects, and malformed message text is treated as empty
//! rather than raising, so one corrupt record never aborts classification.
//!
//! The handoff flow is an explicit finite-state machine rather than a chain
//! of independent flags; see [`ConversationClassifier::detect_handoff`].

use crate::patterns::PatternLibrary;
use crate::types::{
    ChatMessage, ClassificationResult, Evidence, HandoffState, PatternTag, SenderRole, Transcript,
};

/// Outcome of the handoff state machine plus the matches that drove it.
#[derive(Debug, Clone)]
pub struct HandoffDetection {
    pub state: HandoffState,
    pub evidence: Vec<Evidence>,
}

/// Classifies transcripts against a pattern library.
pub struct ConversationClassifier {
    library: PatternLibrary,
}

impl ConversationClassifier {
    pub fn new(library: PatternLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Run every detector and assemble the full result.
    pub fn classify(&self, transcript: &Transcript) -> ClassificationResult {
        let handoff = self.detect_handoff(transcript);
        let mut evidence = handoff.evidence;

        let human_transfer = self.detect_agent_tag(transcript, PatternTag::HumanTransfer);
        let template_sent = self.detect_agent_tag(transcript, PatternTag::TemplateSent);
        let pre_validation = self.detect_agent_tag(transcript, PatternTag::PreValidation);

        for found in [&human_transfer, &template_sent, &pre_validation] {
            if let Some(ev) = found {
                evidence.push(ev.clone());
            }
        }

        ClassificationResult {
            handoff: handoff.state,
            human_transfer: human_transfer.is_some(),
            template_sent: template_sent.is_some(),
            pre_validation: pre_validation.is_some(),
            evidence,
        }
    }

    /// Run the handoff state machine over the transcript.
    ///
    /// Transitions:
    /// - No agent invitation anywhere: `NotOffered`, regardless of other
    ///   message content.
    /// - Invitation found: `Offered`; the *next* customer message (only that
    ///   one, bounded lookahead) decides the response. Decline wins when a
    ///   message matches both acceptance and decline patterns.
    /// - After acceptance, any later agent completion phrase advances to
    ///   `Completed`; otherwise the state stays `Accepted`.
    /// - A customer reply matching neither pattern set: `UnclearResponse`.
    pub fn detect_handoff(&self, transcript: &Transcript) -> HandoffDetection {
        let messages = transcript.messages();

        let Some((invite_idx, invite_ev)) =
            self.first_match_from(messages, 0, SenderRole::Agent, PatternTag::HandoffInvitation)
        else {
            return HandoffDetection {
                state: HandoffState::NotOffered,
                evidence: vec![],
            };
        };

        let mut evidence = vec![invite_ev];

        // Bounded lookahead: only the next customer message after the
        // invitation counts as the response.
        let response = messages
            .iter()
            .enumerate()
            .skip(invite_idx + 1)
            .find(|(_, m)| m.sender == SenderRole::Customer);

        let Some((resp_idx, resp_msg)) = response else {
            return HandoffDetection {
                state: HandoffState::Offered,
                evidence,
            };
        };

        // Decline takes precedence: explicit negations are more specific.
        if let Some(matched) = self
            .library
            .find_match(PatternTag::HandoffDecline, resp_msg.text())
        {
            evidence.push(Evidence {
                tag: PatternTag::HandoffDecline,
                message_index: resp_idx,
                matched_text: matched,
            });
            return HandoffDetection {
                state: HandoffState::Declined,
                evidence,
            };
        }

        if let Some(matched) = self
            .library
            .find_match(PatternTag::HandoffAcceptance, resp_msg.text())
        {
            evidence.push(Evidence {
                tag: PatternTag::HandoffAcceptance,
                message_index: resp_idx,
                matched_text: matched,
            });

            // Accepted may still advance to Completed on a later agent message.
            if let Some((_, completion_ev)) = self.first_match_from(
                messages,
                resp_idx + 1,
                SenderRole::Agent,
                PatternTag::HandoffCompletion,
            ) {
                evidence.push(completion_ev);
                return HandoffDetection {
                    state: HandoffState::Completed,
                    evidence,
                };
            }

            return HandoffDetection {
                state: HandoffState::Accepted,
                evidence,
            };
        }

        HandoffDetection {
            state: HandoffState::UnclearResponse,
            evidence,
        }
    }

    /// True iff any agent message matches a human-transfer pattern.
    /// No temporal ordering requirement.
    pub fn detect_human_transfer(&self, transcript: &Transcript) -> bool {
        self.detect_agent_tag(transcript, PatternTag::HumanTransfer)
            .is_some()
    }

    /// True iff any agent message matches a canned-template marker phrase.
    pub fn detect_template(&self, transcript: &Transcript) -> bool {
        self.detect_agent_tag(transcript, PatternTag::TemplateSent)
            .is_some()
    }

    /// True iff any agent message matches a pre-validation prompt phrase.
    pub fn detect_pre_validation(&self, transcript: &Transcript) -> bool {
        self.detect_agent_tag(transcript, PatternTag::PreValidation)
            .is_some()
    }

    /// First agent message matching `tag`, scanning in document order.
    fn detect_agent_tag(&self, transcript: &Transcript, tag: PatternTag) -> Option<Evidence> {
        self.first_match_from(transcript.messages(), 0, SenderRole::Agent, tag)
            .map(|(_, ev)| ev)
    }

    fn first_match_from(
        &self,
        messages: &[ChatMessage],
        start: usize,
        sender: SenderRole,
        tag: PatternTag,
    ) -> Option<(usize, Evidence)> {
        messages
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, m)| m.sender == sender)
            .find_map(|(idx, m)| {
                self.library.find_match(tag, m.text()).map(|matched| {
                    (
                        idx,
                        Evidence {
                            tag,
                            message_index: idx,
                            matched_text: matched,
                        },
                    )
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn classifier() -> ConversationClassifier {
        ConversationClassifier::new(PatternLibrary::spanish().unwrap())
    }

    fn transcript(lines: &[(SenderRole, &str)]) -> Transcript {
        let start = Utc::now();
        Transcript::new(
            lines
                .iter()
                .enumerate()
                .map(|(i, (sender, text))| {
                    ChatMessage::new(*sender, *text, start + Duration::seconds(i as i64))
                })
                .collect(),
        )
    }

    const INVITATION: &str = "Estas a un paso de la aprobacion de tu prestamo personal";

    #[test]
    fn test_no_invitation_is_not_offered() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, "Hola, buen dia"),
            (SenderRole::Customer, "si"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::NotOffered);
    }

    #[test]
    fn test_invitation_without_response_is_offered() {
        let clf = classifier();
        let t = transcript(&[(SenderRole::Agent, INVITATION)]);
        let detection = clf.detect_handoff(&t);
        assert_eq!(detection.state, HandoffState::Offered);
        assert_eq!(detection.evidence.len(), 1);
        assert_eq!(detection.evidence[0].tag, PatternTag::HandoffInvitation);
    }

    #[test]
    fn test_bare_si_accepts() {
        let clf = classifier();
        let t = transcript(&[(SenderRole::Agent, INVITATION), (SenderRole::Customer, "si")]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::Accepted);
    }

    #[test]
    fn test_no_gracias_declines() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "no gracias"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::Declined);
    }

    #[test]
    fn test_unrelated_reply_is_unclear() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "quien eres?"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::UnclearResponse);
    }

    #[test]
    fn test_lookahead_is_next_customer_message_only() {
        let clf = classifier();
        // Unclear first reply; a later acceptance does not rescue the state.
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "quien eres?"),
            (SenderRole::Customer, "si quiero"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::UnclearResponse);
    }

    #[test]
    fn test_agent_messages_skipped_before_response() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Agent, "Sigues ahi?"),
            (SenderRole::Customer, "si"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::Accepted);
    }

    #[test]
    fn test_decline_takes_precedence_over_acceptance() {
        let clf = classifier();
        // "no me interesa" contains "me interesa", so both pattern sets match.
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "no me interesa"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::Declined);
    }

    #[test]
    fn test_accepted_advances_to_completed() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "si"),
            (SenderRole::Agent, "Perfecto, un asesor te contactara el dia de hoy"),
        ]);
        let detection = clf.detect_handoff(&t);
        assert_eq!(detection.state, HandoffState::Completed);
        assert_eq!(detection.evidence.len(), 3);
    }

    #[test]
    fn test_declined_is_terminal() {
        let clf = classifier();
        // Completion phrase after a decline must not flip the state.
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "no gracias"),
            (SenderRole::Agent, "Un asesor te contactara de todas formas"),
        ]);
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::Declined);
    }

    #[test]
    fn test_customer_messages_never_trigger_agent_detectors() {
        let clf = classifier();
        let t = transcript(&[(
            SenderRole::Customer,
            "te comunico con un asesor, dice mi amigo",
        )]);
        assert!(!clf.detect_human_transfer(&t));
    }

    #[test]
    fn test_detectors_over_agent_messages() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, "Hola, soy tu asistente virtual"),
            (SenderRole::Agent, "Necesitamos validar tus documentos"),
            (SenderRole::Agent, "Te comunico con un asesor"),
        ]);
        assert!(clf.detect_template(&t));
        assert!(clf.detect_pre_validation(&t));
        assert!(clf.detect_human_transfer(&t));
    }

    #[test]
    fn test_malformed_text_does_not_abort() {
        let clf = classifier();
        let mut messages = vec![
            ChatMessage::new(SenderRole::Agent, INVITATION, Utc::now()),
            ChatMessage {
                sender: SenderRole::Customer,
                text: None,
                sent_at: Utc::now(),
            },
        ];
        messages.push(ChatMessage::new(SenderRole::Agent, "Sigues ahi?", Utc::now()));
        let t = Transcript::new(messages);
        // The corrupt customer reply is the bounded-lookahead response; empty
        // text matches neither pattern set.
        assert_eq!(clf.detect_handoff(&t).state, HandoffState::UnclearResponse);
    }

    #[test]
    fn test_empty_transcript() {
        let clf = classifier();
        let t = Transcript::default();
        let result = clf.classify(&t);
        assert_eq!(result.handoff, HandoffState::NotOffered);
        assert!(!result.human_transfer);
        assert!(!result.template_sent);
        assert!(!result.pre_validation);
        assert!(result.evidence.is_empty());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let clf = classifier();
        let t = transcript(&[
            (SenderRole::Agent, INVITATION),
            (SenderRole::Customer, "si quisiera mas informacion"),
        ]);
        let result = clf.classify(&t);
        assert_eq!(result.handoff, HandoffState::Accepted);
        assert!(!result.human_transfer);
        assert!(!result.template_sent);
    }
}
