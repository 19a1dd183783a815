//! Tagged pattern table for Spanish-language conversation matching
//!
//! Patterns are grouped by [`PatternTag`] and compiled once at construction.
//! The library is pure lookup: no mutable state, no side effects.
//!
//! Source conversations are Spanish and frequently arrive without accents, so
//! all matching runs against folded text: NFD-decomposed, combining marks
//! stripped, lowercased, trimmed. Patterns are written accent-free for the
//! same reason. Anchors (`^`/`$`) are used only where a tag semantically
//! requires a whole-message match, e.g. a bare "si"/"no" reply.

use crate::error::{Error, Result};
use crate::types::PatternTag;
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold a message for matching: strip diacritics, lowercase, trim.
pub fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

const HANDOFF_INVITATION: &[&str] = &[
    r"estas a un paso de (la aprobacion|aprobar|obtener)",
    r"te gustaria (continuar|retomar) (con )?(el|tu) (tramite|solicitud|prestamo)",
    r"quieres que un asesor (te|se) (contacte|comunique)",
    r"deseas (continuar|retomar) (con )?tu solicitud",
    r"podemos ayudarte a (terminar|completar) tu (tramite|solicitud)",
];

const HANDOFF_ACCEPTANCE: &[&str] = &[
    // Bare affirmatives must be the whole message
    r"^(si|sip|simon|claro|claro que si|ok|okay|dale|va)[.!]?$",
    r"\bsi[,.]? (quisiera|quiero|me interesa|por favor|gracias)\b",
    r"\bme interesa\b",
    r"\bde acuerdo\b",
    r"\besta bien\b",
    r"\bcomo le hago\b",
    r"\bque necesito (hacer|enviar)\b",
];

const HANDOFF_DECLINE: &[&str] = &[
    // Bare negatives must be the whole message
    r"^(no|nel|nop)[.!]?$",
    r"\bno[,.]? gracias\b",
    r"\bno me interesa\b",
    r"\bya no (quiero|me interesa|necesito)\b",
    r"\bno por (ahora|el momento)\b",
    r"\bdeja(me)? de (escribir|molestar|mandar)\b",
];

const HANDOFF_COMPLETION: &[&str] = &[
    r"\bun asesor (te|se) (contactara|pondra en contacto|comunicara)\b",
    r"\bhemos (transferido|canalizado) tu (solicitud|caso)\b",
    r"\ben breve (te|nos) (contactamos|comunicamos)\b",
    r"\btu solicitud (fue|ha sido) (turnada|canalizada)\b",
];

const HUMAN_TRANSFER: &[&str] = &[
    r"\bte (comunico|transfiero|canalizo) con (un|una|el|la) (asesor|asesora|agente|ejecutivo|ejecutiva)\b",
    r"\bun agente humano\b",
    r"\bte atendera una persona\b",
    r"\buno de nuestros (asesores|ejecutivos) (continuara|seguira)\b",
];

const TEMPLATE_SENT: &[&str] = &[
    r"\bhola[,!]? soy (tu|su) asistente virtual\b",
    r"\bgracias por contactarnos\b",
    r"\beste es un mensaje (automatico|automatizado)\b",
    r"\brecuerda que tienes una solicitud pendiente\b",
    r"\btenemos una oferta (especial|exclusiva) para ti\b",
];

const PRE_VALIDATION: &[&str] = &[
    r"\bvalidar (tus|los|sus) (datos|documentos)\b",
    r"\bconfirmar (tu|su) (identidad|informacion)\b",
    r"\bpre-?validacion\b",
    r"\bcomprobante de (ingresos|domicilio)\b",
    r"\bnecesitamos (verificar|revisar) (tu|tus|su|sus)\b",
];

/// Static mapping from semantic tags to ordered lists of compiled patterns.
pub struct PatternLibrary {
    patterns: HashMap<PatternTag, Vec<Regex>>,
}

impl PatternLibrary {
    /// Compile the built-in Spanish pattern table.
    pub fn spanish() -> Result<Self> {
        let mut patterns = HashMap::new();
        for tag in PatternTag::ALL {
            let sources = match tag {
                PatternTag::HandoffInvitation => HANDOFF_INVITATION,
                PatternTag::HandoffAcceptance => HANDOFF_ACCEPTANCE,
                PatternTag::HandoffDecline => HANDOFF_DECLINE,
                PatternTag::HandoffCompletion => HANDOFF_COMPLETION,
                PatternTag::HumanTransfer => HUMAN_TRANSFER,
                PatternTag::TemplateSent => TEMPLATE_SENT,
                PatternTag::PreValidation => PRE_VALIDATION,
            };
            patterns.insert(tag, Self::compile(tag, sources)?);
        }
        Ok(Self { patterns })
    }

    fn compile(tag: PatternTag, sources: &[&str]) -> Result<Vec<Regex>> {
        sources
            .iter()
            .map(|src| {
                Regex::new(src).map_err(|e| Error::Pattern {
                    tag: tag.as_str().to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Ordered patterns for a tag. The built-in table covers every tag.
    pub fn patterns_for(&self, tag: PatternTag) -> &[Regex] {
        self.patterns.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First match of any pattern under `tag` against raw message text.
    ///
    /// Folding happens here so callers always match accent- and
    /// case-insensitively. Returns the matched slice of the folded text.
    pub fn find_match(&self, tag: PatternTag, text: &str) -> Option<String> {
        let folded = fold_text(text);
        for pattern in self.patterns_for(tag) {
            if let Some(m) = pattern.find(&folded) {
                return Some(m.as_str().to_string());
            }
        }
        None
    }

    /// Whether any pattern under `tag` matches the message text.
    pub fn matches(&self, tag: PatternTag, text: &str) -> bool {
        self.find_match(tag, text).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold_text("Aprobación"), "aprobacion");
        assert_eq!(fold_text("  Sí  "), "si");
        assert_eq!(fold_text("¿Cuánto cuesta?"), "¿cuanto cuesta?");
    }

    #[test]
    fn test_spanish_table_compiles() {
        let lib = PatternLibrary::spanish().unwrap();
        for tag in PatternTag::ALL {
            assert!(
                !lib.patterns_for(tag).is_empty(),
                "tag {} should have patterns",
                tag
            );
        }
    }

    #[test]
    fn test_invitation_matches_with_and_without_accents() {
        let lib = PatternLibrary::spanish().unwrap();
        assert!(lib.matches(
            PatternTag::HandoffInvitation,
            "Estás a un paso de la aprobación de tu préstamo personal"
        ));
        assert!(lib.matches(
            PatternTag::HandoffInvitation,
            "Estas a un paso de la aprobacion de tu prestamo personal"
        ));
    }

    #[test]
    fn test_bare_si_is_whole_message_only() {
        let lib = PatternLibrary::spanish().unwrap();
        assert!(lib.matches(PatternTag::HandoffAcceptance, "si"));
        assert!(lib.matches(PatternTag::HandoffAcceptance, "Sí"));
        // "si" embedded in an unrelated sentence is not a bare affirmative
        assert!(!lib.matches(PatternTag::HandoffAcceptance, "si llueve no salgo"));
    }

    #[test]
    fn test_acceptance_phrase() {
        let lib = PatternLibrary::spanish().unwrap();
        assert!(lib.matches(PatternTag::HandoffAcceptance, "si quisiera mas informacion"));
    }

    #[test]
    fn test_decline_phrases() {
        let lib = PatternLibrary::spanish().unwrap();
        assert!(lib.matches(PatternTag::HandoffDecline, "no gracias"));
        assert!(lib.matches(PatternTag::HandoffDecline, "No, gracias"));
        assert!(lib.matches(PatternTag::HandoffDecline, "no me interesa"));
        assert!(!lib.matches(PatternTag::HandoffDecline, "si quisiera mas informacion"));
    }

    #[test]
    fn test_tags_are_not_mutually_exclusive() {
        let lib = PatternLibrary::spanish().unwrap();
        // A decline that contains "me interesa" satisfies both tags;
        // precedence is the classifier's concern, not the library's.
        let text = "no me interesa";
        assert!(lib.matches(PatternTag::HandoffDecline, text));
        assert!(lib.matches(PatternTag::HandoffAcceptance, text));
    }

    #[test]
    fn test_human_transfer_and_template() {
        let lib = PatternLibrary::spanish().unwrap();
        assert!(lib.matches(
            PatternTag::HumanTransfer,
            "Te comunico con un asesor para continuar"
        ));
        assert!(lib.matches(
            PatternTag::TemplateSent,
            "Hola, soy tu asistente virtual de prestamos"
        ));
        assert!(lib.matches(
            PatternTag::PreValidation,
            "Para continuar necesitamos validar tus documentos"
        ));
    }
}
