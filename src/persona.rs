//! Built-in persona catalog.
//!
//! A persona is the system prompt sent ahead of the conversation when the
//! remote provider is active. The sentiment provider ignores it. Users can
//! switch personas mid-session with `/persona <id>`.

/// A selectable assistant persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    /// Stable identifier used in config and the `/persona` command.
    pub id: &'static str,
    /// Short human-readable description shown by `/persona` with no args.
    pub label: &'static str,
    /// System prompt sent as the first message of every remote request.
    pub system_prompt: &'static str,
}

const PERSONAS: &[Persona] = &[
    Persona {
        id: "supportive",
        label: "calm, empathetic listener",
        system_prompt: "You are a kind, empathetic mental health support assistant. \
            You help users feel calm and supported, without diagnosing.",
    },
    Persona {
        id: "cheerful",
        label: "upbeat and encouraging",
        system_prompt: "You are a cheerful, encouraging companion. You respond with \
            warmth and light optimism, celebrate small wins, and keep replies short.",
    },
    Persona {
        id: "practical",
        label: "grounded, step-by-step helper",
        system_prompt: "You are a practical, grounded assistant. You listen first, \
            then offer one small, concrete next step at a time. You never lecture.",
    },
];

/// All registered personas, in display order.
pub fn all() -> &'static [Persona] {
    PERSONAS
}

/// Look up a persona by id. Matching is case-insensitive.
pub fn find(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}
