//! Prompt enhancement
//!
//! Renders the learned context block appended to generation prompts. The
//! output is deterministic given the same bundle, sections appear in a
//! fixed order, each independently capped, and empty sections are omitted
//! entirely, so an engine that has learned nothing leaves the prompt
//! untouched.

use crate::config::PromptConfig;
use crate::types::SuggestionBundle;
use std::fmt::Write;

/// Append learned context to a base prompt
pub fn enhance(base_prompt: &str, bundle: &SuggestionBundle, config: &PromptConfig) -> String {
    let mut prompt = base_prompt.to_string();

    if !bundle.similar.is_empty() && config.max_exemplars > 0 {
        let _ = write!(prompt, "\n\nSIMILAR PAST QUERIES:");
        for similar in bundle.similar.iter().take(config.max_exemplars) {
            let outcome = if similar.was_helpful {
                "helpful"
            } else {
                "not helpful"
            };
            let _ = write!(
                prompt,
                "\n- \"{}\" -> {} ({})",
                similar.query, similar.sql, outcome
            );
        }
    }

    if !bundle.keyword_guidance.is_empty() && config.max_guidance > 0 {
        let _ = write!(prompt, "\n\nLEARNING-BASED GUIDANCE:");
        for guidance in bundle.keyword_guidance.values().take(config.max_guidance) {
            let _ = write!(prompt, "\n- {}", guidance.note);
        }
    }

    if !bundle.suggestions.is_empty() && config.max_suggestions > 0 {
        let _ = write!(prompt, "\n\nRECENT IMPROVEMENTS:");
        for suggestion in bundle.suggestions.iter().take(config.max_suggestions) {
            let _ = write!(prompt, "\n- {}", suggestion.text);
        }
    }

    prompt
}
