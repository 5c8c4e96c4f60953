//! Prompt rendering and sampling discipline.
//!
//! Template expansion is pure and literal: the configured user template
//! carries `{placeholder}` markers that are substituted verbatim, nothing
//! else is interpreted. Temperature handling adds a small per-call jitter so
//! repeated evaluations do not sample identically.

use rand::Rng;
use serde::Serialize;

use crate::config::PromptPair;
use crate::constants::{RETRY_TEMP_MAX, RETRY_TEMP_MIN, TEMP_JITTER, TEMP_MAX, TEMP_MIN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Values substituted into the user prompt template.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub article_id: &'a str,
    pub title: &'a str,
    pub author: &'a str,
    pub category: &'a str,
    pub content_preview: &'a str,
}

/// Render a prompt pair into the message list sent to the chat endpoint.
pub fn render(pair: &PromptPair, vars: &PromptVars<'_>) -> Vec<ChatMessage> {
    let user = pair
        .user_prompt_template
        .replace("{article_id}", vars.article_id)
        .replace("{title}", vars.title)
        .replace("{author}", vars.author)
        .replace("{category}", vars.category)
        .replace("{content_preview}", vars.content_preview);

    vec![
        ChatMessage {
            role: Role::System,
            content: pair.system_prompt.clone(),
        },
        ChatMessage {
            role: Role::User,
            content: user,
        },
    ]
}

/// Base temperature with a uniform ±0.05 jitter, clamped to [0.1, 0.8].
pub fn jittered_temperature(base: f64, rng: &mut impl Rng) -> f64 {
    let jitter = rng.random_range(-TEMP_JITTER..=TEMP_JITTER);
    (base + jitter).clamp(TEMP_MIN, TEMP_MAX)
}

/// Retry temperature drawn uniformly from [base + 0.2, base + 0.5], clamped
/// to [0.5, 0.8] so the alternate pass samples visibly hotter.
pub fn retry_temperature(base: f64, rng: &mut impl Rng) -> f64 {
    let drawn = rng.random_range(base + 0.2..=base + 0.5);
    drawn.clamp(RETRY_TEMP_MIN, RETRY_TEMP_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn pair() -> PromptPair {
        PromptPair {
            system_prompt: "You are a strict critic.".to_string(),
            user_prompt_template:
                "Rate {title} by {author} ({category}, id={article_id}):\n{content_preview}"
                    .to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let vars = PromptVars {
            article_id: "k_u",
            title: "T",
            author: "A",
            category: "game",
            content_preview: "Body",
        };
        let messages = render(&pair(), &vars);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "Rate T by A (game, id=k_u):\nBody");
    }

    #[test]
    fn test_render_is_literal() {
        let mut p = pair();
        p.user_prompt_template = "{title} {title} {unknown}".to_string();
        let vars = PromptVars {
            article_id: "i",
            title: "X",
            author: "a",
            category: "c",
            content_preview: "p",
        };
        let messages = render(&p, &vars);
        // Repeated markers all expand; unrecognized markers pass through
        assert_eq!(messages[1].content, "X X {unknown}");
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let msg = ChatMessage {
            role: Role::System,
            content: "s".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"system""#));
    }

    #[test]
    fn test_jittered_temperature_stays_clamped() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let t = jittered_temperature(0.3, &mut rng);
            assert!((0.25..=0.35).contains(&t), "got {t}");
        }
        // Extremes clamp to the valid sampling range
        for _ in 0..100 {
            assert!(jittered_temperature(0.0, &mut rng) >= 0.1);
            assert!(jittered_temperature(1.0, &mut rng) <= 0.8);
        }
    }

    #[test]
    fn test_retry_temperature_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let t = retry_temperature(0.3, &mut rng);
            assert!((0.5..=0.8).contains(&t), "got {t}");
        }
        for _ in 0..100 {
            // A hot base still clamps to 0.8
            assert!(retry_temperature(0.7, &mut rng) <= 0.8);
        }
    }
}
