//! Streaming evaluator: prompt, call, parse, detect duplicates, retry.
//!
//! Each article goes through RECEIVED → PROMPTED → PARSED, then either is
//! accepted directly or — when its score pattern repeats within the recent
//! window — re-prompted once with the alternate template and hotter
//! sampling. Every terminal state yields exactly one `Evaluation`.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use curator_core::{
    Article, DuplicateDetector, DuplicateVerdict, Evaluation, ParsedEvaluation, PatternEntry,
    PromptConfig, PromptPair, PromptVars,
};
use curator_core::html;
use curator_core::prompt::{self, jittered_temperature, retry_temperature};
use curator_core::respparse::parse_response;

use crate::governor::{LLM_SERVICE, RateGovernor};
use crate::llm::{ChatApi, ChatRequest, EvalError};

#[derive(Debug, Clone, Copy)]
enum TempMode {
    Base,
    Retry,
}

pub struct Evaluator<C: ChatApi> {
    api: C,
    prompts: PromptConfig,
    detector: Mutex<DuplicateDetector>,
}

impl<C: ChatApi> Evaluator<C> {
    pub fn new(api: C, prompts: PromptConfig) -> Self {
        Self {
            api,
            prompts,
            detector: Mutex::new(DuplicateDetector::new()),
        }
    }

    /// Evaluate from the persisted preview alone, when no separately fetched
    /// body is available.
    pub async fn evaluate_article(
        &self,
        governor: &RateGovernor,
        article: &Article,
    ) -> Result<Evaluation, EvalError> {
        let preview = article.content_preview.clone();
        self.evaluate_with_full_content(governor, article, &preview).await
    }

    /// Evaluate with an externally supplied full body. The body stays in the
    /// caller's memory; only what the prompt needs is derived here.
    pub async fn evaluate_with_full_content(
        &self,
        governor: &RateGovernor,
        article: &Article,
        full_body: &str,
    ) -> Result<Evaluation, EvalError> {
        let content = html::prepare_for_evaluation(full_body, &article.title);

        let parsed = self
            .call_and_parse(
                governor,
                &self.prompts.evaluation_prompt,
                article,
                &content,
                TempMode::Base,
            )
            .await?;

        match self.observe(&parsed) {
            DuplicateVerdict::Unique => Ok(build_evaluation(parsed)),
            DuplicateVerdict::Anomaly { occurrences } => {
                tracing::error!(
                    article_id = %article.id,
                    pattern = %parsed.scores.pattern(),
                    occurrences,
                    "score pattern repeated beyond retry; accepting result"
                );
                Ok(build_evaluation(parsed))
            }
            DuplicateVerdict::RetryRequested { .. } => {
                self.retry_evaluation(governor, article, &content, parsed).await
            }
        }
    }

    async fn retry_evaluation(
        &self,
        governor: &RateGovernor,
        article: &Article,
        content: &str,
        original: ParsedEvaluation,
    ) -> Result<Evaluation, EvalError> {
        let original_pattern = original.scores.pattern();
        tracing::warn!(
            article_id = %article.id,
            pattern = %original_pattern,
            "duplicate score pattern; retrying with alternate prompt"
        );

        match self
            .call_and_parse(
                governor,
                &self.prompts.retry_evaluation_prompt,
                article,
                content,
                TempMode::Retry,
            )
            .await
        {
            Ok(retry_parsed) => {
                // The retry result enters the window too, but a retried
                // article never re-enters retry.
                let _ = self.observe(&retry_parsed);
                let metadata = serde_json::json!({
                    "score_pattern_original": original_pattern,
                    "score_pattern_retry": retry_parsed.scores.pattern(),
                    "total_score_original": original.scores.total(),
                    "total_score_retry": retry_parsed.scores.total(),
                });
                Ok(build_retry_evaluation(retry_parsed, &original_pattern, metadata))
            }
            Err(err) => {
                tracing::warn!(
                    article_id = %article.id,
                    %err,
                    "retry evaluation failed; keeping original result"
                );
                Ok(build_evaluation(original))
            }
        }
    }

    fn observe(&self, parsed: &ParsedEvaluation) -> DuplicateVerdict {
        let entry = PatternEntry {
            article_id: parsed.article_id.clone(),
            pattern: parsed.scores.pattern(),
            total: parsed.scores.total(),
            summary_prefix: parsed.ai_summary.as_str().chars().take(20).collect(),
        };
        match self.detector.lock() {
            Ok(mut detector) => detector.observe(entry),
            Err(poisoned) => poisoned.into_inner().observe(entry),
        }
    }

    /// Governor-gated chat call with transport retries and exponential
    /// backoff. Auth rejections surface immediately; everything else retries
    /// up to the configured budget.
    async fn call_and_parse(
        &self,
        governor: &RateGovernor,
        pair: &PromptPair,
        article: &Article,
        content: &str,
        mode: TempMode,
    ) -> Result<ParsedEvaluation, EvalError> {
        let vars = PromptVars {
            article_id: &article.id,
            title: &article.title,
            author: &article.author,
            category: &article.category,
            content_preview: content,
        };
        let messages = prompt::render(pair, &vars);
        let settings = &self.prompts.llm_settings;
        let retry = &self.prompts.rate_limit;
        let max_attempts = retry.max_retries.max(1);

        let mut last_err = EvalError::Transient("no attempts made".to_string());
        for attempt in 0..max_attempts {
            let temperature = {
                let mut rng = rand::rng();
                match mode {
                    TempMode::Base => jittered_temperature(settings.temperature, &mut rng),
                    TempMode::Retry => retry_temperature(settings.temperature, &mut rng),
                }
            };
            let request = ChatRequest {
                model: settings.model.clone(),
                messages: messages.clone(),
                temperature,
                max_tokens: settings.max_tokens,
                top_p: settings.top_p,
                frequency_penalty: settings.frequency_penalty,
                presence_penalty: settings.presence_penalty,
            };

            governor.admit(LLM_SERVICE).await;
            match self.api.chat(request).await {
                Ok(text) => {
                    governor.record(LLM_SERVICE).await;
                    match parse_response(&text, &article.id) {
                        Ok(parsed) => return Ok(parsed),
                        Err(err) => {
                            tracing::warn!(attempt, %err, "unparseable model response");
                            last_err = EvalError::Parse(err.to_string());
                        }
                    }
                }
                Err(EvalError::Auth(msg)) => return Err(EvalError::Auth(msg)),
                Err(err) => {
                    tracing::warn!(attempt, %err, "model call failed");
                    last_err = err;
                }
            }

            if attempt + 1 < max_attempts {
                let backoff = retry.retry_delay_seconds * f64::powi(2.0, attempt as i32);
                tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
            }
        }

        Err(last_err)
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &C {
        &self.api
    }

    #[cfg(test)]
    pub(crate) fn seed_pattern(&self, article_id: &str, pattern: &str) {
        let entry = PatternEntry {
            article_id: article_id.to_string(),
            pattern: pattern.to_string(),
            total: 0,
            summary_prefix: String::new(),
        };
        if let Ok(mut detector) = self.detector.lock() {
            detector.observe(entry);
        }
    }
}

fn build_evaluation(parsed: ParsedEvaluation) -> Evaluation {
    Evaluation {
        article_id: parsed.article_id,
        scores: parsed.scores,
        ai_summary: parsed.ai_summary,
        is_retry_evaluation: false,
        retry_reason: None,
        evaluation_metadata: None,
        evaluated_at: Utc::now(),
    }
}

fn build_retry_evaluation(
    parsed: ParsedEvaluation,
    original_pattern: &str,
    metadata: serde_json::Value,
) -> Evaluation {
    Evaluation {
        article_id: parsed.article_id,
        scores: parsed.scores,
        ai_summary: parsed.ai_summary,
        is_retry_evaluation: true,
        retry_reason: Some(format!("duplicate score pattern {original_pattern}")),
        evaluation_metadata: Some(metadata),
        evaluated_at: Utc::now(),
    }
}
