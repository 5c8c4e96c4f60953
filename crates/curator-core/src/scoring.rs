//! Score and summary value objects with constructor-time validation.
//!
//! The total score is never stored — it is always recomputed from the three
//! components, so a model response claiming a different total cannot leak
//! into persistence.

use chrono::{DateTime, Utc};

use crate::constants::{
    ENTERTAINMENT_MAX, ORIGINALITY_MAX, QUALITY_MAX, SUMMARY_MAX_CHARS, SUMMARY_MIN_CHARS,
};
use crate::error::ValidationError;

/// The three component scores of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    quality: u8,
    originality: u8,
    entertainment: u8,
}

impl Scores {
    /// Validating constructor; rejects out-of-range components.
    pub fn new(quality: i64, originality: i64, entertainment: i64) -> Result<Self, ValidationError> {
        if !(0..=QUALITY_MAX as i64).contains(&quality) {
            return Err(ValidationError::QualityOutOfRange(quality));
        }
        if !(0..=ORIGINALITY_MAX as i64).contains(&originality) {
            return Err(ValidationError::OriginalityOutOfRange(originality));
        }
        if !(0..=ENTERTAINMENT_MAX as i64).contains(&entertainment) {
            return Err(ValidationError::EntertainmentOutOfRange(entertainment));
        }
        Ok(Self {
            quality: quality as u8,
            originality: originality as u8,
            entertainment: entertainment as u8,
        })
    }

    /// Recovering constructor for model output: clamps each component into
    /// its documented range instead of rejecting.
    pub fn clamped(quality: i64, originality: i64, entertainment: i64) -> Self {
        Self {
            quality: quality.clamp(0, QUALITY_MAX as i64) as u8,
            originality: originality.clamp(0, ORIGINALITY_MAX as i64) as u8,
            entertainment: entertainment.clamp(0, ENTERTAINMENT_MAX as i64) as u8,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn originality(&self) -> u8 {
        self.originality
    }

    pub fn entertainment(&self) -> u8 {
        self.entertainment
    }

    /// Total score, always the component sum.
    pub fn total(&self) -> u8 {
        self.quality + self.originality + self.entertainment
    }

    /// The `"q/o/e"` pattern string used for duplicate detection.
    pub fn pattern(&self) -> String {
        format!("{}/{}/{}", self.quality, self.originality, self.entertainment)
    }
}

/// AI-generated summary, guaranteed to be 10–300 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary(String);

impl Summary {
    /// Validating constructor; rejects summaries outside the length bounds.
    pub fn new(text: &str) -> Result<Self, ValidationError> {
        let len = text.chars().count();
        if !(SUMMARY_MIN_CHARS..=SUMMARY_MAX_CHARS).contains(&len) {
            return Err(ValidationError::SummaryLength(len));
        }
        Ok(Self(text.to_string()))
    }

    /// Recovering constructor for model output: truncates past the ceiling
    /// and pads up to the floor.
    pub fn normalized(text: &str) -> Self {
        let mut s: String = text.trim().chars().take(SUMMARY_MAX_CHARS).collect();
        while s.chars().count() < SUMMARY_MIN_CHARS {
            s.push('.');
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scored output for one article. Exactly one evaluation exists per article;
/// a retry result replaces the original row on persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub article_id: String,
    pub scores: Scores,
    pub ai_summary: Summary,
    pub is_retry_evaluation: bool,
    pub retry_reason: Option<String>,
    pub evaluation_metadata: Option<serde_json::Value>,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn total_score(&self) -> u8 {
        self.scores.total()
    }

    pub fn pattern(&self) -> String {
        self.scores.pattern()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scores_valid_bounds_roundtrip() {
        // The documented maxima must pass unclamped
        let s = Scores::new(40, 30, 30).unwrap();
        assert_eq!(s.total(), 100);
        assert_eq!(s.pattern(), "40/30/30");
    }

    #[test]
    fn test_scores_rejects_out_of_range() {
        assert!(matches!(
            Scores::new(41, 0, 0),
            Err(ValidationError::QualityOutOfRange(41))
        ));
        assert!(matches!(
            Scores::new(0, -1, 0),
            Err(ValidationError::OriginalityOutOfRange(-1))
        ));
        assert!(matches!(
            Scores::new(0, 0, 31),
            Err(ValidationError::EntertainmentOutOfRange(31))
        ));
    }

    #[test]
    fn test_scores_clamped() {
        let s = Scores::clamped(99, -5, 31);
        assert_eq!(s.quality(), 40);
        assert_eq!(s.originality(), 0);
        assert_eq!(s.entertainment(), 30);
    }

    #[test]
    fn test_summary_boundary_lengths() {
        assert!(Summary::new(&"x".repeat(10)).is_ok());
        assert!(Summary::new(&"x".repeat(300)).is_ok());
        assert!(Summary::new(&"x".repeat(9)).is_err());
        assert!(Summary::new(&"x".repeat(301)).is_err());
    }

    #[test]
    fn test_summary_normalized_pads_and_truncates() {
        let short = Summary::normalized("abc");
        assert_eq!(short.as_str().chars().count(), 10);

        let long = Summary::normalized(&"あ".repeat(400));
        assert_eq!(long.as_str().chars().count(), 300);
    }

    #[test]
    fn test_summary_counts_chars_not_bytes() {
        // 10 multi-byte characters must satisfy the floor
        assert!(Summary::new(&"あ".repeat(10)).is_ok());
    }

    proptest! {
        #[test]
        fn prop_clamped_always_in_range(q in -100i64..200, o in -100i64..200, e in -100i64..200) {
            let s = Scores::clamped(q, o, e);
            prop_assert!(s.quality() <= 40);
            prop_assert!(s.originality() <= 30);
            prop_assert!(s.entertainment() <= 30);
            prop_assert_eq!(
                s.total() as u16,
                s.quality() as u16 + s.originality() as u16 + s.entertainment() as u16
            );
        }

        #[test]
        fn prop_normalized_summary_in_bounds(text in ".*") {
            let s = Summary::normalized(&text);
            let len = s.as_str().chars().count();
            prop_assert!((10..=300).contains(&len));
        }
    }
}
