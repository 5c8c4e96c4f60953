//! Sliding-window detection of repeated score patterns.
//!
//! The evaluator records every emitted `"q/o/e"` pattern here. Two identical
//! patterns inside the window request a retry with the alternate prompt;
//! three or more are an anomaly worth an operator's attention, but never a
//! second retry for the same article.

use std::collections::VecDeque;

use crate::constants::PATTERN_WINDOW;

/// One emitted evaluation result, reduced to what duplicate detection needs.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub article_id: String,
    pub pattern: String,
    pub total: u8,
    pub summary_prefix: String,
}

/// Outcome of observing a new result against the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateVerdict {
    Unique,
    RetryRequested { occurrences: usize },
    Anomaly { occurrences: usize },
}

#[derive(Debug)]
pub struct DuplicateDetector {
    window: VecDeque<PatternEntry>,
    capacity: usize,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::with_capacity(PATTERN_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a new result and report whether its pattern repeats within the
    /// window. The count includes the entry just observed, so the second
    /// occurrence of a pattern yields `RetryRequested`.
    pub fn observe(&mut self, entry: PatternEntry) -> DuplicateVerdict {
        let pattern = entry.pattern.clone();
        self.window.push_back(entry);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }

        let occurrences = self.window.iter().filter(|e| e.pattern == pattern).count();
        match occurrences {
            0 | 1 => DuplicateVerdict::Unique,
            2 => DuplicateVerdict::RetryRequested { occurrences },
            _ => DuplicateVerdict::Anomaly { occurrences },
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, pattern: &str) -> PatternEntry {
        PatternEntry {
            article_id: id.to_string(),
            pattern: pattern.to_string(),
            total: 50,
            summary_prefix: "summary".to_string(),
        }
    }

    #[test]
    fn test_first_occurrence_is_unique() {
        let mut d = DuplicateDetector::new();
        assert_eq!(d.observe(entry("a", "20/15/15")), DuplicateVerdict::Unique);
    }

    #[test]
    fn test_second_occurrence_requests_retry() {
        let mut d = DuplicateDetector::new();
        d.observe(entry("a", "20/15/15"));
        assert_eq!(
            d.observe(entry("b", "20/15/15")),
            DuplicateVerdict::RetryRequested { occurrences: 2 }
        );
    }

    #[test]
    fn test_third_occurrence_is_anomaly() {
        let mut d = DuplicateDetector::new();
        d.observe(entry("a", "20/15/15"));
        d.observe(entry("b", "20/15/15"));
        assert_eq!(
            d.observe(entry("c", "20/15/15")),
            DuplicateVerdict::Anomaly { occurrences: 3 }
        );
    }

    #[test]
    fn test_different_patterns_stay_unique() {
        let mut d = DuplicateDetector::new();
        d.observe(entry("a", "20/15/15"));
        assert_eq!(d.observe(entry("b", "30/20/20")), DuplicateVerdict::Unique);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut d = DuplicateDetector::with_capacity(3);
        d.observe(entry("a", "20/15/15"));
        d.observe(entry("b", "1/1/1"));
        d.observe(entry("c", "2/2/2"));
        // Pushes "a" out of the window, so the pattern is unique again
        d.observe(entry("d", "3/3/3"));
        assert_eq!(d.len(), 3);
        assert_eq!(d.observe(entry("e", "20/15/15")), DuplicateVerdict::Unique);
    }

    #[test]
    fn test_default_capacity_is_twenty() {
        let mut d = DuplicateDetector::new();
        for i in 0..25 {
            d.observe(entry(&format!("a{i}"), &format!("{i}/0/0")));
        }
        assert_eq!(d.len(), 20);
    }
}
