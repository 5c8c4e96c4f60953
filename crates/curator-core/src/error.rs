use std::fmt;

/// Constructor-time validation failures for score and summary value objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    QualityOutOfRange(i64),
    OriginalityOutOfRange(i64),
    EntertainmentOutOfRange(i64),
    SummaryLength(usize),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::QualityOutOfRange(v) => {
                write!(f, "quality score {v} outside 0..=40")
            }
            ValidationError::OriginalityOutOfRange(v) => {
                write!(f, "originality score {v} outside 0..=30")
            }
            ValidationError::EntertainmentOutOfRange(v) => {
                write!(f, "entertainment score {v} outside 0..=30")
            }
            ValidationError::SummaryLength(n) => {
                write!(f, "summary length {n} outside 10..=300 chars")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failures while extracting structured data from an LLM response.
#[derive(Debug)]
pub enum ParseError {
    NoJsonObject,
    Json(serde_json::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NoJsonObject => write!(f, "no JSON object found in response"),
            ParseError::Json(e) => write!(f, "malformed JSON in response: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Json(e)
    }
}
