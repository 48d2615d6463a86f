//! Feedback scales, symbol scoring, and the recorder.
//!
//! A scale is the vocabulary the feedback widget offers. Each symbol maps to
//! a fixed score in `[0, 1]`:
//!
//! | Scale | Symbols |
//! |-------|---------|
//! | `thumbs` | 👍 1, 👎 0 |
//! | `faces` | 😀 1, 🙂 0.75, 😐 0.5, 🙁 0.25, 😞 0 |
//!
//! A symbol outside the active scale is rejected with a warning and never
//! reaches the feedback service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ChatResult;
use crate::models::{FeedbackReceipt, FeedbackRecord};
use crate::traits::FeedbackService;

pub const INVALID_SCORE_WARNING: &str = "Invalid feedback score.";

const THUMBS: &[(&str, f64)] = &[("👍", 1.0), ("👎", 0.0)];
const FACES: &[(&str, f64)] = &[
    ("😀", 1.0),
    ("🙂", 0.75),
    ("😐", 0.5),
    ("🙁", 0.25),
    ("😞", 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackScale {
    Thumbs,
    #[default]
    Faces,
}

impl FeedbackScale {
    pub const ALL: [FeedbackScale; 2] = [FeedbackScale::Thumbs, FeedbackScale::Faces];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackScale::Thumbs => "thumbs",
            FeedbackScale::Faces => "faces",
        }
    }

    /// Symbols with their scores, in widget display order.
    pub fn table(&self) -> &'static [(&'static str, f64)] {
        match self {
            FeedbackScale::Thumbs => THUMBS,
            FeedbackScale::Faces => FACES,
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &'static str> {
        self.table().iter().map(|(symbol, _)| *symbol)
    }

    pub fn score(&self, symbol: &str) -> Option<f64> {
        self.table()
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, score)| *score)
    }

    /// The feedback-type key recorded with the score, e.g. `"thumbs 👍"`.
    pub fn feedback_key(&self, symbol: &str) -> String {
        format!("{} {}", self.as_str(), symbol)
    }
}

impl fmt::Display for FeedbackScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbs" => Ok(FeedbackScale::Thumbs),
            "faces" => Ok(FeedbackScale::Faces),
            other => Err(format!(
                "unknown feedback scale '{}': expected thumbs or faces",
                other
            )),
        }
    }
}

/// Result of a feedback interaction. A rejection is a normal outcome, not an
/// error: it carries the warning to show and nothing was sent.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    Recorded {
        record: FeedbackRecord,
        receipt: FeedbackReceipt,
    },
    Rejected {
        warning: String,
    },
}

/// Scores a widget submission and forwards it to the feedback service.
///
/// No de-duplication happens here: two submissions for one run id produce two
/// service calls.
pub struct FeedbackRecorder {
    service: Arc<dyn FeedbackService>,
}

impl FeedbackRecorder {
    pub fn new(service: Arc<dyn FeedbackService>) -> Self {
        Self { service }
    }

    pub async fn record(
        &self,
        run_id: Uuid,
        scale: FeedbackScale,
        symbol: &str,
        comment: Option<&str>,
    ) -> ChatResult<FeedbackOutcome> {
        let Some(score) = scale.score(symbol) else {
            warn!(%run_id, scale = %scale, symbol, "rejected feedback symbol");
            return Ok(FeedbackOutcome::Rejected {
                warning: INVALID_SCORE_WARNING.to_string(),
            });
        };

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        let key = scale.feedback_key(symbol);

        let feedback_id = self
            .service
            .create_feedback(run_id, &key, score, comment)
            .await?;
        info!(%run_id, %feedback_id, key = %key, score, "feedback recorded");

        Ok(FeedbackOutcome::Recorded {
            record: FeedbackRecord {
                run_id,
                score,
                category: key,
                comment: comment.map(str::to_string),
            },
            receipt: FeedbackReceipt { feedback_id, score },
        })
    }
}
