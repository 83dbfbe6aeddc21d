//! Final score computation for one application evaluation.
//!
//! The score rewards average rating quality and penalises the share of
//! answers flagged as AI-generated:
//!
//! ```text
//! S = 0.8 * (C / M) - 0.2 * (A / T)
//! final = max(0, S) * 100
//! ```
//!
//! where `T` is the number of answers, `M = 10 * T`, `C` the sum of ratings
//! and `A` the number of flagged answers. Everything here is pure; the
//! writes live in [`crate::services::evaluation`].

use std::collections::HashMap;

use thiserror::Error;

use crate::db::models::QaPair;

pub(crate) const MIN_RATING: u8 = 1;
pub(crate) const MAX_RATING: u8 = 10;

const QUALITY_WEIGHT: f64 = 0.8;
const AI_PENALTY_WEIGHT: f64 = 0.2;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum ScoringError {
    #[error("rating {0} is outside 1..=10")]
    RatingOutOfRange(i64),
    #[error("answer {0} does not belong to this application")]
    UnknownAnswer(String),
    #[error("{} answer(s) have no rating", .missing.len())]
    Incomplete { missing: Vec<String> },
    #[error("cannot score an application without answers")]
    NoAnswers,
}

/// A rating in `MIN_RATING..=MAX_RATING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Rating(u8);

impl Rating {
    pub(crate) fn new(value: i64) -> Result<Self, ScoringError> {
        if (i64::from(MIN_RATING)..=i64::from(MAX_RATING)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoringError::RatingOutOfRange(value))
        }
    }

    pub(crate) fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RatingEntry {
    pub(crate) rating: Option<Rating>,
    pub(crate) looks_ai: bool,
}

/// Per-session scratch state: one entry per answer, created unrated and
/// unflagged. Entries are never removed, only updated.
#[derive(Debug, Clone, Default)]
pub(crate) struct RatingSheet {
    entries: HashMap<String, RatingEntry>,
}

impl RatingSheet {
    pub(crate) fn for_pairs(pairs: &[QaPair]) -> Self {
        let entries =
            pairs.iter().map(|pair| (pair.id.clone(), RatingEntry::default())).collect();
        Self { entries }
    }

    pub(crate) fn rate(&mut self, answer_id: &str, rating: Rating) -> Result<(), ScoringError> {
        self.entry_mut(answer_id)?.rating = Some(rating);
        Ok(())
    }

    pub(crate) fn set_looks_ai(
        &mut self,
        answer_id: &str,
        looks_ai: bool,
    ) -> Result<(), ScoringError> {
        self.entry_mut(answer_id)?.looks_ai = looks_ai;
        Ok(())
    }

    pub(crate) fn entry(&self, answer_id: &str) -> Option<&RatingEntry> {
        self.entries.get(answer_id)
    }

    #[cfg(test)]
    pub(crate) fn answer_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_mut(&mut self, answer_id: &str) -> Result<&mut RatingEntry, ScoringError> {
        self.entries
            .get_mut(answer_id)
            .ok_or_else(|| ScoringError::UnknownAnswer(answer_id.to_string()))
    }
}

/// The rating and flag recorded for one answer of a scored evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnswerJudgment {
    pub(crate) answer_id: String,
    pub(crate) rating: Rating,
    pub(crate) looks_ai: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreBreakdown {
    pub(crate) total_questions: usize,
    pub(crate) max_points: u32,
    pub(crate) collected_points: u32,
    pub(crate) flagged_ai: usize,
    /// `S` before clamping; may be negative.
    pub(crate) raw_score: f64,
    /// `max(0, S) * 100`, always within `[0, 100]`.
    pub(crate) final_score: f64,
    /// One judgment per pair, in pair order.
    pub(crate) judgments: Vec<AnswerJudgment>,
}

impl ScoreBreakdown {
    pub(crate) fn display_score(&self) -> String {
        format_score(self.final_score)
    }
}

pub(crate) fn format_score(score: f64) -> String {
    format!("{score:.2}")
}

/// Scores `pairs` from the entries in `sheet`.
///
/// Fails with [`ScoringError::NoAnswers`] for an empty pair set and with
/// [`ScoringError::Incomplete`] when any pair lacks a rating. Only the
/// pairs are consulted, so the judgments always cover exactly the pair ids.
pub(crate) fn score(pairs: &[QaPair], sheet: &RatingSheet) -> Result<ScoreBreakdown, ScoringError> {
    if pairs.is_empty() {
        return Err(ScoringError::NoAnswers);
    }

    let mut judgments = Vec::with_capacity(pairs.len());
    let mut missing = Vec::new();

    for pair in pairs {
        let entry = sheet.entry(&pair.id).copied().unwrap_or_default();
        match entry.rating {
            Some(rating) => judgments.push(AnswerJudgment {
                answer_id: pair.id.clone(),
                rating,
                looks_ai: entry.looks_ai,
            }),
            None => missing.push(pair.id.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(ScoringError::Incomplete { missing });
    }

    let total_questions = pairs.len();
    let max_points = total_questions as u32 * u32::from(MAX_RATING);
    let collected_points: u32 = judgments.iter().map(|j| u32::from(j.rating.value())).sum();
    let flagged_ai = judgments.iter().filter(|j| j.looks_ai).count();

    let quality = f64::from(collected_points) / f64::from(max_points);
    let ai_share = flagged_ai as f64 / total_questions as f64;
    let raw_score = QUALITY_WEIGHT * quality - AI_PENALTY_WEIGHT * ai_share;
    let final_score = raw_score.max(0.0) * 100.0;

    Ok(ScoreBreakdown {
        total_questions,
        max_points,
        collected_points,
        flagged_ai,
        raw_score,
        final_score,
        judgments,
    })
}
