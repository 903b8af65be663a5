//! Composing the narrative report for one validated record, plus the named
//! fallback policy for scored subjects left without a comment.

use super::record::{NarrativeReport, StudentRecord};
use crate::capabilities::{CompletionError, CompletionModel};
use crate::config::PipelineConfig;

/// Build the narrative prompt for one record.
///
/// Scores are rendered as "Subject: N/10" lines and comments as hints; the
/// model is told to keep prose inside the configured word band and never to
/// quote scores numerically.
pub fn build_report_prompt(record: &StudentRecord, config: &PipelineConfig) -> String {
    let score_lines = record
        .scores
        .iter()
        .map(|(subject, score)| format!("- {subject}: {score}/10"))
        .collect::<Vec<_>>()
        .join("\n");

    let comment_lines = record
        .subject_comments
        .iter()
        .filter(|(_, comment)| !comment.trim().is_empty())
        .map(|(subject, comment)| format!("- {subject}: {comment}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Write a {min}-{max} word British school report for {name}.

TONE:
Warm, supportive, and clear. Friendly and down-to-earth, like a teacher
speaking naturally to parents. No cliches. No invented details.

INSTRUCTIONS:
- Base the report primarily on the subjects and scores provided.
- Use the teacher notes as general guidance about the pupil's term.
- You MAY use the subject comments as subtle hints, but do not copy them
  verbatim or list them mechanically.
- Do NOT mention the scores numerically (do not say "7/10").
- Keep it one paragraph of {min}-{max} words.
- If there are no scores, write a general but realistic termly summary.

SUBJECT SCORES:
{scores}

SUBJECT COMMENTS (hints only):
{comments}

TEACHER NOTES (overall):
"{notes}"
"#,
        min = config.report_words_min,
        max = config.report_words_max,
        name = record.student_name,
        scores = if score_lines.is_empty() {
            "No explicit scores provided."
        } else {
            &score_lines
        },
        comments = if comment_lines.is_empty() {
            "No specific subject comments."
        } else {
            &comment_lines
        },
        notes = record.teacher_notes,
    )
}

/// Compose the narrative for one record.
///
/// Runs at the compose temperature — variation in prose is expected. An
/// empty model response yields an empty (degenerate but valid) narrative.
/// Errors propagate; the runner skips that pupil and continues.
pub fn compose_report(
    llm: &dyn CompletionModel,
    config: &PipelineConfig,
    record: &StudentRecord,
) -> Result<NarrativeReport, CompletionError> {
    let prompt = build_report_prompt(record, config);
    let response = llm.complete(&prompt, config.compose_temperature)?;
    Ok(NarrativeReport::new(&response))
}

/// Stock comment selection for scored subjects the teacher left uncommented.
///
/// Scores at or above the threshold read as praise, the rest as
/// encouragement. Kept as a named policy so it can be tested and swapped
/// without touching the compose path.
#[derive(Debug, Clone, Copy)]
pub struct FallbackCommentPolicy {
    pub threshold: u8,
}

impl FallbackCommentPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            threshold: config.fallback_comment_threshold,
        }
    }

    pub fn comment_for_score(&self, score: u8) -> &'static str {
        if score >= self.threshold {
            "Strong effort"
        } else {
            "Continuing to develop"
        }
    }
}

impl Default for FallbackCommentPolicy {
    fn default() -> Self {
        Self { threshold: 7 }
    }
}

/// Fill empty comments on scored subjects with the policy's stock text.
///
/// Only runs when the caller opted in (`synthesize_missing_comments`);
/// unscored subjects keep their explicit empty comment untouched.
pub fn fill_missing_comments(record: &mut StudentRecord, policy: FallbackCommentPolicy) {
    for (subject, score) in &record.scores {
        if let Some(comment) = record.subject_comments.get_mut(subject) {
            if comment.trim().is_empty() {
                *comment = policy.comment_for_score(*score).to_string();
            }
        }
    }
}
