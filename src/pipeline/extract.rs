//! Turning one transcript segment into a validated [`StudentRecord`].
//!
//! The completion model is asked for strict JSON, but its output is treated
//! as hostile: fences are stripped, parsing is lenient, and every field is
//! repaired into the record's invariants. A response that cannot be parsed
//! at all is a per-segment failure, never a panic and never fatal to
//! sibling segments.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use super::normalize::{normalize_comment_text, normalize_subject_name};
use super::record::StudentRecord;
use crate::capabilities::{CompletionError, CompletionModel};
use crate::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("completion call failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("could not parse extraction response for segment {segment_index}")]
    Unparseable { segment_index: usize },
}

/// Build the constrained extraction prompt for one segment.
pub fn build_extraction_prompt(segment: &str) -> String {
    format!(
        r##"You will be given a short, spoken-style description for a single pupil.

The teacher may mention subjects in any order, mention only some subjects,
give scores, comments, both, or neither, and speak casually. Phrases like
"teacher notes", "teachers notes", "now teacher notes", or "#teachers_notes#"
move from subject-level information to general notes.

INTERPRETATION RULES:
1. Everything clearly tied to a specific subject is SUBJECT-LEVEL information.
2. Anything after a teacher-notes marker is general TEACHER NOTES.
3. Without an explicit marker, remarks about the whole term or the child's
   general attitude are TEACHER NOTES.
4. If the teacher says "no comment" or "#no_comment#" for a subject, that
   subject's comment must be an empty string "".

Return ONLY strict JSON in this format:

{{
  "student_name": "Name or best guess",
  "scores": {{ "<subject>": <integer 0-10> }},
  "subject_comments": {{ "<subject>": "short comment or empty string" }},
  "teacher_notes": "general notes or empty string"
}}

DETAILED RULES:
- Only include subjects actually mentioned in the text.
- A subject may have a score only, a comment only, both, or neither
  (then do not include it).
- If a clear numerical score 0-10 is given for a subject, put it in "scores".
- General remarks not tied to one subject go into "teacher_notes".
- Never use null. Use empty objects {{}} and empty strings "" when needed.
- Do NOT add or invent subjects, scores, or achievements.

TEXT:
"""{segment}"""
"##
    )
}

/// Pull the JSON payload out of a model response.
///
/// Handles a fenced ```json block, a bare fenced block, and prose around a
/// bare object. Returns `None` when no plausible payload exists.
pub fn extract_json_payload(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') {
                return Some(block);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return Some(&trimmed[start..=end]);
        }
    }

    None
}

/// Extract one validated record from one segment.
///
/// `fallback_index` is the segment's 1-based position, used only to
/// synthesize a placeholder name when the model omits one.
pub fn extract_record(
    llm: &dyn CompletionModel,
    config: &PipelineConfig,
    segment: &str,
    fallback_index: usize,
) -> Result<StudentRecord, ExtractError> {
    let prompt = build_extraction_prompt(segment);
    let response = llm.complete(&prompt, config.extract_temperature)?;

    let payload = extract_json_payload(&response).ok_or(ExtractError::Unparseable {
        segment_index: fallback_index,
    })?;

    let parsed: Value = serde_json::from_str(payload).map_err(|e| {
        tracing::warn!(segment = fallback_index, error = %e, "extraction response is not valid JSON");
        ExtractError::Unparseable {
            segment_index: fallback_index,
        }
    })?;

    match parsed {
        Value::Object(_) => Ok(repair_record(&parsed, fallback_index)),
        _ => Err(ExtractError::Unparseable {
            segment_index: fallback_index,
        }),
    }
}

/// Repair a parsed JSON object into a record that satisfies the invariants.
fn repair_record(data: &Value, fallback_index: usize) -> StudentRecord {
    let student_name = match data.get("student_name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("Student {fallback_index}"),
    };

    let mut scores: BTreeMap<String, u8> = BTreeMap::new();
    if let Some(raw_scores) = data.get("scores").and_then(Value::as_object) {
        for (raw_subject, raw_value) in raw_scores {
            let subject = normalize_subject_name(Some(raw_subject.as_str()));
            match coerce_score(raw_value) {
                Some(score) => {
                    scores.insert(subject, score);
                }
                None => {
                    tracing::debug!(subject = %subject, value = %raw_value, "dropping non-numeric score");
                }
            }
        }
    }

    let mut subject_comments: BTreeMap<String, String> = BTreeMap::new();
    if let Some(raw_comments) = data.get("subject_comments").and_then(Value::as_object) {
        for (raw_subject, raw_comment) in raw_comments {
            let subject = normalize_subject_name(Some(raw_subject.as_str()));
            let comment = normalize_comment_text(raw_comment.as_str());
            subject_comments.insert(subject, comment);
        }
    }

    // Every scored subject gets a comment entry, "" when the model gave none.
    for subject in scores.keys() {
        subject_comments.entry(subject.clone()).or_default();
    }

    let teacher_notes = data
        .get("teacher_notes")
        .and_then(Value::as_str)
        .map(|notes| notes.trim().to_string())
        .unwrap_or_default();

    StudentRecord {
        student_name,
        scores,
        subject_comments,
        teacher_notes,
    }
}

/// Coerce a raw score value to an integer in 0..=10.
///
/// Accepts numbers and numeric strings; anything else (or a non-finite
/// value) drops the entry. Rounding happens before clamping, so 13.7
/// becomes 10 and -2 becomes 0.
fn coerce_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !n.is_finite() {
        return None;
    }

    Some(n.round().clamp(0.0, 10.0) as u8)
}
