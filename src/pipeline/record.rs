//! Data carried through the pipeline: the inbound submission, the validated
//! per-pupil record, the composed narrative, and the per-batch outcomes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound voice-note submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub audio: Vec<u8>,
    /// Opaque destination identifier for delivery (chat id, callback URL...).
    pub destination: String,
    pub received_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(audio: Vec<u8>, destination: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            audio,
            destination: destination.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// The validated extraction result for one pupil.
///
/// Invariants, maintained by the extractor's repair step:
/// - `student_name` is never empty
/// - every score is in 0..=10
/// - every scored subject also has a comment entry (possibly `""`)
///
/// Maps are `BTreeMap` so prompt rendering and tests see a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_name: String,
    pub scores: BTreeMap<String, u8>,
    pub subject_comments: BTreeMap<String, String>,
    pub teacher_notes: String,
}

impl StudentRecord {
    /// Check the record invariants. Used by tests and debug builds.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.student_name.trim().is_empty() {
            return Err("student_name is empty".to_string());
        }
        for (subject, score) in &self.scores {
            if *score > 10 {
                return Err(format!("score {score} for {subject} out of range"));
            }
            if !self.subject_comments.contains_key(subject) {
                return Err(format!("scored subject {subject} has no comment entry"));
            }
        }
        Ok(())
    }

    /// Subjects that carry either a score or a comment, in stable order.
    pub fn subjects(&self) -> Vec<&str> {
        let mut subjects: Vec<&str> = self.scores.keys().map(String::as_str).collect();
        for subject in self.subject_comments.keys() {
            if !self.scores.contains_key(subject) {
                subjects.push(subject);
            }
        }
        subjects.sort_unstable();
        subjects
    }
}

/// Narrative prose composed for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub text: String,
}

impl NarrativeReport {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// What the external renderer receives for one pupil.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    pub record: StudentRecord,
    pub narrative: NarrativeReport,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of one segment's sub-pipeline. Every segment ends up as exactly
/// one of these — nothing is silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Rendered { student_name: String },
    Skipped { segment_index: usize, reason: String },
}

/// Terminal result for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The transcript contained no pupil segments. Terminal, not an error.
    NoStudents,
    Processed { outcomes: Vec<SegmentOutcome> },
}

impl BatchOutcome {
    pub fn rendered_count(&self) -> usize {
        match self {
            Self::NoStudents => 0,
            Self::Processed { outcomes } => outcomes
                .iter()
                .filter(|o| matches!(o, SegmentOutcome::Rendered { .. }))
                .count(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        match self {
            Self::NoStudents => 0,
            Self::Processed { outcomes } => outcomes
                .iter()
                .filter(|o| matches!(o, SegmentOutcome::Skipped { .. }))
                .count(),
        }
    }
}

/// Progress notifications emitted while a submission is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Transcribing,
    Segmented { count: usize },
    Student { index: usize, total: usize },
    Completed { rendered: usize, skipped: usize },
}
