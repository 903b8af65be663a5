//! Pipeline orchestration for one submission.
//!
//! Runs strictly sequentially: segments are processed one at a time and in
//! transcript order, because progress messages and placeholder naming both
//! depend on position. One pupil's failure is caught at the segment
//! boundary, reported, and never aborts the batch.

use chrono::Utc;

use super::compose::{compose_report, fill_missing_comments, FallbackCommentPolicy};
use super::extract::extract_record;
use super::record::{
    BatchOutcome, ProgressEvent, RenderRequest, SegmentOutcome, Submission,
};
use super::segment::SegmentPolicy;
use super::PipelineError;
use crate::capabilities::{CompletionModel, DeliverySink, DocumentRenderer, Transcriber};
use crate::config::PipelineConfig;

/// The full voice-note → reports pipeline.
///
/// All four external capabilities are injected at construction, so tests
/// run the whole pipeline against doubles.
pub struct ReportPipeline {
    transcriber: Box<dyn Transcriber>,
    llm: Box<dyn CompletionModel>,
    renderer: Box<dyn DocumentRenderer>,
    sink: Box<dyn DeliverySink>,
    segmenter: SegmentPolicy,
    config: PipelineConfig,
}

impl ReportPipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        llm: Box<dyn CompletionModel>,
        renderer: Box<dyn DocumentRenderer>,
        sink: Box<dyn DeliverySink>,
        config: PipelineConfig,
    ) -> Self {
        let segmenter = SegmentPolicy::from_config(&config);
        Self {
            transcriber,
            llm,
            renderer,
            sink,
            segmenter,
            config,
        }
    }

    /// Process one submission end to end.
    ///
    /// Transcription failure is fatal for the submission and surfaces as
    /// `PipelineError::Transcription`. Everything downstream fails per
    /// segment: the outcome lists a `Rendered` or `Skipped` entry for every
    /// segment, in order.
    pub fn process(
        &self,
        submission: &Submission,
        progress: Option<&dyn Fn(ProgressEvent)>,
    ) -> Result<BatchOutcome, PipelineError> {
        tracing::info!(
            submission = %submission.id,
            audio_bytes = submission.audio.len(),
            "processing submission"
        );

        emit(progress, ProgressEvent::Transcribing);
        self.notify(&submission.destination, "Transcribing and creating your reports...");

        let transcript = self
            .transcriber
            .transcribe(&submission.audio, &self.config.language)?;

        let segments = self.segmenter.split(&transcript);
        emit(progress, ProgressEvent::Segmented { count: segments.len() });

        if segments.is_empty() {
            tracing::info!(submission = %submission.id, "transcript contained no pupil segments");
            self.notify(&submission.destination, "No students found in the voice note.");
            return Ok(BatchOutcome::NoStudents);
        }

        self.notify(
            &submission.destination,
            &format!("Found {} student(s). Generating reports...", segments.len()),
        );

        let total = segments.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, segment) in segments.iter().enumerate() {
            let index = i + 1;
            emit(progress, ProgressEvent::Student { index, total });

            match self.process_segment(segment, index, &submission.destination) {
                Ok(student_name) => outcomes.push(SegmentOutcome::Rendered { student_name }),
                Err(reason) => {
                    tracing::warn!(
                        submission = %submission.id,
                        segment = index,
                        reason = %reason,
                        "skipping segment"
                    );
                    self.notify(
                        &submission.destination,
                        &format!("Could not process student {index}"),
                    );
                    outcomes.push(SegmentOutcome::Skipped {
                        segment_index: index,
                        reason,
                    });
                }
            }
        }

        let outcome = BatchOutcome::Processed { outcomes };
        emit(
            progress,
            ProgressEvent::Completed {
                rendered: outcome.rendered_count(),
                skipped: outcome.skipped_count(),
            },
        );
        tracing::info!(
            submission = %submission.id,
            rendered = outcome.rendered_count(),
            skipped = outcome.skipped_count(),
            "submission completed"
        );

        Ok(outcome)
    }

    /// Extract → compose → render → deliver for one segment.
    /// Any failure is returned as the skip reason.
    fn process_segment(
        &self,
        segment: &str,
        index: usize,
        destination: &str,
    ) -> Result<String, String> {
        let mut record = extract_record(self.llm.as_ref(), &self.config, segment, index)
            .map_err(|e| e.to_string())?;

        let narrative = compose_report(self.llm.as_ref(), &self.config, &record)
            .map_err(|e| e.to_string())?;

        if self.config.synthesize_missing_comments {
            fill_missing_comments(&mut record, FallbackCommentPolicy::from_config(&self.config));
        }

        let filename = document_filename(&record.student_name);
        let request = RenderRequest {
            record,
            narrative,
            generated_at: Utc::now(),
        };

        let document = self
            .renderer
            .render(&request)
            .map_err(|e| e.to_string())?;

        self.sink
            .deliver(&document, destination, &filename)
            .map_err(|e| e.to_string())?;

        Ok(request.record.student_name)
    }

    /// Best-effort notification; a failed notice is logged, never fatal.
    fn notify(&self, destination: &str, text: &str) {
        if let Err(e) = self.sink.notify(destination, text) {
            tracing::warn!(error = %e, "failed to send notice");
        }
    }
}

/// Filename for a rendered document: the pupil's name with every
/// non-alphanumeric character replaced by an underscore, plus the pdf suffix.
pub fn document_filename(student_name: &str) -> String {
    let safe: String = student_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{safe}_report.pdf")
}

fn emit(progress: Option<&dyn Fn(ProgressEvent)>, event: ProgressEvent) {
    if let Some(progress) = progress {
        progress(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::capabilities::{
        DeliveryError, MockTranscriber, RenderError, ScriptedCompletion,
    };
    use crate::pipeline::record::NarrativeReport;

    /// Renderer double returning a stub payload, or a failure.
    struct StubRenderer {
        fail: bool,
    }

    impl StubRenderer {
        fn new() -> Self {
            Self { fail: false }
        }

        fn failing() -> Self {
            Self { fail: true }
        }
    }

    impl DocumentRenderer for StubRenderer {
        fn render(&self, _request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
            if self.fail {
                return Err(RenderError::Failed("printer on fire".to_string()));
            }
            Ok(b"%PDF-stub".to_vec())
        }
    }

    /// Delivery double that records documents and notices.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(String, String)>>,
        notices: Mutex<Vec<String>>,
    }

    impl DeliverySink for RecordingSink {
        fn deliver(
            &self,
            _document: &[u8],
            destination: &str,
            filename: &str,
        ) -> Result<(), DeliveryError> {
            self.delivered
                .lock()
                .unwrap()
                .push((destination.to_string(), filename.to_string()));
            Ok(())
        }

        fn notify(&self, _destination: &str, text: &str) -> Result<(), DeliveryError> {
            self.notices.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    const HARRY_JSON: &str = r#"{"student_name": "Harry Ramsden", "scores": {"english": 7, "maths": 5, "pe": 9}, "subject_comments": {}, "teacher_notes": "Really improved confidence this term."}"#;
    const BOB_JSON: &str = r#"{"student_name": "Bob Jones", "scores": {"reading": 8}, "subject_comments": {"reading": "devours novels"}, "teacher_notes": ""}"#;

    /// The pipeline owns its boxed sink; SharedSink lets a test keep a
    /// handle to the same recording sink for inspection.
    struct SharedSink(std::sync::Arc<RecordingSink>);

    impl DeliverySink for SharedSink {
        fn deliver(
            &self,
            document: &[u8],
            destination: &str,
            filename: &str,
        ) -> Result<(), DeliveryError> {
            self.0.deliver(document, destination, filename)
        }

        fn notify(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
            self.0.notify(destination, text)
        }
    }

    fn make_pipeline(
        transcriber: MockTranscriber,
        script: Vec<Result<String, String>>,
    ) -> (ReportPipeline, std::sync::Arc<RecordingSink>) {
        let sink = std::sync::Arc::new(RecordingSink::default());
        let pipeline = ReportPipeline::new(
            Box::new(transcriber),
            Box::new(ScriptedCompletion::new(script)),
            Box::new(StubRenderer::new()),
            Box::new(SharedSink(sink.clone())),
            PipelineConfig::default(),
        );
        (pipeline, sink)
    }

    fn submission() -> Submission {
        Submission::new(vec![0u8; 16], "chat-42")
    }

    // ── End-to-end happy path ──────────────────────────────────

    #[test]
    fn single_student_submission_renders_one_document() {
        let transcriber = MockTranscriber::new(
            "Harry Ramsden. English 7, Maths 5, PE 9. Really improved confidence this term.",
        );
        let (pipeline, sink) = make_pipeline(
            transcriber,
            vec![
                Ok(HARRY_JSON.to_string()),
                Ok("Harry has had a wonderful term.".to_string()),
            ],
        );

        let outcome = pipeline.process(&submission(), None).unwrap();

        assert_eq!(
            outcome,
            BatchOutcome::Processed {
                outcomes: vec![SegmentOutcome::Rendered {
                    student_name: "Harry Ramsden".to_string()
                }]
            }
        );

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "chat-42");
        assert_eq!(delivered[0].1, "Harry_Ramsden_report.pdf");
    }

    #[test]
    fn two_students_are_processed_in_transcript_order() {
        let transcriber =
            MockTranscriber::new("Harry stuff here. NEXT STUDENT Bob stuff here.");
        let (pipeline, sink) = make_pipeline(
            transcriber,
            vec![
                Ok(HARRY_JSON.to_string()),
                Ok("Harry narrative.".to_string()),
                Ok(BOB_JSON.to_string()),
                Ok("Bob narrative.".to_string()),
            ],
        );

        let outcome = pipeline.process(&submission(), None).unwrap();
        assert_eq!(outcome.rendered_count(), 2);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered[0].1, "Harry_Ramsden_report.pdf");
        assert_eq!(delivered[1].1, "Bob_Jones_report.pdf");
    }

    // ── Partial failure ────────────────────────────────────────

    #[test]
    fn unparseable_first_segment_does_not_affect_second() {
        let transcriber = MockTranscriber::new("Garbled audio. next student Bob stuff here.");
        let (pipeline, sink) = make_pipeline(
            transcriber,
            vec![
                Ok("total gibberish, not json".to_string()),
                Ok(BOB_JSON.to_string()),
                Ok("Bob narrative.".to_string()),
            ],
        );

        let outcome = pipeline.process(&submission(), None).unwrap();
        assert_eq!(outcome.rendered_count(), 1);
        assert_eq!(outcome.skipped_count(), 1);

        match &outcome {
            BatchOutcome::Processed { outcomes } => {
                assert!(matches!(
                    outcomes[0],
                    SegmentOutcome::Skipped { segment_index: 1, .. }
                ));
                assert!(matches!(outcomes[1], SegmentOutcome::Rendered { .. }));
            }
            _ => panic!("expected Processed outcome"),
        }

        let notices = sink.notices.lock().unwrap();
        assert!(
            notices.iter().any(|n| n.contains("Could not process student 1")),
            "skip must be reported, got notices: {notices:?}"
        );
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered[0].1, "Bob_Jones_report.pdf");
    }

    #[test]
    fn composition_failure_skips_only_that_segment() {
        let transcriber = MockTranscriber::new("Harry stuff. next student Bob stuff.");
        let (pipeline, _sink) = make_pipeline(
            transcriber,
            vec![
                Ok(HARRY_JSON.to_string()),
                Err("model overloaded".to_string()), // Harry's compose call
                Ok(BOB_JSON.to_string()),
                Ok("Bob narrative.".to_string()),
            ],
        );

        let outcome = pipeline.process(&submission(), None).unwrap();
        assert_eq!(outcome.rendered_count(), 1);
        assert_eq!(outcome.skipped_count(), 1);
    }

    #[test]
    fn render_failure_is_reported_per_segment() {
        let transcriber = MockTranscriber::new("Harry stuff here.");
        let sink = std::sync::Arc::new(RecordingSink::default());
        let pipeline = ReportPipeline::new(
            Box::new(transcriber),
            Box::new(ScriptedCompletion::new(vec![
                Ok(HARRY_JSON.to_string()),
                Ok("Harry narrative.".to_string()),
            ])),
            Box::new(StubRenderer::failing()),
            Box::new(SharedSink(sink.clone())),
            PipelineConfig::default(),
        );

        let outcome = pipeline.process(&submission(), None).unwrap();
        assert_eq!(outcome.rendered_count(), 0);
        assert_eq!(outcome.skipped_count(), 1);
    }

    // ── Whole-request failure and empty transcripts ────────────

    #[test]
    fn transcription_failure_is_fatal_for_the_submission() {
        let (pipeline, _sink) = make_pipeline(MockTranscriber::failing("whisper down"), vec![]);
        let result = pipeline.process(&submission(), None);
        assert!(matches!(result, Err(PipelineError::Transcription(_))));
    }

    #[test]
    fn empty_transcript_reports_no_students() {
        let (pipeline, sink) = make_pipeline(MockTranscriber::new(""), vec![]);
        let outcome = pipeline.process(&submission(), None).unwrap();
        assert_eq!(outcome, BatchOutcome::NoStudents);

        let notices = sink.notices.lock().unwrap();
        assert!(notices.iter().any(|n| n.contains("No students found")));
    }

    // ── Progress events ────────────────────────────────────────

    #[test]
    fn progress_events_are_emitted_in_order() {
        let transcriber = MockTranscriber::new("Harry stuff. next student Bob stuff.");
        let (pipeline, _sink) = make_pipeline(
            transcriber,
            vec![
                Ok(HARRY_JSON.to_string()),
                Ok("n1".to_string()),
                Ok(BOB_JSON.to_string()),
                Ok("n2".to_string()),
            ],
        );

        let events = Mutex::new(Vec::new());
        let record_event = |e: ProgressEvent| events.lock().unwrap().push(e);
        pipeline.process(&submission(), Some(&record_event)).unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(
            events,
            vec![
                ProgressEvent::Transcribing,
                ProgressEvent::Segmented { count: 2 },
                ProgressEvent::Student { index: 1, total: 2 },
                ProgressEvent::Student { index: 2, total: 2 },
                ProgressEvent::Completed { rendered: 2, skipped: 0 },
            ]
        );
    }

    // ── Filenames ──────────────────────────────────────────────

    #[test]
    fn filenames_replace_non_alphanumerics() {
        assert_eq!(document_filename("Harry Ramsden"), "Harry_Ramsden_report.pdf");
        assert_eq!(document_filename("Anne-Marie O'Neill"), "Anne_Marie_O_Neill_report.pdf");
        assert_eq!(document_filename("Student 2"), "Student_2_report.pdf");
    }

    // ── Fallback comment synthesis ─────────────────────────────

    #[test]
    fn fallback_comments_are_synthesized_when_enabled() {
        let transcriber = MockTranscriber::new("Harry stuff here.");
        let renderer = std::sync::Arc::new(SharedRenderer::default());
        let mut config = PipelineConfig::default();
        config.synthesize_missing_comments = true;

        let pipeline = ReportPipeline::new(
            Box::new(transcriber),
            Box::new(ScriptedCompletion::new(vec![
                Ok(HARRY_JSON.to_string()),
                Ok("Harry narrative.".to_string()),
            ])),
            Box::new(SharedRendererHandle(renderer.clone())),
            Box::new(SharedSink(std::sync::Arc::new(RecordingSink::default()))),
            config,
        );

        pipeline.process(&submission(), None).unwrap();

        let requests = renderer.requests.lock().unwrap();
        let record = &requests[0].record;
        // PE scored 9 (>= 7), Maths scored 5 (< 7); neither had a comment.
        assert_eq!(record.subject_comments.get("PE").map(String::as_str), Some("Strong effort"));
        assert_eq!(
            record.subject_comments.get("Maths").map(String::as_str),
            Some("Continuing to develop")
        );
        assert_eq!(requests[0].narrative, NarrativeReport::new("Harry narrative."));
    }

    #[derive(Default)]
    struct SharedRenderer {
        requests: Mutex<Vec<RenderRequest>>,
    }

    struct SharedRendererHandle(std::sync::Arc<SharedRenderer>);

    impl DocumentRenderer for SharedRendererHandle {
        fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
            self.0.requests.lock().unwrap().push(request.clone());
            Ok(b"%PDF-stub".to_vec())
        }
    }
}
