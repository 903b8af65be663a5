//! Splitting one transcript into ordered per-pupil segments.

use regex::RegexBuilder;

/// How a transcript is split into per-pupil segments.
///
/// The delimiter phrase is matched case-insensitively as a whole phrase, so
/// "NEXT STUDENT" splits but "next students' trip" does not.
pub struct SegmentPolicy {
    delimiter: regex::Regex,
    min_segment_len: usize,
    preserve_case: bool,
}

impl SegmentPolicy {
    pub fn new(delimiter: &str, min_segment_len: usize, preserve_case: bool) -> Self {
        let pattern = format!(r"\b{}\b", regex::escape(delimiter.trim()));
        let delimiter = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("escaped delimiter is a valid regex");

        Self {
            delimiter,
            min_segment_len,
            preserve_case,
        }
    }

    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self::new(&config.delimiter, config.min_segment_len, config.preserve_case)
    }

    /// Split a transcript into ordered, trimmed, non-empty segments.
    ///
    /// Empty transcript (or one that is all delimiters and whitespace)
    /// yields an empty Vec — the caller reports "no students found".
    pub fn split(&self, transcript: &str) -> Vec<String> {
        let text = if self.preserve_case {
            transcript.to_string()
        } else {
            // Legacy behavior: lower-case everything before splitting.
            transcript.to_lowercase()
        };

        self.delimiter
            .split(&text)
            .map(str::trim)
            .filter(|piece| !piece.is_empty() && piece.len() > self.min_segment_len)
            .map(str::to_string)
            .collect()
    }
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        let config = crate::config::PipelineConfig::default();
        Self::from_config(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_delimiter_preserving_case_and_order() {
        let policy = SegmentPolicy::default();
        let segments = policy.split("Alice stuff. NEXT STUDENT Bob stuff.");
        assert_eq!(segments, vec!["Alice stuff.", "Bob stuff."]);
    }

    #[test]
    fn empty_transcript_yields_no_segments() {
        let policy = SegmentPolicy::default();
        assert!(policy.split("").is_empty());
        assert!(policy.split("   ").is_empty());
    }

    #[test]
    fn transcript_of_only_delimiters_yields_no_segments() {
        let policy = SegmentPolicy::default();
        assert!(policy.split("next student next student").is_empty());
    }

    #[test]
    fn single_segment_equals_trimmed_input() {
        let policy = SegmentPolicy::default();
        let segments = policy.split("  only one student  ");
        assert_eq!(segments, vec!["only one student"]);
    }

    #[test]
    fn delimiter_matches_any_case() {
        let policy = SegmentPolicy::default();
        let segments = policy.split("Alice. Next Student Bob. NEXT STUDENT Carol.");
        assert_eq!(segments, vec!["Alice.", "Bob.", "Carol."]);
    }

    #[test]
    fn delimiter_does_not_match_inside_longer_words() {
        let policy = SegmentPolicy::default();
        // "next students" ends in a word boundary violation on "students"
        let segments = policy.split("the next students went home");
        assert_eq!(segments.len(), 1, "phrase embedded in a longer word must not split");
    }

    #[test]
    fn legacy_mode_lowercases_segment_text() {
        let policy = SegmentPolicy::new("next student", 0, false);
        let segments = policy.split("Alice Smith. NEXT STUDENT Bob Jones.");
        assert_eq!(segments, vec!["alice smith.", "bob jones."]);
    }

    #[test]
    fn min_length_threshold_discards_noise_segments() {
        let policy = SegmentPolicy::new("next student", 3, true);
        let segments = policy.split("um next student Robert read beautifully all term");
        assert_eq!(segments, vec!["Robert read beautifully all term"]);
    }

    #[test]
    fn splitting_is_deterministic() {
        let policy = SegmentPolicy::default();
        let input = "Alice. next student Bob.";
        assert_eq!(policy.split(input), policy.split(input));
    }

    #[test]
    fn custom_delimiter_is_escaped_literally() {
        let policy = SegmentPolicy::new("pupil+break", 0, true);
        let segments = policy.split("Alice pupil+break Bob");
        assert_eq!(segments, vec!["Alice", "Bob"]);
    }
}
