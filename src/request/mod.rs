use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::ConverterError;

/// Longest segment a single request may ask for (2 hours).
pub const MAX_SEGMENT_SECONDS: i64 = 7200;

/// Raw invocation payload, straight from the event JSON.
///
/// Times arrive either as strings ("1:02:03", "45") or as bare numbers;
/// `MediaRequest::from_event` turns this into a validated request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionEvent {
    pub youtube_url: String,
    pub start_time: TimeField,
    pub end_time: TimeField,
    #[serde(default)]
    pub bitrate: Option<String>,
}

/// A time expression as it appears in the event JSON: string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimeField {
    Number(f64),
    Text(String),
}

/// Convert a time expression to whole seconds.
///
/// Strings accept 1-3 colon-separated non-negative integer fields
/// ("SS", "MM:SS", "HH:MM:SS"); numbers are truncated toward zero.
pub fn parse_time(input: &TimeField) -> Result<i64, ConverterError> {
    match input {
        TimeField::Number(n) => Ok(n.trunc() as i64),
        TimeField::Text(s) => parse_time_str(s),
    }
}

/// String form of [`parse_time`], used directly by the CLI arguments.
pub fn parse_time_str(time_str: &str) -> Result<i64, ConverterError> {
    let trimmed = time_str.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();

    if parts.len() > 3 {
        return Err(ConverterError::InvalidTimeFormat(format!(
            "'{}' has more than 3 colon-separated fields",
            trimmed
        )));
    }

    let mut fields = Vec::with_capacity(parts.len());
    for part in &parts {
        let value: i64 = part.trim().parse::<u32>().map(i64::from).map_err(|_| {
            ConverterError::InvalidTimeFormat(format!(
                "could not parse '{}' in '{}' as a non-negative integer",
                part, trimmed
            ))
        })?;
        fields.push(value);
    }

    Ok(match fields.as_slice() {
        [hours, minutes, seconds] => hours * 3600 + minutes * 60 + seconds,
        [minutes, seconds] => minutes * 60 + seconds,
        [seconds] => *seconds,
        _ => unreachable!("split always yields at least one field"),
    })
}

/// Supported MP3 bitrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
pub enum Bitrate {
    #[serde(rename = "64k")]
    #[value(name = "64k")]
    Kbps64,
    #[default]
    #[serde(rename = "96k")]
    #[value(name = "96k")]
    Kbps96,
    #[serde(rename = "128k")]
    #[value(name = "128k")]
    Kbps128,
    #[serde(rename = "160k")]
    #[value(name = "160k")]
    Kbps160,
    #[serde(rename = "192k")]
    #[value(name = "192k")]
    Kbps192,
}

impl Bitrate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bitrate::Kbps64 => "64k",
            Bitrate::Kbps96 => "96k",
            Bitrate::Kbps128 => "128k",
            Bitrate::Kbps160 => "160k",
            Bitrate::Kbps192 => "192k",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "64k" => Some(Bitrate::Kbps64),
            "96k" => Some(Bitrate::Kbps96),
            "128k" => Some(Bitrate::Kbps128),
            "160k" => Some(Bitrate::Kbps160),
            "192k" => Some(Bitrate::Kbps192),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated conversion request. Immutable once constructed; invariants:
/// `0 <= start_seconds < end_seconds` and the span is at most 2 hours.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub source_url: String,
    pub start_seconds: i64,
    pub end_seconds: i64,
    pub bitrate: Bitrate,
}

impl MediaRequest {
    /// Validate and parse a raw invocation event. `default_bitrate` is used
    /// when the event does not name one.
    pub fn from_event(
        event: &ConversionEvent,
        default_bitrate: Bitrate,
    ) -> Result<Self, ConverterError> {
        let start_seconds = parse_time(&event.start_time)?;
        let end_seconds = parse_time(&event.end_time)?;

        let bitrate = match event.bitrate.as_deref() {
            None => default_bitrate,
            Some(label) => Bitrate::from_label(label).ok_or_else(|| {
                ConverterError::Validation(format!(
                    "Unsupported bitrate '{}' (expected one of 64k, 96k, 128k, 160k, 192k)",
                    label
                ))
            })?,
        };

        Self::build(&event.youtube_url, start_seconds, end_seconds, bitrate)
    }

    /// Build a request from CLI arguments.
    pub fn from_parts(
        url: &str,
        start: &str,
        end: &str,
        bitrate: Bitrate,
    ) -> Result<Self, ConverterError> {
        let start_seconds = parse_time_str(start)?;
        let end_seconds = parse_time_str(end)?;
        Self::build(url, start_seconds, end_seconds, bitrate)
    }

    fn build(
        url: &str,
        start_seconds: i64,
        end_seconds: i64,
        bitrate: Bitrate,
    ) -> Result<Self, ConverterError> {
        let source_url = url.trim().to_string();
        if source_url.is_empty() {
            return Err(ConverterError::Validation(
                "youtube_url cannot be empty".to_string(),
            ));
        }

        let url_lower = source_url.to_lowercase();
        if !url_lower.contains("youtube.com") && !url_lower.contains("youtu.be") {
            return Err(ConverterError::Validation(format!(
                "Invalid YouTube URL: {}",
                source_url
            )));
        }

        if start_seconds < 0 {
            return Err(ConverterError::Validation(format!(
                "Start time ({}s) cannot be negative",
                start_seconds
            )));
        }

        if start_seconds >= end_seconds {
            return Err(ConverterError::Validation(format!(
                "Start time ({}s) must be before end time ({}s)",
                start_seconds, end_seconds
            )));
        }

        if end_seconds - start_seconds > MAX_SEGMENT_SECONDS {
            return Err(ConverterError::Validation(
                "Audio segment too long (max 2 hours)".to_string(),
            ));
        }

        Ok(Self {
            source_url,
            start_seconds,
            end_seconds,
            bitrate,
        })
    }

    /// Length of the requested segment in seconds.
    pub fn duration_seconds(&self) -> i64 {
        self.end_seconds - self.start_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(url: &str, start: TimeField, end: TimeField, bitrate: Option<&str>) -> ConversionEvent {
        ConversionEvent {
            youtube_url: url.to_string(),
            start_time: start,
            end_time: end,
            bitrate: bitrate.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time_str("45").unwrap(), 45);
        assert_eq!(parse_time_str("2:03").unwrap(), 123);
        assert_eq!(parse_time_str("1:02:03").unwrap(), 3723);
        assert_eq!(parse_time_str("  0:10 ").unwrap(), 10);
        assert_eq!(parse_time_str("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_time_rejects_bad_formats() {
        assert!(parse_time_str("1:2:3:4").is_err());
        assert!(parse_time_str("abc").is_err());
        assert!(parse_time_str("4.5").is_err());
        assert!(parse_time_str("1:-2").is_err());
        assert!(parse_time_str("").is_err());
        assert!(matches!(
            parse_time_str("xx:10"),
            Err(ConverterError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn test_parse_time_truncates_numbers() {
        assert_eq!(parse_time(&TimeField::Number(90.9)).unwrap(), 90);
        assert_eq!(parse_time(&TimeField::Number(45.0)).unwrap(), 45);
    }

    #[test]
    fn test_time_field_deserializes_both_shapes() {
        let from_number: TimeField = serde_json::from_str("630").unwrap();
        assert_eq!(parse_time(&from_number).unwrap(), 630);

        let from_string: TimeField = serde_json::from_str("\"10:30\"").unwrap();
        assert_eq!(parse_time(&from_string).unwrap(), 630);
    }

    #[test]
    fn test_rejects_start_after_end() {
        let result = MediaRequest::from_event(
            &event(
                "https://youtube.com/watch?v=X",
                TimeField::Number(90.0),
                TimeField::Number(30.0),
                None,
            ),
            Bitrate::default(),
        );
        assert!(matches!(result, Err(ConverterError::Validation(_))));
    }

    #[test]
    fn test_rejects_equal_start_and_end() {
        let result = MediaRequest::from_parts(
            "https://youtube.com/watch?v=X",
            "1:00",
            "1:00",
            Bitrate::Kbps96,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_span_over_two_hours() {
        let result = MediaRequest::from_parts(
            "https://youtube.com/watch?v=X",
            "0",
            "2:00:01",
            Bitrate::Kbps96,
        );
        assert!(result.is_err());

        // Exactly two hours is still allowed
        let result = MediaRequest::from_parts(
            "https://youtube.com/watch?v=X",
            "0",
            "2:00:00",
            Bitrate::Kbps96,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_non_youtube_url() {
        let result = MediaRequest::from_parts(
            "https://vimeo.com/12345",
            "0:10",
            "0:30",
            Bitrate::Kbps96,
        );
        assert!(matches!(result, Err(ConverterError::Validation(_))));
    }

    #[test]
    fn test_accepts_short_youtube_url() {
        let request =
            MediaRequest::from_parts("https://youtu.be/abc123", "0:10", "0:30", Bitrate::Kbps96)
                .unwrap();
        assert_eq!(request.duration_seconds(), 20);
    }

    #[test]
    fn test_rejects_unknown_bitrate() {
        let result = MediaRequest::from_event(
            &event(
                "https://youtube.com/watch?v=X",
                TimeField::Number(0.0),
                TimeField::Number(10.0),
                Some("320k"),
            ),
            Bitrate::default(),
        );
        assert!(matches!(result, Err(ConverterError::Validation(_))));
    }

    #[test]
    fn test_default_bitrate_is_96k() {
        let request = MediaRequest::from_event(
            &event(
                "https://youtube.com/watch?v=X",
                TimeField::Number(0.0),
                TimeField::Number(10.0),
                None,
            ),
            Bitrate::Kbps96,
        )
        .unwrap();
        assert_eq!(request.bitrate, Bitrate::Kbps96);
    }
}
