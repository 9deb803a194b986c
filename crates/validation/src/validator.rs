//! Validation rules and constraints.

use std::time::Duration;

use tracing::debug;

use weavecast_protocol::{MediaSource, UploadError};

/// Default maximum file size: 500 MiB.
const DEFAULT_MAX_SIZE: u64 = 500 * 1024 * 1024;

/// Default maximum duration: one hour.
const DEFAULT_MAX_DURATION_SECS: f64 = 3600.0;

/// Default metadata probe timeout.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepted video container types.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-matroska",
];

/// Aspect ratios outside this range are rejected as unlikely to render
/// correctly.
const ASPECT_RATIO_RANGE: (f64, f64) = (0.1, 10.0);

/// Validation constraints, all with sane defaults.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub max_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub max_duration_secs: f64,
    pub probe_timeout: Duration,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE,
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Outcome of successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidFile {
    pub size: u64,
    pub mime_type: String,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Formats a byte count for humans: `600.0 MiB`, `1.5 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[(&str, u64)] = &[
        ("GiB", 1024 * 1024 * 1024),
        ("MiB", 1024 * 1024),
        ("KiB", 1024),
    ];
    for (unit, scale) in UNITS {
        if bytes >= *scale {
            return format!("{:.1} {unit}", bytes as f64 / *scale as f64);
        }
    }
    format!("{bytes} B")
}

/// Validates a media source against the constraints.
///
/// Rules run in order and short-circuit on the first failure: empty,
/// oversized, unsupported type, unreadable metadata (bounded by
/// `probe_timeout`), overlong, zero dimensions, extreme aspect ratio.
pub async fn validate(
    source: &dyn MediaSource,
    constraints: &Constraints,
) -> Result<ValidFile, UploadError> {
    let size = source.size();
    if size == 0 {
        return Err(UploadError::validation(
            "File is empty",
            "Select a video file with content",
        ));
    }

    if size > constraints.max_size_bytes {
        return Err(UploadError::validation(
            format!(
                "File is too large: {} exceeds the {} limit",
                format_bytes(size),
                format_bytes(constraints.max_size_bytes)
            ),
            "Compress the video or trim it to fit under the size limit",
        ));
    }

    let mime = source.mime_type();
    if !constraints.allowed_mime_types.iter().any(|m| m == mime) {
        return Err(UploadError::validation(
            format!(
                "Unsupported file type: {mime}. Supported types: {}",
                constraints.allowed_mime_types.join(", ")
            ),
            "Convert the video to a supported format",
        ));
    }

    let metadata = match tokio::time::timeout(constraints.probe_timeout, source.probe()).await {
        Ok(Ok(metadata)) => metadata,
        Ok(Err(e)) => {
            debug!(file = source.file_name(), error = %e, "metadata probe failed");
            return Err(UploadError::validation(
                "Could not read media metadata; the file may be corrupted or unreadable",
                "Re-export the video and try again",
            ));
        }
        Err(_) => {
            debug!(file = source.file_name(), "metadata probe timed out");
            return Err(UploadError::validation(
                "Could not read media metadata; the file may be corrupted or unreadable",
                "Re-export the video and try again",
            ));
        }
    };

    if metadata.duration_secs > constraints.max_duration_secs {
        return Err(UploadError::validation(
            format!(
                "Video is too long: {:.0} s exceeds the {:.0} s limit",
                metadata.duration_secs, constraints.max_duration_secs
            ),
            "Trim the video to fit under the duration limit",
        ));
    }

    if metadata.width == 0 || metadata.height == 0 {
        return Err(UploadError::validation(
            "Video dimensions could not be determined; the file may be corrupted",
            "Re-export the video and try again",
        ));
    }

    let aspect = metadata.aspect_ratio();
    if aspect < ASPECT_RATIO_RANGE.0 || aspect > ASPECT_RATIO_RANGE.1 {
        return Err(UploadError::validation(
            format!("Unusual aspect ratio ({aspect:.2}); the video may not render correctly"),
            "Check the video dimensions before uploading",
        ));
    }

    debug!(
        file = source.file_name(),
        size,
        mime,
        duration_secs = metadata.duration_secs,
        "file validated"
    );

    Ok(ValidFile {
        size,
        mime_type: mime.to_string(),
        duration_secs: metadata.duration_secs,
        width: metadata.width,
        height: metadata.height,
    })
}
