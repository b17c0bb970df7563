use serde::{Deserialize, Serialize};

// === API Request Models ===

/// The JSON body for a `POST /get-video-info` request.
///
/// `url` is Option so that a missing field reaches our own validation
/// instead of a deserializer rejection.
#[derive(Deserialize, Debug)]
pub struct VideoInfoRequest {
    pub url: Option<String>,
}

/// The JSON body for a `POST /download` request.
#[derive(Deserialize, Debug)]
pub struct DownloadRequest {
    pub url: Option<String>,
    pub format_id: Option<String>,
}

// === Extractor Output Models ===

/// Top-level JSON produced by `yt-dlp --dump-single-json`.
///
/// Everything except the format list is optional; an absent `formats` key
/// yields an empty catalog rather than an error.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RawVideoInfo {
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub ext: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One raw format descriptor as reported by the extractor.
///
/// This is a loosely-typed structure from an external tool: only
/// `format_id` is guaranteed. Sizes are f64 because yt-dlp emits
/// `filesize_approx` as a float for some sites.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub format_note: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    /// Total bitrate in KBit/s.
    pub tbr: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub duration: Option<f64>,
    pub url: Option<String>,
}

impl RawFormat {
    /// Audio-only descriptors report the literal "none" as their video codec.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }
}

// === API Response Models ===

/// A cleaned, display-ready projection of one raw format descriptor.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DisplayFormat {
    pub format_id: String,
    pub ext: String,
    pub resolution: String,
    pub filesize: String,
    pub fps: f64,
    pub tbr: String,
    pub format_note: String,
    pub vcodec: String,
    pub acodec: String,
}

/// The lighter catalog entry: identifier, quality label and container only.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SimpleFormat {
    pub format_id: String,
    pub quality: String,
    pub ext: String,
}

/// The format list of a `/get-video-info` response, in whichever shape the
/// configured catalog style produced.
#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum Catalog {
    Full(Vec<DisplayFormat>),
    Simple(Vec<SimpleFormat>),
}

/// The body of a successful `POST /get-video-info` response.
#[derive(Serialize, Debug)]
pub struct VideoInfoResponse {
    pub title: String,
    /// Rendered as "M:SS".
    pub duration: String,
    pub formats: Catalog,
}

/// The body of a successful direct-URL `POST /download` response.
#[derive(Serialize, Debug)]
pub struct DirectUrlResponse {
    pub url: String,
    pub title: String,
    pub ext: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_format_json_deserializes_with_defaults() {
        let raw: RawFormat = serde_json::from_str(r#"{"format_id": "18"}"#).unwrap();
        assert_eq!(raw.format_id, "18");
        assert_eq!(raw.ext, None);
        assert_eq!(raw.width, None);
        assert!(raw.has_video());
    }

    #[test]
    fn null_fields_read_as_absent() {
        let raw: RawFormat = serde_json::from_str(
            r#"{"format_id": "137", "width": null, "height": 1080, "vcodec": "avc1.640028"}"#,
        )
        .unwrap();
        assert_eq!(raw.width, None);
        assert_eq!(raw.height, Some(1080));
    }

    #[test]
    fn audio_only_has_no_video() {
        let raw: RawFormat = serde_json::from_str(
            r#"{"format_id": "140", "vcodec": "none", "acodec": "mp4a.40.2"}"#,
        )
        .unwrap();
        assert!(!raw.has_video());
    }

    #[test]
    fn info_without_formats_key_yields_empty_list() {
        let info: RawVideoInfo =
            serde_json::from_str(r#"{"title": "clip", "duration": 125.0}"#).unwrap();
        assert!(info.formats.is_empty());
        assert_eq!(info.title.as_deref(), Some("clip"));
    }

    #[test]
    fn approx_filesize_accepts_floats() {
        let raw: RawFormat =
            serde_json::from_str(r#"{"format_id": "hls-720", "filesize_approx": 10485760.5}"#)
                .unwrap();
        assert_eq!(raw.filesize_approx, Some(10_485_760.5));
    }
}
