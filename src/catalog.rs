use crate::models::{DisplayFormat, RawFormat, SimpleFormat};
use std::collections::HashSet;

/// Renders a duration in seconds as "M:SS". Non-finite or missing durations
/// collapse to "0:00" instead of faulting.
pub fn format_duration(duration: Option<f64>) -> String {
    let secs = match duration {
        Some(d) if d.is_finite() && d > 0.0 => d as u64,
        _ => 0,
    };
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Turns one raw format descriptor into a display-ready one, or rejects it.
///
/// Rejected: storyboard image tracks, audio-only descriptors, and anything
/// left with neither a usable resolution nor a quality note.
pub fn normalize_format(raw: &RawFormat, media_duration: Option<f64>) -> Option<DisplayFormat> {
    let note = raw.format_note.clone().unwrap_or_default();
    if note.starts_with("storyboard") || !raw.has_video() {
        return None;
    }

    let resolution = match (raw.width, raw.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => format!("{}x{}", w, h),
        _ if !note.is_empty() => note.clone(),
        _ => "unknown".to_string(),
    };

    if resolution == "unknown" && note.is_empty() {
        return None;
    }

    Some(DisplayFormat {
        format_id: raw.format_id.clone(),
        ext: raw.ext.clone().unwrap_or_else(|| "mp4".to_string()),
        resolution,
        filesize: human_filesize(raw, media_duration),
        fps: raw.fps.unwrap_or(30.0),
        tbr: human_bitrate(raw.tbr),
        format_note: note,
        vcodec: codec_short_name(raw.vcodec.as_deref()),
        acodec: codec_short_name(raw.acodec.as_deref()),
    })
}

/// Normalizes every descriptor and orders the survivors by descending
/// resolution height. Descriptors without a parseable height sort last.
pub fn build_catalog(formats: &[RawFormat], media_duration: Option<f64>) -> Vec<DisplayFormat> {
    let mut catalog: Vec<DisplayFormat> = formats
        .iter()
        .filter_map(|f| normalize_format(f, media_duration))
        .collect();
    // sort_by is stable: equal heights keep their original relative order
    catalog.sort_by(|a, b| {
        resolution_height(&b.resolution).cmp(&resolution_height(&a.resolution))
    });
    catalog
}

/// The lighter catalog: drop audio-only descriptors, dedupe on the quality
/// label (first occurrence wins), keep the extractor's ordering.
pub fn build_simple_catalog(formats: &[RawFormat]) -> Vec<SimpleFormat> {
    let mut seen = HashSet::new();
    formats
        .iter()
        .filter(|f| f.has_video())
        .filter_map(|f| {
            let quality = f.format_note.clone().unwrap_or_default();
            if !seen.insert(quality.clone()) {
                return None;
            }
            Some(SimpleFormat {
                format_id: f.format_id.clone(),
                quality,
                ext: f.ext.clone().unwrap_or_else(|| "mp4".to_string()),
            })
        })
        .collect()
}

/// Height component of a "{w}x{h}" resolution string; 0 when there is no
/// parseable height (note-only resolutions).
fn resolution_height(resolution: &str) -> u32 {
    resolution
        .split_once('x')
        .and_then(|(_, h)| h.parse().ok())
        .unwrap_or(0)
}

fn human_filesize(raw: &RawFormat, media_duration: Option<f64>) -> String {
    let bytes = raw
        .filesize
        .filter(|b| *b > 0.0)
        .or(raw.filesize_approx.filter(|b| *b > 0.0));
    if let Some(bytes) = bytes {
        let mb = (bytes / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        return format!("{} MB", mb);
    }

    // m3u8 streams carry no size; estimate from bitrate and duration
    let duration = raw.duration.or(media_duration);
    match (raw.tbr, duration) {
        (Some(tbr), Some(duration)) if tbr > 0.0 && duration > 0.0 => {
            let estimated = (tbr * 128.0) * duration / 8192.0;
            format!("~{:.2} MB", estimated)
        }
        _ => "Unknown size".to_string(),
    }
}

fn human_bitrate(tbr: Option<f64>) -> String {
    match tbr {
        Some(tbr) if tbr >= 1000.0 => format!("{:.1}Mbps", tbr / 1000.0),
        Some(tbr) if tbr > 0.0 => format!("{}Kbps", tbr as u64),
        _ => String::new(),
    }
}

/// "avc1.640028" -> "avc1"; absent codecs render empty.
fn codec_short_name(codec: Option<&str>) -> String {
    codec
        .and_then(|c| c.split('.').next())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_format(id: &str) -> RawFormat {
        RawFormat {
            format_id: id.to_string(),
            vcodec: Some("avc1.640028".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            ext: Some("mp4".to_string()),
            ..RawFormat::default()
        }
    }

    #[test]
    fn rejects_audio_only_descriptors() {
        let mut raw = video_format("140");
        raw.vcodec = Some("none".to_string());
        raw.format_note = Some("medium".to_string());
        assert!(normalize_format(&raw, None).is_none());
    }

    #[test]
    fn rejects_storyboards_regardless_of_other_fields() {
        let mut raw = video_format("sb0");
        raw.format_note = Some("storyboard".to_string());
        raw.width = Some(160);
        raw.height = Some(90);
        assert!(normalize_format(&raw, None).is_none());
    }

    #[test]
    fn rejects_descriptors_with_no_resolution_and_no_note() {
        let raw = video_format("x");
        assert!(normalize_format(&raw, None).is_none());
    }

    #[test]
    fn renders_resolution_from_dimensions() {
        let mut raw = video_format("137");
        raw.width = Some(1920);
        raw.height = Some(1080);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.resolution, "1920x1080");
    }

    #[test]
    fn zero_dimensions_fall_back_to_the_note() {
        let mut raw = video_format("hls-1");
        raw.width = Some(0);
        raw.height = Some(0);
        raw.format_note = Some("720p".to_string());
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.resolution, "720p");
    }

    #[test]
    fn exact_filesize_beats_approximate() {
        let mut raw = video_format("137");
        raw.height = Some(1080);
        raw.width = Some(1920);
        raw.filesize = Some(10.0 * 1024.0 * 1024.0);
        raw.filesize_approx = Some(99.0 * 1024.0 * 1024.0);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.filesize, "10 MB");
    }

    #[test]
    fn approximate_filesize_rounds_to_two_decimals() {
        let mut raw = video_format("137");
        raw.width = Some(1280);
        raw.height = Some(720);
        raw.filesize_approx = Some(10.555 * 1024.0 * 1024.0);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.filesize, "10.56 MB");
    }

    #[test]
    fn estimates_size_from_bitrate_and_duration() {
        let mut raw = video_format("hls-720");
        raw.width = Some(1280);
        raw.height = Some(720);
        raw.tbr = Some(1000.0);
        raw.duration = Some(8192.0);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.filesize, "~128000.00 MB");
    }

    #[test]
    fn estimation_uses_media_duration_when_descriptor_has_none() {
        let mut raw = video_format("hls-720");
        raw.width = Some(1280);
        raw.height = Some(720);
        raw.tbr = Some(1000.0);
        let display = normalize_format(&raw, Some(8192.0)).unwrap();
        assert_eq!(display.filesize, "~128000.00 MB");
    }

    #[test]
    fn size_is_unknown_without_bitrate_or_duration() {
        let mut raw = video_format("22");
        raw.width = Some(1280);
        raw.height = Some(720);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.filesize, "Unknown size");
    }

    #[test]
    fn bitrate_rendering() {
        assert_eq!(human_bitrate(Some(1500.0)), "1.5Mbps");
        assert_eq!(human_bitrate(Some(500.0)), "500Kbps");
        assert_eq!(human_bitrate(None), "");
    }

    #[test]
    fn codec_short_names_strip_profile_tags() {
        let mut raw = video_format("137");
        raw.width = Some(1920);
        raw.height = Some(1080);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.vcodec, "avc1");
        assert_eq!(display.acodec, "mp4a");
    }

    #[test]
    fn missing_fps_defaults_to_30() {
        let mut raw = video_format("137");
        raw.width = Some(1920);
        raw.height = Some(1080);
        let display = normalize_format(&raw, None).unwrap();
        assert_eq!(display.fps, 30.0);
    }

    #[test]
    fn catalog_sorts_by_descending_height_with_note_items_last() {
        let mut a = video_format("a");
        a.width = Some(854);
        a.height = Some(480);
        let mut b = video_format("b");
        b.width = Some(1920);
        b.height = Some(1080);
        let mut c = video_format("c");
        c.width = Some(1280);
        c.height = Some(720);
        let mut d = video_format("d");
        d.format_note = Some("low".to_string());

        let catalog = build_catalog(&[a, b, c, d], None);
        let ids: Vec<&str> = catalog.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a", "d"]);
    }

    #[test]
    fn catalog_sort_is_stable_for_equal_heights() {
        let mut first = video_format("first");
        first.width = Some(1280);
        first.height = Some(720);
        first.fps = Some(30.0);
        let mut second = video_format("second");
        second.width = Some(1280);
        second.height = Some(720);
        second.fps = Some(60.0);
        let mut top = video_format("top");
        top.width = Some(1920);
        top.height = Some(1080);

        let catalog = build_catalog(&[first, second, top], None);
        let ids: Vec<&str> = catalog.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, ["top", "first", "second"]);
    }

    #[test]
    fn empty_format_list_yields_empty_catalog() {
        assert!(build_catalog(&[], Some(100.0)).is_empty());
    }

    #[test]
    fn simple_catalog_dedupes_on_quality_first_wins() {
        let mut a = video_format("a");
        a.format_note = Some("720p".to_string());
        let mut b = video_format("b");
        b.format_note = Some("720p".to_string());
        let mut c = video_format("c");
        c.format_note = Some("1080p".to_string());
        let mut audio = video_format("d");
        audio.vcodec = Some("none".to_string());
        audio.format_note = Some("audio".to_string());

        let catalog = build_simple_catalog(&[a, b, c, audio]);
        let ids: Vec<&str> = catalog.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(catalog[0].quality, "720p");
        assert_eq!(catalog[1].quality, "1080p");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Some(125.0)), "2:05");
        assert_eq!(format_duration(Some(59.0)), "0:59");
        assert_eq!(format_duration(None), "0:00");
    }
}
