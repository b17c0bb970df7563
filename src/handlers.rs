use crate::{
    artifact::{ArtifactStream, TempArtifact},
    catalog,
    config::{self, CatalogStyle, Config, DownloadMode},
    error::AppError,
    extractor::ExtractionOptions,
    models::{
        Catalog, DirectUrlResponse, DownloadRequest, RawVideoInfo, VideoInfoRequest,
        VideoInfoResponse,
    },
    AppState,
};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use tokio_util::io::ReaderStream;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^A-Za-z0-9 ._()\[\]-]"#).unwrap());

// ===================================================================
//                          LANDING PAGE
// ===================================================================

/// # GET / - Serves the embedded landing page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

// ===================================================================
//                          CONFIG HANDLERS
// ===================================================================

/// # GET /config - Returns the current application configuration.
pub async fn get_config(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let config = state.config.read().unwrap().clone();
    Ok((StatusCode::OK, Json(config)))
}

/// # POST /config - Updates the configuration and saves it to disk.
pub async fn update_config(
    State(state): State<AppState>,
    Json(payload): Json<Config>,
) -> Result<impl IntoResponse, AppError> {
    *state.config.write().unwrap() = payload.clone();
    config::save_config(&payload).await?;
    tracing::info!("Configuration updated and saved.");
    Ok((StatusCode::OK, Json(payload)))
}

// ===================================================================
//                          VIDEO INFO HANDLER
// ===================================================================

/// # POST /get-video-info - Resolves a URL into a cleaned format catalog.
pub async fn get_video_info(
    State(state): State<AppState>,
    Json(payload): Json<VideoInfoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let url = payload.url.unwrap_or_default();
    if url.is_empty() {
        return Err(AppError::BadRequest("URL is required".to_string()));
    }
    tracing::info!("Fetching video info for URL: {}", url);

    let (opts, style) = {
        let config = state.config.read().unwrap();
        (ExtractionOptions::from_config(&config), config.catalog_style)
    };

    let info = state.extractor.extract(&url, &opts).await?;
    let title = info.title.unwrap_or_else(|| "video".to_string());

    let formats = match style {
        CatalogStyle::Full => Catalog::Full(catalog::build_catalog(&info.formats, info.duration)),
        CatalogStyle::Simple => Catalog::Simple(catalog::build_simple_catalog(&info.formats)),
    };
    let count = match &formats {
        Catalog::Full(list) => list.len(),
        Catalog::Simple(list) => list.len(),
    };
    tracing::info!("Prepared {} catalog entries for '{}'", count, title);

    Ok((
        StatusCode::OK,
        Json(VideoInfoResponse {
            title,
            duration: catalog::format_duration(info.duration),
            formats,
        }),
    ))
}

// ===================================================================
//                          DOWNLOAD HANDLER
// ===================================================================

/// # POST /download - Resolves a direct URL or streams a materialized file,
/// depending on the configured download mode.
pub async fn download(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> Result<Response, AppError> {
    let (url, format_id) = match (payload.url, payload.format_id) {
        (Some(url), Some(format_id)) if !url.is_empty() && !format_id.is_empty() => {
            (url, format_id)
        }
        _ => {
            return Err(AppError::BadRequest(
                "URL and format_id are required".to_string(),
            ))
        }
    };
    tracing::info!("Download requested: format {} of {}", format_id, url);

    let (opts, mode) = {
        let config = state.config.read().unwrap();
        (ExtractionOptions::from_config(&config), config.download_mode)
    };

    match mode {
        DownloadMode::DirectUrl => direct_url_download(&state, &url, &format_id, &opts).await,
        DownloadMode::Materialize => materialize_download(&state, &url, &format_id, &opts).await,
    }
}

/// Direct-URL strategy: find the requested format's resolved URL in the
/// extraction output, falling back once to a combined format selector.
async fn direct_url_download(
    state: &AppState,
    url: &str,
    format_id: &str,
    opts: &ExtractionOptions,
) -> Result<Response, AppError> {
    let info = state.extractor.extract(url, opts).await?;
    let title = info.title.clone().unwrap_or_else(|| "video".to_string());

    if let Some((direct_url, ext)) = find_direct_url(&info, format_id) {
        let response = DirectUrlResponse {
            url: direct_url.to_string(),
            title,
            ext: ext.to_string(),
        };
        return Ok((StatusCode::OK, Json(response)).into_response());
    }

    // Exact match missed; one retry with a merged selector before giving up.
    let selector = format!("{format_id}+bestaudio/best");
    match state.extractor.resolve_format_url(url, &selector, opts).await? {
        Some(direct_url) => {
            let response = DirectUrlResponse {
                url: direct_url,
                title,
                ext: info.ext.unwrap_or_else(|| "mp4".to_string()),
            };
            Ok((StatusCode::OK, Json(response)).into_response())
        }
        None => Err(AppError::NotFound("Could not get direct URL".to_string())),
    }
}

/// Materialize-and-stream strategy: download into a scratch directory and
/// stream the file back. The scratch space rides inside the response body
/// and is removed when the body is dropped.
async fn materialize_download(
    state: &AppState,
    url: &str,
    format_id: &str,
    opts: &ExtractionOptions,
) -> Result<Response, AppError> {
    let mut artifact = TempArtifact::new()?;
    let path = state
        .extractor
        .download(url, format_id, artifact.dir_path(), opts)
        .await?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "video.mp4".to_string());
    artifact.set_file(path.clone());

    let file = tokio::fs::File::open(&path).await?;
    let stream = ArtifactStream::new(ReaderStream::new(file), artifact);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_DISPOSITION, attachment_disposition(&filename)?);

    Ok((headers, body).into_response())
}

/// First raw descriptor matching the requested id that carries a resolved
/// media URL.
fn find_direct_url<'a>(info: &'a RawVideoInfo, format_id: &str) -> Option<(&'a str, &'a str)> {
    info.formats.iter().find_map(|f| {
        if f.format_id == format_id {
            f.url
                .as_deref()
                .map(|url| (url, f.ext.as_deref().unwrap_or("mp4")))
        } else {
            None
        }
    })
}

/// Attachment header with an ASCII-safe filename plus an RFC 5987 encoded
/// variant for titles outside ASCII.
fn attachment_disposition(filename: &str) -> Result<HeaderValue, AppError> {
    let ascii = UNSAFE_FILENAME_CHARS.replace_all(filename, "_");
    let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC);
    let value = format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}");
    Ok(HeaderValue::from_str(&value)?)
}
