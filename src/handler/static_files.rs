//! Static file serving module
//!
//! Resolves the request path inside the root directory and answers with the
//! file, an index file, a directory listing, or an error status.

use hyper::body::Bytes;
use std::path::Path;
use tokio::fs;

use super::listing;
use super::path::{self, ResolveError, ResolvedPath};
use super::router::RequestContext;
use crate::config::AppState;
use crate::http::{self, encoding, mime, HttpResponse, RangeParseResult, Validators};
use crate::logger;

/// Serve whatever the request path maps to below the root directory
pub async fn serve(ctx: &RequestContext<'_>, state: &AppState) -> HttpResponse {
    let segments = match path::decode_segments(ctx.path) {
        Ok(segments) => segments,
        Err(err) => return error_response(ctx, err),
    };

    match path::resolve(&state.root, &segments).await {
        Ok(target) if target.is_dir() => serve_directory(ctx, state, &segments, &target).await,
        Ok(target) => serve_file(ctx, &target).await,
        Err(err) => error_response(ctx, err),
    }
}

/// Canonical slash-terminated URL of a directory, rebuilt from its segments
///
/// Never starts with `//`, which a browser would read as another host.
fn directory_location(segments: &[String], query: Option<&str>) -> String {
    let mut location = String::from("/");
    for segment in segments {
        location.push_str(&encoding::percent_encode_segment(segment));
        location.push('/');
    }
    if let Some(q) = query {
        location.push('?');
        location.push_str(q);
    }
    location
}

/// Directory: redirect to the slash form, then index file, then listing
async fn serve_directory(
    ctx: &RequestContext<'_>,
    state: &AppState,
    segments: &[String],
    dir: &ResolvedPath,
) -> HttpResponse {
    if !ctx.path.ends_with('/') {
        return http::build_redirect_response(&directory_location(segments, ctx.query));
    }

    for index_file in &state.config.http.index_files {
        match path::confine(&state.root, &dir.path.join(index_file)).await {
            Ok(index) if !index.is_dir() => return serve_file(ctx, &index).await,
            Ok(_) | Err(ResolveError::NotFound) => {}
            Err(err) => return error_response(ctx, err),
        }
    }

    if !state.config.http.directory_listing {
        return http::build_404_response(ctx.is_head);
    }

    serve_listing(ctx, &dir.path).await
}

async fn serve_listing(ctx: &RequestContext<'_>, dir: &Path) -> HttpResponse {
    let entries = match listing::read_entries(dir).await {
        Ok(entries) => entries,
        Err(e) => return error_response(ctx, ResolveError::from(e)),
    };

    // decode_segments already accepted this path, so decoding succeeds
    let display_path = encoding::percent_decode(ctx.path)
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_else(|| ctx.path.to_string());

    http::response::build_html_response(listing::render(&display_path, &entries), ctx.is_head)
}

/// Read and send a regular file, honouring conditional and range headers
async fn serve_file(ctx: &RequestContext<'_>, file: &ResolvedPath) -> HttpResponse {
    let data = match fs::read(&file.path).await {
        Ok(data) => data,
        Err(e) => return error_response(ctx, ResolveError::from(e)),
    };

    let total_size = data.len() as u64;
    let validators = Validators::new(total_size, file.metadata.modified().ok());
    let content_type = mime::content_type_for(&file.path);

    if validators.is_not_modified(ctx.if_none_match, ctx.if_modified_since) {
        return http::build_304_response(&validators);
    }

    match http::parse_range_header(ctx.range_header, total_size) {
        RangeParseResult::Valid(range) => {
            let body = if ctx.is_head {
                Bytes::new()
            } else {
                // Bounds come from parse_range_header, clamped to total_size
                #[allow(clippy::cast_possible_truncation)]
                let (start, end) = (range.start as usize, range.end as usize);
                Bytes::from(data).slice(start..=end)
            };
            http::response::build_partial_response(
                body,
                content_type,
                &validators,
                range,
                total_size,
                ctx.is_head,
            )
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(total_size),
        RangeParseResult::None => {
            http::response::build_file_response(Bytes::from(data), content_type, &validators, ctx.is_head)
        }
    }
}

/// Map a resolution failure onto its status code, logging the unexpected ones
fn error_response(ctx: &RequestContext<'_>, err: ResolveError) -> HttpResponse {
    match err {
        ResolveError::BadRequest => http::build_400_response(),
        ResolveError::Forbidden => {
            logger::log_warning(&format!("Path traversal attempt blocked: {}", ctx.path));
            http::build_403_response(ctx.is_head)
        }
        ResolveError::NotFound => http::build_404_response(ctx.is_head),
        ResolveError::Io(e) => {
            logger::log_error(&format!("Failed to serve '{}': {e}", ctx.path));
            http::build_500_response(ctx.is_head)
        }
    }
}
