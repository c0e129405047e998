//! Static file serving module
//!
//! Local files, synthesized listings, stubs and index pages. Files are read only
//! as far as the requested window; every other body is buffered and windowed by
//! the range reconciler.

use crate::config::StubRule;
use crate::handler::{listing, resolver};
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, Body};
use crate::logger;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Serve a file from disk with `Range` and `If-Modified-Since` support
pub async fn serve_file(ctx: &RequestContext<'_>, path: &Path) -> Response<Body> {
    let mut file = match File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            logger::log_debug(&format!("Cannot open '{}': {e}", path.display()));
            return http::build_404_response();
        }
    };
    let metadata = match file.metadata().await {
        Ok(m) => m,
        Err(e) => {
            logger::log_warning(&format!("Cannot stat '{}': {e}", path.display()));
            return http::build_404_response();
        }
    };

    let total = metadata.len();
    let modified = metadata.modified().ok();
    let last_modified = modified.map(cache::format_http_date);

    if ctx.range_header.is_none() {
        if let (Some(mtime), Some(lm)) = (modified, last_modified.as_deref()) {
            if cache::not_modified_since(ctx.if_modified_since.as_deref(), mtime) {
                return http::build_304_response(lm);
            }
        }
    }

    let content_type = mime::get_content_type(path.extension().and_then(|e| e.to_str()));
    let headers = http::representation_headers(content_type, last_modified.as_deref());

    match http::parse_range_header(ctx.range_header.as_deref(), total) {
        Err(unsatisfiable) => http::build_416_response(unsatisfiable.total),
        Ok(Some(range)) => {
            let body = if ctx.is_head {
                None
            } else {
                match read_window(&mut file, range.start(), range.len()).await {
                    Ok(data) => Some(data),
                    Err(e) => {
                        logger::log_error(&format!(
                            "Failed to read '{}' bytes {}-{}: {e}",
                            path.display(),
                            range.start(),
                            range.end()
                        ));
                        return http::build_404_response();
                    }
                }
            };
            http::build_sized_response(
                StatusCode::PARTIAL_CONTENT,
                headers,
                range.len(),
                Some(&range),
                body,
            )
        }
        Ok(None) => {
            let body = if ctx.is_head {
                None
            } else {
                let mut data = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
                if let Err(e) = file.read_to_end(&mut data).await {
                    logger::log_error(&format!("Failed to read '{}': {e}", path.display()));
                    return http::build_404_response();
                }
                Some(Bytes::from(data))
            };
            http::build_sized_response(StatusCode::OK, headers, total, None, body)
        }
    }
}

async fn read_window(file: &mut File, start: u64, len: u64) -> std::io::Result<Bytes> {
    let len = usize::try_from(len)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "window too large"))?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// Serve a buffered body, windowed against its own length
pub fn serve_bytes(ctx: &RequestContext<'_>, body: Bytes, headers: HeaderMap) -> Response<Body> {
    let reconciled = http::reconcile(body, ctx.range_spec(), StatusCode::OK, true);
    http::build_bytes_response(reconciled, headers, ctx.is_head)
}

/// Serve the newline-separated listing of `dir`
pub async fn serve_listing(
    ctx: &RequestContext<'_>,
    dir: &Path,
    listing_name: &str,
) -> Response<Body> {
    let entries = match listing::read_entries(dir, listing_name).await {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warning(&format!("Cannot list '{}': {e}", dir.display()));
            return http::build_404_response();
        }
    };
    let last_modified = dir_last_modified(dir).await;

    let text = listing::listing_text(&entries);
    let headers =
        http::representation_headers("text/plain; charset=utf-8", last_modified.as_deref());
    serve_bytes(ctx, Bytes::from(text), headers)
}

/// Serve a fixed-content stub
pub fn serve_stub(ctx: &RequestContext<'_>, stub: &StubRule) -> Response<Body> {
    let headers = http::representation_headers(&stub.content_type, None);
    serve_bytes(ctx, Bytes::from(stub.body.clone()), headers)
}

/// Serve an HTML index page for a directory without an index file
pub async fn serve_autoindex(
    ctx: &RequestContext<'_>,
    dir: &Path,
    listing_name: &str,
) -> Response<Body> {
    let entries = match listing::read_entries(dir, listing_name).await {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warning(&format!("Cannot list '{}': {e}", dir.display()));
            return http::build_404_response();
        }
    };
    let last_modified = dir_last_modified(dir).await;

    let html = listing::autoindex_html(&resolver::decode(ctx.path), &entries);
    let headers =
        http::representation_headers("text/html; charset=utf-8", last_modified.as_deref());
    serve_bytes(ctx, Bytes::from(html), headers)
}

async fn dir_last_modified(dir: &Path) -> Option<String> {
    fs::metadata(dir)
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(cache::format_http_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header;

    fn ctx<'a>(path: &'a str, range: Option<&str>, is_head: bool) -> RequestContext<'a> {
        RequestContext {
            path,
            query: None,
            is_head,
            range_header: range.map(ToString::to_string),
            if_modified_since: None,
        }
    }

    async fn body_bytes(resp: Response<Body>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    fn sample(dir: &tempfile::TempDir, len: usize) -> std::path::PathBuf {
        let path = dir.path().join("video.bin");
        let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn test_range_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample(&dir, 1000);
        let resp = serve_file(&ctx("/video.bin", Some("bytes=500-599"), false), &path).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 500-599/1000");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/octet-stream");
        let body = body_bytes(resp).await;
        let expected: Vec<u8> = (500..600).map(|i| (i % 256) as u8).collect();
        assert_eq!(body.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample(&dir, 50);
        let resp = serve_file(&ctx("/video.bin", Some("bytes=100-200"), false), &path).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes */50");
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_reports_length_without_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample(&dir, 1000);
        let resp = serve_file(&ctx("/video.bin", None, true), &path).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "1000");
        assert!(resp.headers().contains_key(header::LAST_MODIFIED));
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample(&dir, 10);
        let mut c = ctx("/video.bin", None, false);
        c.if_modified_since = Some("Fri, 01 Jan 2100 00:00:00 GMT".to_string());
        let resp = serve_file(&c, &path).await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

        c.range_header = Some("bytes=0-1".to_string());
        let resp = serve_file(&c, &path).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let resp = serve_file(&ctx("/x", None, false), &dir.path().join("x")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_with_range() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.txt", "a.txt", "B.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let resp = serve_listing(&ctx("/index.list", None, false), dir.path(), "index.list").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_bytes(resp).await.as_ref(), b"a.txt\nB.txt\nc.txt\n");

        let resp = serve_listing(
            &ctx("/index.list", Some("bytes=0-4"), false),
            dir.path(),
            "index.list",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 0-4/18");
        assert_eq!(body_bytes(resp).await.as_ref(), b"a.txt");
    }

    #[tokio::test]
    async fn test_autoindex_honors_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let resp = serve_autoindex(&ctx("/dir/", None, false), dir.path(), "index.list").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(resp.headers().contains_key(header::LAST_MODIFIED));
        let page = body_bytes(resp).await;

        let resp = serve_autoindex(
            &ctx("/dir/", Some("bytes=0-9"), false),
            dir.path(),
            "index.list",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            resp.headers()[header::CONTENT_RANGE],
            format!("bytes 0-9/{}", page.len())
        );
        assert_eq!(body_bytes(resp).await, page.slice(..10));

        let resp = serve_autoindex(
            &ctx("/dir/", Some("bytes=100000-"), false),
            dir.path(),
            "index.list",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[tokio::test]
    async fn test_stub() {
        let stub = StubRule {
            suffix: Some("/.launching".to_string()),
            contains: None,
            body: "\n".to_string(),
            content_type: "application/octet-stream".to_string(),
        };
        let resp = serve_stub(&ctx("/app/.launching", None, false), &stub);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "1");
        assert_eq!(body_bytes(resp).await.as_ref(), b"\n");
    }
}
