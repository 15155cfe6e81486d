//! Static file serving.
//!
//! Files under the root are served by `tower-http`'s `ServeDir`, with
//! `index.html` answering for directories. With directory indexes enabled, a
//! directory that has no `index.html` gets an HTML listing instead of a 404.

use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tower_http::services::ServeDir;

/// Characters escaped in listing hrefs.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Create router serving `root`, optionally with directory listings.
pub(crate) fn static_router(root: &Path, indexes: bool) -> Router {
    let serve_dir = ServeDir::new(root).append_index_html_on_directories(true);

    if indexes {
        let listing = get(directory_listing).with_state(Arc::<Path>::from(root));
        Router::new().fallback_service(serve_dir.fallback(listing))
    } else {
        Router::new().fallback_service(serve_dir)
    }
}

/// Render a listing for the requested directory.
async fn directory_listing(State(root): State<Arc<Path>>, request: Request) -> Response {
    let url_path = request.uri().path();
    let Some(relative) = relative_path(url_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let dir = root.join(&relative);
    let mut read_dir = match tokio::fs::read_dir(&dir).await {
        Ok(read_dir) => read_dir,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let mut entries = Vec::new();
    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
                entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to list directory");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    // Directories first, then by name.
    entries.sort_by(|(a, a_dir), (b, b_dir)| b_dir.cmp(a_dir).then_with(|| a.cmp(b)));

    Html(render_listing(url_path, &entries)).into_response()
}

/// Map a URL path to a path relative to the root.
///
/// Returns `None` for paths that would leave the root.
fn relative_path(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

fn render_listing(url_path: &str, entries: &[(String, bool)]) -> String {
    let base = if url_path.ends_with('/') {
        url_path.to_owned()
    } else {
        format!("{url_path}/")
    };
    let title = escape_html(&percent_decode_str(&base).decode_utf8_lossy());

    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Index of {title}</title>\n</head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if base != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for (name, is_dir) in entries {
        let suffix = if *is_dir { "/" } else { "" };
        let _ = writeln!(
            html,
            "<li><a href=\"{base}{href}{suffix}\">{label}{suffix}</a></li>",
            href = utf8_percent_encode(name, HREF),
            label = escape_html(name),
        );
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body>home</body>").unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        std::fs::create_dir_all(dir.path().join("docs/api")).unwrap();
        std::fs::write(dir.path().join("docs/b.html"), "b").unwrap();
        std::fs::write(dir.path().join("docs/a & b.txt"), "ab").unwrap();
        dir
    }

    async fn get_path(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_serves_files_and_index() {
        let dir = site();
        let router = static_router(dir.path(), false);

        let (status, body) = get_path(router.clone(), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body{}");

        let (status, body) = get_path(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<body>home</body>");
    }

    #[tokio::test]
    async fn test_directory_without_index_is_404_by_default() {
        let dir = site();
        let (status, _) = get_path(static_router(dir.path(), false), "/docs/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_directory_listing_when_enabled() {
        let dir = site();
        let (status, body) = get_path(static_router(dir.path(), true), "/docs/").await;
        assert_eq!(status, StatusCode::OK);

        assert!(body.contains("<h1>Index of /docs/</h1>"));
        assert!(body.contains(r#"<a href="../">../</a>"#));
        let api = body.find("/docs/api/").unwrap();
        let a_b = body.find("a &amp; b.txt").unwrap();
        let b = body.find("/docs/b.html").unwrap();
        assert!(api < a_b && a_b < b, "directories first, then by name");
        assert!(body.contains(r#"href="/docs/a%20%26%20b.txt""#));
    }

    #[tokio::test]
    async fn test_index_html_wins_over_listing() {
        let dir = site();
        let (_, body) = get_path(static_router(dir.path(), true), "/").await;
        assert_eq!(body, "<body>home</body>");
    }

    #[tokio::test]
    async fn test_missing_file_with_indexes_is_404() {
        let dir = site();
        let (status, _) = get_path(static_router(dir.path(), true), "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_relative_path_rejects_traversal() {
        assert_eq!(relative_path("/docs/api/"), Some(PathBuf::from("docs/api")));
        assert_eq!(relative_path("/a%20b/"), Some(PathBuf::from("a b")));
        assert_eq!(relative_path("/"), Some(PathBuf::new()));
        assert_eq!(relative_path("/docs/../../etc"), None);
        assert_eq!(relative_path("/%2e%2e/etc"), None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">'&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
