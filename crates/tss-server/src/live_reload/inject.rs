//! Reload script injection into served HTML pages.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Pages larger than this are served untouched.
const MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

const BODY_CLOSE: &[u8] = b"</body>";

/// Script tag loading the client from the notifier.
///
/// The host is taken from the page location so the tag works no matter
/// which address the browser used to reach the static server.
pub(crate) fn snippet(port: u16) -> String {
    format!(
        "<script>document.write('<script src=\"//' + (location.hostname || 'localhost') + \
         ':{port}/livereload.js\"></' + 'script>')</script>\n"
    )
}

/// Middleware inserting [`snippet`] into successful HTML `GET` responses.
pub(crate) async fn inject_script(
    State(port): State<u16>,
    request: Request,
    next: Next,
) -> Response {
    let is_get = request.method() == Method::GET;
    let response = next.run(request).await;

    if !is_get || response.status() != StatusCode::OK || !is_html(&response) || too_large(&response)
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let html = match to_bytes(body, MAX_HTML_BYTES).await {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(insert_before_body_close(&html, &snippet(port))))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

fn too_large(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|len| len > MAX_HTML_BYTES)
}

/// Insert `snippet` before the last `</body>`, or append it.
fn insert_before_body_close(html: &[u8], snippet: &str) -> Vec<u8> {
    let at = html
        .windows(BODY_CLOSE.len())
        .rposition(|window| window.eq_ignore_ascii_case(BODY_CLOSE))
        .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + snippet.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(snippet.as_bytes());
    out.extend_from_slice(&html[at..]);
    out
}
