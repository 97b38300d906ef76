//! Static asset serving for the browser client.
//!
//! Files resolve against the configured document root. `/` and
//! `/index.html` are equivalent. Content types come from a fixed extension
//! table; anything unknown is served as `text/plain`. Requests that escape
//! the document root (any `..` component) are treated as not found.

use std::path::{Component, Path, PathBuf};

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::config::ServerConfig;

const INDEX_PATH: &str = "/index.html";
const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// Map a request path to a content type by file extension.
pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("html") => "text/html",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// Serve a file from the document root, or `404 Not Found`.
pub async fn serve(config: &ServerConfig, request_path: &str) -> Response {
    let path = if request_path == "/" || request_path == INDEX_PATH {
        INDEX_PATH
    } else {
        request_path
    };

    let Some(relative) = sanitize(path) else {
        tracing::warn!(path = request_path, "rejected asset path");
        return not_found();
    };

    let full_path = config.static_dir.join(relative);
    match tokio::fs::read(&full_path).await {
        Ok(contents) => {
            ([(header::CONTENT_TYPE, content_type_for(path))], contents).into_response()
        }
        Err(err) => {
            tracing::debug!(path = %full_path.display(), %err, "asset not found");
            not_found()
        }
    }
}

/// Normalize a request path into a relative path inside the document root.
/// Rejects parent-directory components outright rather than resolving them.
fn sanitize(path: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, FALLBACK_CONTENT_TYPE)],
        "Not Found",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(content_type_for("/js/main.js"), "application/javascript");
        assert_eq!(content_type_for("/css/site.css"), "text/css");
        assert_eq!(content_type_for("/index.html"), "text/html");
        assert_eq!(content_type_for("/data/config.json"), "application/json");
        assert_eq!(content_type_for("/img/logo.png"), "image/png");
        assert_eq!(content_type_for("/img/photo.jpg"), "image/jpeg");
        assert_eq!(content_type_for("/img/photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("/img/anim.gif"), "image/gif");
    }

    #[test]
    fn unknown_extension_falls_back_to_text_plain() {
        assert_eq!(content_type_for("/file.unknownext"), "text/plain");
        assert_eq!(content_type_for("/no-extension"), "text/plain");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(content_type_for("/IMG/LOGO.PNG"), "image/png");
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize("/../etc/passwd").is_none());
        assert!(sanitize("/js/../../secret").is_none());
        assert!(sanitize("/").is_none());
    }

    #[test]
    fn sanitize_keeps_nested_paths() {
        assert_eq!(
            sanitize("/js/config/config.js"),
            Some(PathBuf::from("js/config/config.js"))
        );
        assert_eq!(sanitize("/./index.html"), Some(PathBuf::from("index.html")));
    }
}
