//! Utility functions for fedplane

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::common::{Error, Result};

/// Percent-encoding set for object paths in probe URLs (keeps `/`)
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Lexically normalize a slash-separated path: collapse repeated slashes,
/// drop `.` segments and resolve `..` against the preceding segment.
/// A rooted path never climbs above `/`. An empty result is `"."`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Clean an object path and reject ones that cannot name an object.
pub fn normalize_object_path(raw: &str) -> Result<String> {
    let path = clean_path(raw);
    if path == "." || path.is_empty() || path.ends_with('/') {
        return Err(Error::Validation(
            "Path should not be empty or ended with slash '/'".into(),
        ));
    }
    Ok(path)
}

/// Build the URL of `path` on a server, encoding what is not URL-safe.
pub fn object_url(server_url: &str, path: &str) -> String {
    let base = server_url.trim_end_matches('/');
    format!("{}{}", base, utf8_percent_encode(path, PATH_ENCODE_SET))
}

/// Does `prefix` cover `path` on a segment boundary?
///
/// `/a` covers `/a` and `/a/b` but not `/ab`.
pub fn prefix_covers(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/a/b/c"), "/a/b/c");
        assert_eq!(clean_path("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/../a"), "/a");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("a/../.."), "..");
    }

    #[test]
    fn test_normalize_object_path() {
        assert_eq!(normalize_object_path("/data//file.txt").unwrap(), "/data/file.txt");
        assert_eq!(normalize_object_path("/data/dir/").unwrap(), "/data/dir");
        assert!(normalize_object_path("/").is_err());
        assert!(normalize_object_path("").is_err());
        assert!(normalize_object_path("/a/..").is_err());
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("https://origin:8443/", "/data/my file#1"),
            "https://origin:8443/data/my%20file%231"
        );
    }

    #[test]
    fn test_prefix_covers() {
        assert!(prefix_covers("/a", "/a/b/c"));
        assert!(prefix_covers("/a/", "/a/b"));
        assert!(prefix_covers("/a/b", "/a/b"));
        assert!(!prefix_covers("/a", "/ab/c"));
        assert!(!prefix_covers("/a/b/c", "/a/b"));
        assert!(prefix_covers("/", "/anything"));
    }
}
