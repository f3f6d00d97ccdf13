//! MIME type inference.
//!
//! Out of scope per the distilled spec ("MIME lookup" is an external
//! collaborator). A small fixed extension table covers the cases the
//! test scenarios in `SPEC_FULL.md` §8 exercise; anything else falls back
//! to `application/octet-stream`, the conventional default.

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Infer a MIME type from a basename's extension.
pub fn from_basename(basename: &str) -> String {
    let ext = basename
        .rfind('.')
        .filter(|&i| i > 0)
        .map(|i| basename[i + 1..].to_ascii_lowercase());

    let mime = match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("js") => "text/javascript",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wasm") => "application/wasm",
        Some("zip") => "application/zip",
        _ => DEFAULT_MIME,
    };
    mime.to_string()
}
