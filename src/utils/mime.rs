//! Content sniffing: document format from headers and filenames.

use crate::models::DocumentFormat;

/// Format of a direct HTTP response body.
///
/// Anything whose `Content-Type` mentions `pdf` is a PDF; every other
/// response (including a missing header) is kept as HTML.
pub fn format_from_content_type(content_type: Option<&str>) -> DocumentFormat {
    match content_type {
        Some(ct) if ct.to_lowercase().contains("pdf") => DocumentFormat::Pdf,
        _ => DocumentFormat::Html,
    }
}

/// Strict classification used when a browser navigation is saved as-is.
///
/// Returns `None` for content that is neither a PDF nor a markup page.
pub fn classify_content_type(content_type: &str) -> Option<DocumentFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if mime.contains("pdf") {
        Some(DocumentFormat::Pdf)
    } else if mime == "text/html" || mime == "application/xhtml+xml" {
        Some(DocumentFormat::Html)
    } else {
        None
    }
}

/// Format of a browser download from its suggested filename.
///
/// Unrecognized or missing extensions default to PDF.
pub fn format_from_filename(name: &str) -> DocumentFormat {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" | "xhtml" => DocumentFormat::Html,
        _ => DocumentFormat::Pdf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_content_type() {
        assert_eq!(
            format_from_content_type(Some("application/pdf")),
            DocumentFormat::Pdf
        );
        assert_eq!(
            format_from_content_type(Some("application/x-PDF; charset=binary")),
            DocumentFormat::Pdf
        );
        assert_eq!(
            format_from_content_type(Some("text/html; charset=utf-8")),
            DocumentFormat::Html
        );
        assert_eq!(
            format_from_content_type(Some("application/octet-stream")),
            DocumentFormat::Html
        );
        assert_eq!(format_from_content_type(None), DocumentFormat::Html);
    }

    #[test]
    fn test_classify_content_type() {
        assert_eq!(
            classify_content_type("application/pdf"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            classify_content_type("text/html; charset=UTF-8"),
            Some(DocumentFormat::Html)
        );
        assert_eq!(classify_content_type("image/png"), None);
        assert_eq!(classify_content_type(""), None);
    }

    #[test]
    fn test_format_from_filename() {
        assert_eq!(format_from_filename("report.html"), DocumentFormat::Html);
        assert_eq!(format_from_filename("REPORT.HTM"), DocumentFormat::Html);
        assert_eq!(format_from_filename("edition.pdf"), DocumentFormat::Pdf);
        assert_eq!(format_from_filename("data.zip"), DocumentFormat::Pdf);
        assert_eq!(format_from_filename("noextension"), DocumentFormat::Pdf);
    }
}
