// PDF export proxy - payload/filename helpers plus the blocking call to the
// external render service. The caller owns threading and the exporting flag;
// everything except `render_remote` is pure and unit tested.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::settings::Settings;

/// What the UI posts to /api/export: the client-rendered preview HTML and
/// the document title, snapshotted at invocation time.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub html: String,
    #[serde(default)]
    pub title: String,
}

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Request body for the render service: the snapshot plus page options.
pub fn render_payload(request: &ExportRequest, settings: &Settings) -> serde_json::Value {
    json!({
        "html": request.html,
        "title": request.title,
        "format": settings.pdf_page_format,
        "printBackground": true,
        "margin": {
            "top": settings.pdf_margin,
            "right": settings.pdf_margin,
            "bottom": settings.pdf_margin,
            "left": settings.pdf_margin,
        },
    })
}

/// Forward the snapshot to the render service and hand back the PDF bytes.
/// Runs to completion or failure; there is no cancellation path.
pub fn render_remote(request: &ExportRequest, settings: &Settings) -> Result<Vec<u8>, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(RENDER_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;

    let response = client
        .post(&settings.pdf_service_url)
        .json(&render_payload(request, settings))
        .send()
        .map_err(|e| format!("render service unreachable: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("render service returned {}", response.status()));
    }

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(|e| e.to_string())
}

/// Attachment filename stem for the exported PDF. Keeps the title
/// recognizable, replaces path and header metacharacters, falls back to
/// "document" when nothing printable remains.
pub fn pdf_filename(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '"' | ':' | '*' | '?' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(&['.', ' '][..]);
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Content-Disposition value carrying both a plain-ASCII filename and the
/// RFC 5987 encoded one, so non-ASCII titles survive every browser.
pub fn content_disposition(title: &str) -> String {
    let name = pdf_filename(title);
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}.pdf\"; filename*=UTF-8''{}.pdf",
        ascii,
        urlencoding::encode(&name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("My Notes", "My Notes")]
    #[case("  padded  ", "padded")]
    #[case("a/b\\c", "a_b_c")]
    #[case("what?.pdf..", "what_.pdf")]
    #[case("", "document")]
    #[case("   ", "document")]
    #[case("...", "document")]
    #[case("Числа и буквы", "Числа и буквы")]
    fn test_pdf_filename(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(pdf_filename(title), expected);
    }

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        let value = content_disposition("résumé");
        assert!(value.starts_with("attachment; filename=\"r_sum_.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }

    #[test]
    fn test_content_disposition_plain_ascii() {
        assert_eq!(
            content_disposition("Report"),
            "attachment; filename=\"Report.pdf\"; filename*=UTF-8''Report.pdf"
        );
    }

    #[test]
    fn test_render_payload_carries_page_options() {
        let request = ExportRequest {
            html: "<h1>hi</h1>".to_string(),
            title: "T".to_string(),
        };
        let settings = Settings::default();

        let payload = render_payload(&request, &settings);
        assert_eq!(payload["html"], "<h1>hi</h1>");
        assert_eq!(payload["format"], "A4");
        assert_eq!(payload["printBackground"], true);
        for side in ["top", "right", "bottom", "left"] {
            assert_eq!(payload["margin"][side], "10mm");
        }
    }
}
