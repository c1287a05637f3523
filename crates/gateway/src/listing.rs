//! Directory listing rendering.

use axum::http::{header::ACCEPT, HeaderMap};
use serde::Serialize;

use domain::ResourceEntry;

/// Listing of one directory, serialized as the JSON response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub repository: String,
    /// Directory path from the repository root, ending with `/`
    pub path: String,
    pub entries: Vec<ResourceEntry>,
}

/// Whether the `Accept` header ranks `text/html` above `application/json`.
///
/// Ties go to JSON.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(ACCEPT).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mut html = 0.0_f32;
    let mut json = 0.0_f32;
    for range in accept.split(',') {
        let mut params = range.split(';');
        let media = params.next().unwrap_or("").trim().to_ascii_lowercase();
        let quality = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        match media.as_str() {
            "text/html" | "text/*" => html = html.max(quality),
            "application/json" => json = json.max(quality),
            "*/*" => {
                html = html.max(quality);
                json = json.max(quality);
            }
            _ => {}
        }
    }

    html > 0.0 && html > json
}

/// Render a listing as a minimal HTML page.
pub fn render_html(listing: &Listing) -> String {
    let title = format!("{}{}", listing.repository, listing.path);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>Index of {}</title>\n", escape(&title)));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>Index of {}</h1>\n", escape(&title)));
    html.push_str("<table>\n<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>\n");
    if listing.path != "/" {
        html.push_str("<tr><td><a href=\"../\">../</a></td><td></td><td></td></tr>\n");
    }

    for entry in &listing.entries {
        match entry {
            ResourceEntry::Directory(dir) => html.push_str(&format!(
                "<tr><td><a href=\"{}/\">{}/</a></td><td></td><td>-</td></tr>\n",
                urlencoding::encode(&dir.name),
                escape(&dir.name)
            )),
            ResourceEntry::File(file) => html.push_str(&format!(
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>\n",
                urlencoding::encode(&file.name),
                escape(&file.name),
                file.last_modified_time.format("%Y-%m-%d %H:%M:%S UTC"),
                escape(&file.human_readable_size)
            )),
        }
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
