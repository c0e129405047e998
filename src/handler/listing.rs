//! Directory listing module
//!
//! Builds the newline-separated `index.list` resources the client runtime uses to
//! enumerate directories, and the HTML index page for browsing.

use html_escape::encode_text;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::io;
use std::path::Path;
use tokio::fs;

/// Characters escaped in an href path segment
const SEGMENT: &AsciiSet = &CONTROLS
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

/// Directory entry name plus whether it is itself a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
}

/// Read a directory's entries sorted case-insensitively, excluding `listing_name`
///
/// Names that tie when lowercased keep a stable order by their original spelling.
pub async fn read_entries(dir: &Path, listing_name: &str) -> io::Result<Vec<Entry>> {
    let mut reader = fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.eq_ignore_ascii_case(listing_name) {
            continue;
        }
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        entries.push(Entry { name, is_dir });
    }
    entries.sort_by_cached_key(|e| (e.name.to_lowercase(), e.name.clone()));
    Ok(entries)
}

/// Listing text: one name per line, each line newline-terminated
pub fn listing_text(entries: &[Entry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.name);
        text.push('\n');
    }
    text
}

/// HTML index page for `url_path`
pub fn autoindex_html(url_path: &str, entries: &[Entry]) -> String {
    let title = encode_text(url_path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Index of {title}</title>\n</head>\n<body>\n\
         <h1>Index of {title}</h1>\n<hr>\n<ul>\n"
    );
    if url_path != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let href = utf8_percent_encode(&entry.name, SEGMENT);
        let label = encode_text(&entry.name);
        html.push_str(&format!(
            "<li><a href=\"{href}{suffix}\">{label}{suffix}</a></li>\n"
        ));
    }
    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}
