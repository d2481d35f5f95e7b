//! Directory listing rendering

use std::fmt::Write;
use std::io;
use std::path::Path;
use tokio::fs::ReadDir;

use crate::http::encoding::{html_escape, percent_encode_segment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    /// Directory, or symlink to one
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Read a directory's entries, sorted case-insensitively by name
pub async fn read_entries(dir: &Path) -> io::Result<Vec<ListingEntry>> {
    collect_entries(tokio::fs::read_dir(dir).await?).await
}

async fn collect_entries(mut reader: ReadDir) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        // Entries can disappear between readdir and stat
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        let is_symlink = file_type.is_symlink();
        let is_dir = if is_symlink {
            tokio::fs::metadata(entry.path())
                .await
                .is_ok_and(|m| m.is_dir())
        } else {
            file_type.is_dir()
        };

        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            is_symlink,
        });
    }

    entries.sort_by_cached_key(|e| e.name.to_lowercase());
    Ok(entries)
}

/// Render the HTML listing page for `url_path` (decoded, ends with `/`)
pub fn render(url_path: &str, entries: &[ListingEntry]) -> String {
    let title = format!("Directory listing for {}", html_escape(url_path));

    let mut html = String::with_capacity(256 + entries.len() * 64);
    html.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{title}</h1>");
    html.push_str("<hr>\n<ul>\n");

    for entry in entries {
        let mut href = percent_encode_segment(&entry.name);
        let mut display = html_escape(&entry.name);
        if entry.is_dir {
            href.push('/');
            display.push('/');
        }
        if entry.is_symlink {
            display.push('@');
        }
        let _ = writeln!(html, "<li><a href=\"{href}\">{display}</a></li>");
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}
