//! Plain-text rendering of result pages and errors.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use lookahead_core::{ErrorKind, SearchError, SearchItem, SearchKey, SearchResult};

/// `Sep 17, 2025` in local time.
pub fn format_date(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %e, %Y").to_string()
}

fn render_item(out: &mut String, index: u64, item: &SearchItem) {
    let _ = writeln!(out, "{index:>4}. {}", item.display_title());
    if let Some(url) = &item.html_url {
        let _ = writeln!(out, "      {url}");
    }
    let author = item.user.as_ref().and_then(|u| u.login.as_deref());
    match (author, &item.updated_at) {
        (Some(login), Some(at)) => {
            let _ = writeln!(out, "      @{login} · updated {}", format_date(at));
        }
        (Some(login), None) => {
            let _ = writeln!(out, "      @{login}");
        }
        (None, Some(at)) => {
            let _ = writeln!(out, "      updated {}", format_date(at));
        }
        (None, None) => {}
    }
}

/// Page-number strip with the current page bracketed.
pub fn render_window(window: &[u32], current: u32, total_pages: u32) -> String {
    let mut out = String::new();
    if window.first().is_some_and(|&p| p > 1) {
        out.push_str("… ");
    }
    let links: Vec<String> =
        window.iter().map(|&p| if p == current { format!("[{p}]") } else { p.to_string() }).collect();
    out.push_str(&links.join(" "));
    if window.last().is_some_and(|&p| p < total_pages) {
        out.push_str(" …");
    }
    out
}

/// Render one resolved page.
pub fn render_page(key: &SearchKey, result: &SearchResult, window: &[u32], total_pages: u32) -> String {
    let mut out = String::new();
    if result.is_empty() {
        let _ = writeln!(out, "No results for \"{}\".", key.query());
        return out;
    }

    let _ = writeln!(out, "{} {} results for \"{}\"", result.total_count, key.search_type(), key.query());
    if result.incomplete_results {
        let _ = writeln!(out, "(results may be incomplete)");
    }
    let offset = u64::from(key.page().saturating_sub(1)) * u64::from(key.per_page());
    for (i, item) in result.items.iter().enumerate() {
        render_item(&mut out, offset + i as u64 + 1, item);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", render_window(window, key.page(), total_pages));
    let _ = write!(out, "Page {} of {}", key.page(), total_pages);
    out
}

/// Render a foreground failure with whatever hint the error carries.
pub fn render_error(error: &SearchError) -> String {
    let mut out = format!("error [{}]: {}", error.kind, error.message);
    match error.kind {
        ErrorKind::AuthRequired => out.push_str("\nhint: set LOOKAHEAD_GITHUB_TOKEN"),
        ErrorKind::RateLimited => {
            if let Some(reset) = error.rate_limit.as_ref().and_then(|r| r.reset)
                && let Some(at) = i64::try_from(reset).ok().and_then(|s| DateTime::from_timestamp(s, 0))
            {
                let _ = write!(out, "\nhint: quota resets at {}", at.with_timezone(&Local).format("%H:%M:%S"));
            }
        }
        _ => {}
    }
    if let Some(url) = &error.documentation_url {
        let _ = write!(out, "\nsee {url}");
    }
    out
}
