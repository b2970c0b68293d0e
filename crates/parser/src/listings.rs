//! Listing extraction from fetched pages.
//!
//! Each listing renders as a wide description column followed by a narrow
//! sibling column holding contact numbers. Rows with neither a description
//! nor a phone number are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use clearfetch_core::ListingRecord;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"0\d{1,2}-\d{3,4}-\d{4}").unwrap());

pub fn extract_listings(html_str: &str) -> Vec<ListingRecord> {
    let document = Html::parse_document(html_str);
    let Some(row_sel) = selector("div.col-lg-9.col-md-8.col-sm-8") else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in document.select(&row_sel) {
        let category = selector("span.cattxt")
            .and_then(|s| row.select(&s).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let full_text = normalize_text(&row);
        let description = strip_category_prefix(&full_text, &category);

        let new = selector("img[src*='icn_new']")
            .map(|s| row.select(&s).next().is_some())
            .unwrap_or(false);

        let phones: Vec<String> = phone_column(&row)
            .map(|col| {
                let text = normalize_text(&col);
                PHONE_RE
                    .find_iter(&text)
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        if !description.is_empty() || !phones.is_empty() {
            records.push(ListingRecord {
                category,
                description,
                phones,
                new,
            });
        }
    }

    debug!(records = records.len(), "extracted listing records");
    records
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn normalize_text(el: &ElementRef) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rows render as `<category> : <description>`; keep only the description.
/// Text without that prefix passes through unchanged.
fn strip_category_prefix(text: &str, category: &str) -> String {
    if !category.is_empty() {
        if let Some(rest) = text.strip_prefix(category) {
            if let Some(description) = rest.trim_start().strip_prefix(':') {
                return description.trim_start().to_string();
            }
        }
    }
    text.to_string()
}

/// The phone numbers live in the adjacent narrow column of the same row.
fn phone_column<'a>(row: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    row.next_siblings().filter_map(ElementRef::wrap).find(|el| {
        el.value().name() == "div"
            && el
                .value()
                .attr("class")
                .is_some_and(|c| c.contains("col-lg-3") && c.contains("col-md-4"))
    })
}
