//! Sitemap XML parsing
//!
//! Entries are matched by local name and direct parent, so namespaced
//! extensions such as `<image:loc>` or `<xhtml:link/>` never leak into the
//! page list.

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

/// One `<url>` entry of a urlset
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of nested sitemaps
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapUrl>),
}

/// Text-bearing children of `<url>` and `<sitemap>`
#[derive(Default)]
struct EntryFields {
    loc: String,
    lastmod: String,
}

impl EntryFields {
    /// Appends text to the field the element path points at, if any
    fn append(&mut self, path: &[Vec<u8>], text: &str) {
        let [.., parent, field] = path else {
            return;
        };
        if !matches!(parent.as_slice(), b"url" | b"sitemap") {
            return;
        }
        match field.as_slice() {
            b"loc" => self.loc.push_str(text),
            b"lastmod" => self.lastmod.push_str(text),
            _ => {}
        }
    }
}

/// Parses a sitemap or sitemap index
///
/// A document with no nested `<sitemap>` entries is treated as a urlset, so a
/// source whose "index" URL points straight at a flat sitemap still works.
/// Malformed XML ends parsing; the entries read up to that point are kept.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut fields = EntryFields::default();
    let mut sitemaps = Vec::new();
    let mut urls = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if matches!(name.as_slice(), b"url" | b"sitemap") {
                    fields = EntryFields::default();
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                let Some(name) = path.pop() else {
                    continue;
                };
                let loc = fields.loc.trim();
                if loc.is_empty() {
                    continue;
                }
                match name.as_slice() {
                    b"sitemap" => sitemaps.push(loc.to_string()),
                    b"url" => urls.push(SitemapUrl {
                        loc: loc.to_string(),
                        lastmod: parse_lastmod(&fields.lastmod),
                    }),
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => match text.unescape() {
                Ok(text) => fields.append(&path, &text),
                Err(e) => warn!("Skipping undecodable sitemap text: {}", e),
            },
            Ok(Event::CData(data)) => fields.append(&path, &String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Malformed sitemap XML: {}", e);
                break;
            }
            _ => {}
        }
    }

    if sitemaps.is_empty() {
        SitemapDocument::UrlSet(urls)
    } else {
        SitemapDocument::Index(sitemaps)
    }
}

/// Parses a W3C datetime as used by sitemaps (full timestamp or bare date)
pub fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
