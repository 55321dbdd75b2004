//! Markdown rendering of extracted documents
//!
//! The layout is what the corpus chunker sees: a title line, the attribution
//! line, then one heading block per section in document order. Nothing that
//! changes between scrapes of the same content (such as the scrape time) is
//! rendered.

use crate::extract::ExtractedDocument;

/// Section headings never render above `##`; `#` is reserved for the title
const MIN_SECTION_LEVEL: u8 = 2;
const MAX_SECTION_LEVEL: u8 = 6;

/// Renders a document as Markdown
///
/// # Arguments
///
/// * `doc` - The extracted document
///
/// # Returns
///
/// A Markdown string ending in a newline
pub fn render_markdown(doc: &ExtractedDocument) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", doc.title));
    md.push_str(&doc.attribution);
    md.push('\n');
    if !doc.categories.is_empty() {
        md.push_str(&format!("Categories: {}\n", doc.categories.join(", ")));
    }
    md.push('\n');

    for section in &doc.sections {
        let level = section.level.clamp(MIN_SECTION_LEVEL, MAX_SECTION_LEVEL);
        md.push_str(&"#".repeat(level as usize));
        md.push(' ');
        md.push_str(&section.heading);
        md.push_str("\n\n");

        let content = section.content.trim();
        if !content.is_empty() {
            md.push_str(content);
            md.push_str("\n\n");
        }
    }

    let trimmed = md.trim_end().len();
    md.truncate(trimmed);
    md.push('\n');
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedImage, Section};
    use chrono::{TimeZone, Utc};

    fn sample_document() -> ExtractedDocument {
        ExtractedDocument {
            key: "etomidate".to_string(),
            url: "https://litfl.com/etomidate/".to_string(),
            title: "Etomidate".to_string(),
            author: "Chris Nickson".to_string(),
            license: "CC BY-NC-SA 4.0".to_string(),
            attribution: "Source: [LITFL](https://litfl.com/etomidate/) by Chris Nickson (CC BY-NC-SA 4.0)"
                .to_string(),
            description: Some("Induction agent".to_string()),
            date_modified: None,
            categories: vec![],
            tags: vec![],
            sections: vec![
                Section {
                    heading: "Introduction".to_string(),
                    level: 2,
                    content: "Etomidate is an imidazole derivative.".to_string(),
                    order: 0,
                },
                Section {
                    heading: "Dosing".to_string(),
                    level: 3,
                    content: "- 0.3 mg/kg IV".to_string(),
                    order: 1,
                },
                Section {
                    heading: "Page Title Heading".to_string(),
                    level: 1,
                    content: String::new(),
                    order: 2,
                },
            ],
            images: vec![ExtractedImage {
                url: "https://litfl.com/wp-content/uploads/etomidate.png".to_string(),
                alt: "structure".to_string(),
                caption: None,
                label: "structure".to_string(),
                section_heading: "Introduction".to_string(),
            }],
            content_hash: "0123456789abcdef".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_layout() {
        let md = render_markdown(&sample_document());

        assert!(md.starts_with(
            "# Etomidate\n\nSource: [LITFL](https://litfl.com/etomidate/) by Chris Nickson (CC BY-NC-SA 4.0)\n\n## Introduction\n\n"
        ));
        assert!(md.contains("## Introduction\n\nEtomidate is an imidazole derivative.\n\n"));
        assert!(md.contains("### Dosing\n\n- 0.3 mg/kg IV\n\n"));
        assert!(md.ends_with("## Page Title Heading\n"));
        assert!(!md.contains("Induction agent"));
    }

    #[test]
    fn test_categories_line_follows_attribution() {
        let mut doc = sample_document();
        doc.categories = vec!["Pharmacology".to_string(), "CCC".to_string()];

        let md = render_markdown(&doc);
        assert!(md.contains("(CC BY-NC-SA 4.0)\nCategories: Pharmacology, CCC\n\n## Introduction"));
    }

    #[test]
    fn test_body_is_stable_across_scrapes() {
        let first = sample_document();
        let mut second = sample_document();
        second.scraped_at = Utc.with_ymd_and_hms(2025, 7, 9, 8, 30, 0).unwrap();

        assert_eq!(render_markdown(&first), render_markdown(&second));
    }

    #[test]
    fn test_level_one_sections_are_demoted() {
        let md = render_markdown(&sample_document());
        assert!(md.contains("\n## Page Title Heading\n"));
        assert_eq!(md.matches("\n# ").count(), 0);
    }

    #[test]
    fn test_sections_keep_document_order() {
        let md = render_markdown(&sample_document());
        let intro = md.find("## Introduction").unwrap();
        let dosing = md.find("### Dosing").unwrap();
        assert!(intro < dosing);
    }
}
