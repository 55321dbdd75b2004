//! Content container location, noise stripping, and the section walk

use crate::config::ExtractConfig;
use crate::extract::document::Section;
use crate::extract::end_marker::ContentEndDetector;
use crate::extract::images::ImageCollector;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::trace;

/// Heading given to text that appears before the first heading
pub const DEFAULT_HEADING: &str = "Introduction";

/// Level of [`DEFAULT_HEADING`]
pub const DEFAULT_LEVEL: u8 = 2;

/// Removes noise regions from the whole document
///
/// Regions are matched by tag, by class substring, and by id, then detached
/// from the tree so neither the section walk nor image extraction sees them.
///
/// # Returns
///
/// Number of detached regions
pub fn strip_noise(document: &mut Html, config: &ExtractConfig) -> usize {
    let selectors = config
        .strip_tags
        .iter()
        .cloned()
        .chain(
            config
                .strip_classes
                .iter()
                .map(|class| format!("[class*=\"{}\"]", class)),
        )
        .chain(config.strip_ids.iter().map(|id| format!("[id=\"{}\"]", id)));

    let mut doomed = Vec::new();
    for css in selectors {
        if let Ok(selector) = Selector::parse(&css) {
            doomed.extend(document.select(&selector).map(|el| el.id()));
        } else {
            trace!("Ignoring unparseable noise selector {}", css);
        }
    }

    let count = doomed.len();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    count
}

/// Finds the main content container
///
/// Selectors are tried in priority order; the first match holding at least
/// `min_container_chars` of text wins. Failing that, the first match of any
/// selector is used, then `<body>`.
pub fn locate_container<'a>(document: &'a Html, config: &ExtractConfig) -> Option<ElementRef<'a>> {
    let mut fallback = None;

    for css in &config.content_selectors {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for candidate in document.select(&selector) {
            if text_len(candidate) >= config.min_container_chars {
                trace!("Content container matched {}", css);
                return Some(candidate);
            }
            fallback.get_or_insert(candidate);
        }
    }

    fallback.or_else(|| {
        Selector::parse("body")
            .ok()
            .and_then(|body| document.select(&body).next())
    })
}

/// Walks a container's children in document order, emitting one section per
/// heading transition and stopping at the first content-end marker
pub struct SectionWalker<'d, 'i> {
    detector: &'d ContentEndDetector,
    images: &'i mut ImageCollector,
    sections: Vec<Section>,
    heading: String,
    level: u8,
    buffer: Vec<String>,
    finished: bool,
}

impl<'d, 'i> SectionWalker<'d, 'i> {
    pub fn new(detector: &'d ContentEndDetector, images: &'i mut ImageCollector) -> Self {
        Self {
            detector,
            images,
            sections: Vec::new(),
            heading: DEFAULT_HEADING.to_string(),
            level: DEFAULT_LEVEL,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Walks `container` and returns the non-empty sections in order
    pub fn run(mut self, container: ElementRef<'_>) -> Vec<Section> {
        self.walk(container);
        self.flush();
        self.sections
    }

    fn walk<'a>(&mut self, parent: ElementRef<'a>) {
        let mut run = InlineRun::default();
        for child in parent.children() {
            if self.finished {
                return;
            }
            match child.value() {
                Node::Text(text) => run.text.push_str(text),
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if is_inline(element) {
                        run.push(element);
                    } else {
                        self.flush_run(&mut run);
                        if self.finished {
                            return;
                        }
                        self.visit(element);
                    }
                }
                _ => {}
            }
        }
        self.flush_run(&mut run);
    }

    /// Emits consecutive bare text and inline elements as one paragraph
    fn flush_run(&mut self, run: &mut InlineRun<'_>) {
        let text = collapse_whitespace(&run.text);
        let elements = std::mem::take(&mut run.elements);
        run.text.clear();
        if text.is_empty() && elements.is_empty() {
            return;
        }
        self.push_block(&text, &text, &elements);
    }

    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();

        if let Some(level) = heading_level(name) {
            let text = inline_text(element);
            if self.detector.starts_boilerplate(&text) {
                self.finished = true;
                return;
            }
            if !text.is_empty() {
                self.flush();
                self.heading = text;
                self.level = level;
            }
            return;
        }

        if is_wrapper(name) && contains_heading(element) {
            self.walk(element);
            return;
        }

        let plain = inline_text(element);
        let rendered = render_block(element);
        self.push_block(&plain, &rendered, &[element]);
    }

    fn push_block(&mut self, plain: &str, rendered: &str, elements: &[ElementRef<'_>]) {
        if self.detector.starts_boilerplate(plain) {
            self.finished = true;
            return;
        }

        let (kept, hit) = self.detector.truncate(rendered);
        if !hit {
            for element in elements {
                self.images.collect(*element, &self.heading);
            }
        }
        if !kept.trim().is_empty() {
            self.buffer.push(kept.to_string());
        }
        if hit {
            self.finished = true;
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let content = self.buffer.join("\n\n");
        self.buffer.clear();
        self.sections.push(Section {
            heading: self.heading.clone(),
            level: self.level,
            content,
            order: self.sections.len(),
        });
    }
}

/// Text and inline elements waiting to be emitted as one paragraph
#[derive(Default)]
struct InlineRun<'a> {
    text: String,
    elements: Vec<ElementRef<'a>>,
}

impl<'a> InlineRun<'a> {
    fn push(&mut self, element: ElementRef<'a>) {
        self.text.push_str(&inline_raw(element));
        self.elements.push(element);
    }
}

/// Renders one block element to Markdown-flavored text
pub fn render_block(element: ElementRef<'_>) -> String {
    match element.value().name() {
        "ul" | "ol" => render_list(element, 0),
        "table" => render_table(element),
        "blockquote" => render_children(element)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {}", line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        "dl" => render_definitions(element),
        "figure" => figure_caption(element)
            .map(|caption| format!("[Image: {}]", caption))
            .unwrap_or_default(),
        "pre" => element.text().collect::<String>().trim_end().to_string(),
        "img" | "script" | "style" | "svg" | "hr" | "br" | "noscript" => String::new(),
        _ if has_block_children(element) => render_children(element),
        _ => inline_text(element),
    }
}

fn render_children(element: ElementRef<'_>) -> String {
    let mut blocks = Vec::new();
    let mut run = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => run.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_inline(child) {
                    run.push_str(&inline_raw(child));
                } else {
                    push_nonempty(&mut blocks, collapse_whitespace(&run));
                    run.clear();
                    push_nonempty(&mut blocks, render_block(child));
                }
            }
            _ => {}
        }
    }
    push_nonempty(&mut blocks, collapse_whitespace(&run));
    blocks.join("\n\n")
}

fn push_nonempty(blocks: &mut Vec<String>, block: String) {
    if !block.trim().is_empty() {
        blocks.push(block);
    }
}

fn render_list(list: ElementRef<'_>, depth: usize) -> String {
    let ordered = list.value().name() == "ol";
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();
    let mut number = 0;

    for item in child_elements(list).filter(|c| c.value().name() == "li") {
        let own = collapse_whitespace(&collect_text(item, &["ul", "ol", "script", "style"]));
        if !own.is_empty() {
            number += 1;
            if ordered {
                lines.push(format!("{}{}. {}", indent, number, own));
            } else {
                lines.push(format!("{}- {}", indent, own));
            }
        }
        for nested in child_elements(item).filter(|c| matches!(c.value().name(), "ul" | "ol")) {
            let rendered = render_list(nested, depth + 1);
            if !rendered.is_empty() {
                lines.push(rendered);
            }
        }
    }

    lines.join("\n")
}

fn render_table(table: ElementRef<'_>) -> String {
    let rows: Vec<Vec<String>> = table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .map(|row| {
            child_elements(row)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| inline_text(cell).replace('|', "\\|"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, cells) in rows.iter().enumerate() {
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            let separator = vec!["---"; cells.len()].join(" | ");
            lines.push(format!("| {} |", separator));
        }
    }
    lines.join("\n")
}

fn render_definitions(list: ElementRef<'_>) -> String {
    child_elements(list)
        .filter_map(|el| {
            let text = inline_text(el);
            if text.is_empty() {
                return None;
            }
            match el.value().name() {
                "dt" => Some(format!("**{}**", text)),
                "dd" => Some(format!("  {}", text)),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the `<figcaption>` inside a figure, if any
pub fn figure_caption(figure: ElementRef<'_>) -> Option<String> {
    figure
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "figcaption")
        .map(inline_text)
        .filter(|caption| !caption.is_empty())
}

/// Visible text of an element with whitespace collapsed
pub fn inline_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&collect_text(element, &["script", "style"]))
}

fn collect_text(element: ElementRef<'_>, skip: &[&str]) -> String {
    let mut out = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !skip.contains(&el.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if el.name() == "br" {
                        out.push(' ');
                    } else {
                        out.push_str(&collect_text(child, skip));
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Uncollapsed text an inline element contributes to its paragraph
fn inline_raw(element: ElementRef<'_>) -> String {
    if element.value().name() == "br" {
        " ".to_string()
    } else {
        collect_text(element, &["script", "style"])
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().len()).sum()
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Phrasing elements that continue the surrounding paragraph
fn is_inline(element: ElementRef<'_>) -> bool {
    let phrasing = matches!(
        element.value().name(),
        "a" | "abbr" | "b" | "bdi" | "bdo" | "br" | "cite" | "code" | "data" | "del" | "dfn"
            | "em" | "font" | "i" | "img" | "ins" | "kbd" | "mark" | "q" | "s" | "samp"
            | "small" | "span" | "strong" | "sub" | "sup" | "time" | "u" | "var" | "wbr"
    );
    phrasing && !has_block_children(element)
}

fn is_wrapper(name: &str) -> bool {
    matches!(name, "div" | "section" | "article" | "main")
}

fn contains_heading(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| heading_level(el.value().name()).is_some())
}

fn has_block_children(element: ElementRef<'_>) -> bool {
    child_elements(element).any(|el| {
        matches!(
            el.value().name(),
            "p" | "ul" | "ol" | "table" | "blockquote" | "dl" | "figure" | "pre" | "div"
        )
    })
}
