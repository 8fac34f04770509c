//! Host page model – parses HTML into a small DOM tree and resolves regions
//! by selector.
//!
//! The parser handles the controlled subset produced by templated pages:
//! - Structural: div, section, article, p, h1-h3, ul, ol, li, table, tr, td, th
//! - Inline: span, img, br
//! - `id`, `class`, `style` and `src` attributes
//!
//! `<script>`, `<style>` and `<head>` content is kept out of the tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Body,
    Div,
    Section,
    Article,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Img,
    Br,
    /// Anything else; laid out like a div.
    Other(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "article" => Tag::Article,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "img" => Tag::Img,
            "br" => Tag::Br,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Lower-case tag name as written in selectors.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Body => "body",
            Tag::Div => "div",
            Tag::Section => "section",
            Tag::Article => "article",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Table => "table",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Img => "img",
            Tag::Br => "br",
            Tag::Other(name) => name.as_str(),
        }
    }

    fn is_void(name: &str) -> bool {
        matches!(
            name,
            "img" | "br" | "hr" | "meta" | "link" | "input" | "source" | "wbr"
        )
    }

    fn is_raw_text(name: &str) -> bool {
        matches!(name, "script" | "style" | "head" | "title" | "template")
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element carrying its tag, attributes and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(|s| s.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace())
            .into_iter()
            .flatten()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level DOM nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut reader = Reader { src: html, pos: 0 };
    let mut nodes = Vec::new();
    while !reader.done() {
        nodes.extend(reader.nodes_until_close());
        // Unmatched closing tag at the top level.
        if reader.at("</") {
            reader.skip_past(">");
        }
    }
    nodes
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Skip forward past the next occurrence of `marker` (or to the end).
    fn skip_past(&mut self, marker: &str) {
        match self.rest().find(marker) {
            Some(i) => self.pos += i + marker.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn nodes_until_close(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.done() && !self.at("</") {
            if self.at("<!--") {
                self.skip_past("-->");
            } else if self.at("<!") || self.at("<?") {
                self.skip_past(">");
            } else if self.at("<") {
                if let Some(el) = self.element() {
                    nodes.push(DomNode::Element(el));
                }
            } else {
                let text = self.text();
                // Whitespace-only runs between tags carry no content.
                if !text.trim().is_empty() {
                    nodes.push(DomNode::Text(text));
                }
            }
        }
        nodes
    }

    fn text(&mut self) -> String {
        let start = self.pos;
        match self.rest().find('<') {
            Some(i) => self.pos += i,
            None => self.pos = self.src.len(),
        }
        decode_entities(&self.src[start..self.pos])
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            self.bump();
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn element(&mut self) -> Option<ElementNode> {
        self.bump(); // '<'
        let name = self.name();
        let mut attributes = HashMap::new();

        loop {
            self.skip_ws();
            if self.done() || self.at(">") || self.at("/>") {
                break;
            }
            let key = self.name();
            if key.is_empty() {
                // Stray character inside the tag; drop it.
                self.bump();
                continue;
            }
            self.skip_ws();
            let value = if self.at("=") {
                self.bump();
                self.skip_ws();
                self.attr_value()
            } else {
                String::new()
            };
            attributes.insert(key, value);
        }

        let self_closed = self.at("/>");
        if self_closed {
            self.pos += 2;
        } else if self.at(">") {
            self.bump();
        }

        if Tag::is_raw_text(&name) {
            if !self_closed {
                self.skip_past(&format!("</{name}"));
                self.skip_past(">");
            }
            return None;
        }

        let mut el = ElementNode {
            tag: Tag::parse(&name),
            attributes,
            children: Vec::new(),
        };
        if self_closed || Tag::is_void(&name) {
            return Some(el);
        }

        el.children = self.nodes_until_close();

        if self.at("</") {
            self.pos += 2;
            self.name();
            self.skip_past(">");
        }
        Some(el)
    }

    fn attr_value(&mut self) -> String {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                let end = self.rest().find(q).map(|i| start + i).unwrap_or(self.src.len());
                let raw = &self.src[start..end];
                self.pos = (end + q.len_utf8()).min(self.src.len());
                decode_entities(raw)
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if !c.is_whitespace() && c != '>') {
                    if self.at("/>") {
                        break;
                    }
                    self.bump();
                }
                decode_entities(&self.src[start..self.pos])
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// One compound selector: `tag#id.class.class`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(s: &str) -> Result<Self, String> {
        let mut out = Compound::default();
        let mut rest = s;

        let tag_len = rest
            .find(|c: char| c == '#' || c == '.')
            .unwrap_or(rest.len());
        if tag_len > 0 {
            let tag = &rest[..tag_len];
            if tag != "*" {
                out.tag = Some(tag.to_ascii_lowercase());
            }
            rest = &rest[tag_len..];
        }

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let len = body.find(|c: char| c == '#' || c == '.').unwrap_or(body.len());
            let ident = &body[..len];
            if ident.is_empty() {
                return Err(format!("empty name after '{marker}' in selector '{s}'"));
            }
            match marker {
                '#' => out.id = Some(ident.to_string()),
                '.' => out.classes.push(ident.to_string()),
                _ => unreachable!(),
            }
            rest = &body[len..];
        }
        Ok(out)
    }

    fn matches(&self, el: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if el.tag.name() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
    }
}

/// A selector of compound parts joined by the descendant combinator,
/// e.g. `main .notice-detail-content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts = s
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() {
            return Err("empty selector".to_string());
        }
        Ok(Self { parts })
    }

    /// First element in document order matching the selector.
    pub fn find<'a>(&self, nodes: &'a [DomNode]) -> Option<&'a ElementNode> {
        let mut ancestors = Vec::new();
        self.find_in(nodes, &mut ancestors)
    }

    fn find_in<'a>(
        &self,
        nodes: &'a [DomNode],
        ancestors: &mut Vec<&'a ElementNode>,
    ) -> Option<&'a ElementNode> {
        for node in nodes {
            let DomNode::Element(el) = node else { continue };
            if self.matches_with_ancestors(el, ancestors) {
                return Some(el);
            }
            ancestors.push(el);
            let found = self.find_in(&el.children, ancestors);
            ancestors.pop();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn matches_with_ancestors(&self, el: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        let Some((last, leading)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(el) {
            return false;
        }
        // Greedy right-to-left walk up the ancestor chain.
        let mut remaining = leading.iter().rev().peekable();
        for anc in ancestors.iter().rev() {
            match remaining.peek() {
                Some(part) if part.matches(anc) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }
}

// ---------------------------------------------------------------------------
// Page & regions
// ---------------------------------------------------------------------------

/// A parsed host page. Relative image paths resolve against `base_dir`.
#[derive(Debug, Clone)]
pub struct Page {
    nodes: Vec<DomNode>,
    base_dir: Option<PathBuf>,
}

impl Page {
    /// Parse a page. Fragments without a `<body>` are wrapped in one so that
    /// `body` always resolves.
    pub fn parse(html: &str) -> Self {
        let nodes = parse_html(html);
        let has_body = Selector {
            parts: vec![Compound {
                tag: Some("body".to_string()),
                ..Compound::default()
            }],
        }
        .find(&nodes)
        .is_some();

        let nodes = if has_body {
            nodes
        } else {
            let mut body = ElementNode::new(Tag::Body);
            body.children = nodes;
            vec![DomNode::Element(body)]
        };
        Self {
            nodes,
            base_dir: None,
        }
    }

    /// Read and parse a page from disk; its directory becomes the base
    /// directory for relative image paths.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let html = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {e}", path.display()))?;
        Ok(Self::parse(&html).with_base_dir(path.parent().map(Path::to_path_buf)))
    }

    pub fn with_base_dir(mut self, base_dir: Option<PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn nodes(&self) -> &[DomNode] {
        &self.nodes
    }

    /// First element matching `selector`, or `None` when nothing matches or
    /// the selector does not parse.
    pub fn query_selector(&self, selector: &str) -> Option<&ElementNode> {
        match Selector::parse(selector) {
            Ok(sel) => sel.find(&self.nodes),
            Err(e) => {
                log::warn!("Invalid selector '{selector}': {e}");
                None
            }
        }
    }
}

/// How a caller designates the region to capture.
#[derive(Debug, Clone, Copy)]
pub enum RegionRef<'a> {
    /// A selector resolved against the converter's page.
    Selector(&'a str),
    /// A direct handle to an element.
    Element(&'a ElementNode),
}

impl<'a> From<&'a str> for RegionRef<'a> {
    fn from(s: &'a str) -> Self {
        RegionRef::Selector(s)
    }
}

impl<'a> From<&'a ElementNode> for RegionRef<'a> {
    fn from(e: &'a ElementNode) -> Self {
        RegionRef::Element(e)
    }
}

impl RegionRef<'_> {
    /// Human-readable description for status and log lines.
    pub fn describe(&self) -> String {
        match self {
            RegionRef::Selector(s) => (*s).to_string(),
            RegionRef::Element(e) => match e.id() {
                Some(id) => format!("{}#{id}", e.tag.name()),
                None => format!("<{}>", e.tag.name()),
            },
        }
    }
}

/// A resolved region: an element plus the page it lives on.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    pub element: &'a ElementNode,
    pub page: &'a Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_elements_with_attributes() {
        let nodes = parse_html(r#"<div id="main" class="a b"><p>Hello <span>there</span></p></div>"#);
        assert_eq!(nodes.len(), 1);
        let DomNode::Element(div) = &nodes[0] else {
            panic!("Expected element");
        };
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.id(), Some("main"));
        assert_eq!(div.classes().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(div.text_content(), "Hello there");
    }

    #[test]
    fn void_and_raw_text_elements() {
        let nodes = parse_html(
            r#"<head><title>x</title></head><script>if (a < b) {}</script><p>a<br>b</p><img src="x.png">"#,
        );
        assert_eq!(nodes.len(), 2, "head and script dropped: {nodes:?}");
        let DomNode::Element(p) = &nodes[0] else {
            panic!("Expected <p>");
        };
        assert_eq!(p.children.len(), 3);
        let DomNode::Element(img) = &nodes[1] else {
            panic!("Expected <img>");
        };
        assert_eq!(img.src(), Some("x.png"));
    }

    #[test]
    fn entities_are_decoded_once() {
        let nodes = parse_html("<p>&amp;lt; &lt;b&gt;</p>");
        let DomNode::Element(p) = &nodes[0] else {
            panic!("Expected <p>");
        };
        assert_eq!(p.text_content(), "&lt; <b>");
    }

    #[test]
    fn selector_by_class_id_and_tag() {
        let page = Page::parse(
            r#"<div class="wrap"><section id="s1"><p class="notice-detail-content big">x</p></section></div>"#,
        );
        assert!(page.query_selector(".notice-detail-content").is_some());
        assert!(page.query_selector("p.big").is_some());
        assert!(page.query_selector("#s1").is_some());
        assert!(page.query_selector("section#s1").is_some());
        assert!(page.query_selector("div#s1").is_none());
        assert!(page.query_selector(".missing").is_none());
    }

    #[test]
    fn descendant_selector_respects_ancestry() {
        let page = Page::parse(r#"<div class="a"><p class="t">1</p></div><p class="t" id="outside">2</p>"#);
        let inside = page.query_selector(".a .t").unwrap();
        assert_eq!(inside.text_content(), "1");
        assert!(page.query_selector(".b .t").is_none());
    }

    #[test]
    fn fragments_gain_a_body() {
        let page = Page::parse("<p>hi</p>");
        let body = page.query_selector("body").unwrap();
        assert_eq!(body.text_content(), "hi");

        let full = Page::parse("<html><body><p>hi</p></body></html>");
        assert_eq!(full.nodes().len(), 1);
        assert!(full.query_selector("html body p").is_some());
    }

    #[test]
    fn invalid_selector_resolves_to_nothing() {
        let page = Page::parse("<p>hi</p>");
        assert!(page.query_selector("p.").is_none());
        assert!(page.query_selector("   ").is_none());
    }
}
