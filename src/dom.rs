//! Markup parser for the HTML backend.
//!
//! The markup is produced by [`crate::html`], so the parser only needs the
//! subset that generator emits: block containers, headings, paragraphs,
//! inline spans, tables and images, styled through `style` attributes.

use std::collections::HashMap;

/// Supported element names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Div,
    Section,
    Header,
    Footer,
    H1,
    H2,
    P,
    Span,
    Strong,
    Table,
    Tr,
    Td,
    Th,
    Img,
    Br,
    /// Anything else. Kept in the tree but never displayed.
    Unknown(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "section" => Tag::Section,
            "header" => Tag::Header,
            "footer" => Tag::Footer,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "p" => Tag::P,
            "span" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "img" => Tag::Img,
            "br" => Tag::Br,
            _ => Tag::Unknown(name.to_string()),
        }
    }

    /// Elements without a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Img | Tag::Br)
    }

    /// Elements whose inline children are flowed as one wrapped text run.
    pub fn is_text_block(&self) -> bool {
        matches!(self, Tag::P | Tag::H1 | Tag::H2 | Tag::Td | Tag::Th)
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

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

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// `data-label` marks boxes that callers want to find after layout
    /// (section roots, schedule and contact rows).
    pub fn label(&self) -> Option<&str> {
        self.attr("data-label")
    }
}

/// Parse markup into a list of top-level nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    Cursor { src: html, pos: 0 }.nodes()
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn bump(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    /// Advance past the next occurrence of `needle`, or to the end.
    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(i) => self.bump(i + needle.len()),
            None => self.pos = self.src.len(),
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn nodes(&mut self) -> Vec<DomNode> {
        let mut out = Vec::new();
        while !self.done() && !self.at("</") {
            if self.at("<!--") {
                self.skip_past("-->");
            } else if self.at("<!") || self.at("<?") {
                self.skip_past(">");
            } else if self.at("<") {
                out.push(DomNode::Element(self.element()));
            } else {
                let end = self.rest().find('<').unwrap_or(self.rest().len());
                let raw = &self.rest()[..end];
                self.bump(end);
                // Whitespace between tags carries no content.
                if !raw.trim().is_empty() {
                    out.push(DomNode::Text(decode_entities(raw)));
                }
            }
        }
        out
    }

    fn name(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        self.bump(end);
        &rest[..end]
    }

    fn element(&mut self) -> ElementNode {
        self.bump(1); // '<'
        let mut elem = ElementNode::new(Tag::parse(self.name()));

        loop {
            self.skip_ws();
            if self.done() || self.at(">") || self.at("/>") {
                break;
            }
            let key = self.name().to_ascii_lowercase();
            if key.is_empty() {
                // Stray character inside a tag; drop it.
                self.bump(self.rest().chars().next().map_or(1, char::len_utf8));
                continue;
            }
            self.skip_ws();
            let value = if self.at("=") {
                self.bump(1);
                self.skip_ws();
                self.attr_value()
            } else {
                String::new()
            };
            elem.attributes.insert(key, value);
        }

        if self.at("/>") {
            self.bump(2);
            return elem;
        }
        self.bump(1); // '>'
        if elem.tag.is_void() {
            return elem;
        }

        elem.children = self.nodes();
        if self.at("</") {
            self.skip_past(">");
        }
        elem
    }

    fn attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.rest().starts_with(quote) {
                self.bump(1);
                let end = self.rest().find(quote).unwrap_or(self.rest().len());
                let value = decode_entities(&self.rest()[..end]);
                self.bump(end + 1);
                return value;
            }
        }
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        self.bump(end);
        decode_entities(&rest[..end])
    }
}

/// Escape text for inclusion in markup. Inverse of [`decode_entities`].
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
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

/// Children of `<body>`, or the nodes themselves when there is no body.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            match e.tag {
                Tag::Body => return e.children.clone(),
                Tag::Html => {
                    let inner = body_children(&e.children);
                    if !inner.is_empty() {
                        return inner;
                    }
                }
                _ => {}
            }
        }
    }
    nodes.to_vec()
}
