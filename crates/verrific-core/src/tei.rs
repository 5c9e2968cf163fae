//! Minimal, tolerant element tree for TEI documents.
//!
//! Built from `quick-xml` events with namespace resolution. Broken markup never
//! aborts parsing: mismatched end tags close the nearest matching open element
//! (or are dropped), elements still open at end of input are closed, and text
//! with undecodable entities is kept verbatim.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Namespace of TEI P5 documents, as produced by GROBID.
pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its resolved namespace and local name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    /// Attributes keyed by local name, in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name == local && self.namespace.as_deref() == Some(namespace)
    }

    pub fn is_tei(&self, local: &str) -> bool {
        self.is(TEI_NS, local)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// All descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.children().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// Descendant elements matching a TEI local name.
    pub fn find_tei<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |el| el.is_tei(local))
    }

    /// Direct TEI children of every `parent` descendant, e.g. `.//analytic/title`.
    pub fn find_tei_children<'a>(
        &'a self,
        parent: &'a str,
        child: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.find_tei(parent)
            .flat_map(move |p| p.children().filter(move |c| c.is_tei(child)))
    }

    /// String value of the element with whitespace runs collapsed to one space.
    pub fn text(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        collapse_whitespace(&raw)
    }

    /// Every non-blank text node below this element, each whitespace-collapsed.
    pub fn text_fragments(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fragments(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }

    fn collect_fragments(&self, out: &mut Vec<String>) {
        for node in &self.children {
            match node {
                Node::Text(t) => {
                    let fragment = collapse_whitespace(t);
                    if !fragment.is_empty() {
                        out.push(fragment);
                    }
                }
                Node::Element(el) => el.collect_fragments(out),
            }
        }
    }
}

/// Pre-order iterator over descendant elements.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(next.children());
        self.stack[start..].reverse();
        Some(next)
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a document into a synthetic root element holding the top-level nodes.
pub fn parse(input: &[u8]) -> Element {
    let mut reader = NsReader::from_reader(input);
    let config = reader.config_mut();
    config.trim_text(false);
    config.expand_empty_elements = true;
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut stack: Vec<Element> = vec![Element::default()];
    let mut buf = Vec::with_capacity(4096);
    let mut last_error_at = None;

    loop {
        let position = reader.buffer_position();
        let decoder = reader.decoder();
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(ref e))) => stack.push(open_element(ns, e, decoder)),
            Ok((_, Event::End(ref e))) => close_element(&mut stack, e.local_name().as_ref()),
            Ok((_, Event::Text(ref e))) => {
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => String::from_utf8_lossy(e.as_ref()).into_owned(),
                };
                push_text(&mut stack, text);
            }
            Ok((_, Event::CData(ref e))) => {
                push_text(&mut stack, String::from_utf8_lossy(e.as_ref()).into_owned());
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(err) => {
                // The reader normally skips past the offending markup. If it
                // didn't move, nothing more can be recovered.
                if last_error_at == Some(position) {
                    tracing::debug!(position, error = %err, "giving up on malformed markup");
                    break;
                }
                tracing::trace!(position, error = %err, "skipping malformed markup");
                last_error_at = Some(position);
            }
        }
        buf.clear();
    }

    while stack.len() > 1 {
        pop_into_parent(&mut stack);
    }
    stack.pop().unwrap_or_default()
}

fn open_element(ns: ResolveResult<'_>, e: &BytesStart<'_>, decoder: Decoder) -> Element {
    let namespace = match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };

    let mut attributes = Vec::new();
    let mut attrs = e.attributes();
    attrs.with_checks(false);
    for attr in attrs.flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(decoder) {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }

    Element {
        namespace,
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    }
}

fn close_element(stack: &mut Vec<Element>, local: &[u8]) {
    let name = String::from_utf8_lossy(local);
    // Index 0 is the synthetic root and never closes.
    let Some(pos) = stack.iter().skip(1).rposition(|el| el.name == name) else {
        return;
    };
    let target = pos + 1;
    while stack.len() > target {
        pop_into_parent(stack);
    }
}

fn pop_into_parent(stack: &mut Vec<Element>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(el) = stack.pop()
        && let Some(parent) = stack.last_mut()
    {
        parent.children.push(Node::Element(el));
    }
}

fn push_text(stack: &mut [Element], text: String) {
    if let Some(current) = stack.last_mut() {
        current.children.push(Node::Text(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(it: impl Iterator<Item = &'a Element>) -> Vec<&'a str> {
        it.map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn resolves_default_namespace() {
        let root = parse(br#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><title>A</title></TEI>"#);
        let title = root.find_tei("title").next().unwrap();
        assert_eq!(title.namespace.as_deref(), Some(TEI_NS));
        assert_eq!(title.text(), "A");
    }

    #[test]
    fn prefixed_and_foreign_namespaces() {
        let root = parse(
            br#"<t:TEI xmlns:t="http://www.tei-c.org/ns/1.0" xmlns:x="urn:other">
                <t:title>Kept</t:title><x:title>Other</x:title><title>None</title>
            </t:TEI>"#,
        );
        let titles: Vec<String> = root.find_tei("title").map(|t| t.text()).collect();
        assert_eq!(titles, vec!["Kept"]);
    }

    #[test]
    fn descendants_in_document_order() {
        let root = parse(b"<a><b><c/></b><d><e/></d></a>");
        assert_eq!(names(root.descendants()), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn text_collapses_inline_markup() {
        let root = parse(b"<title>On the <hi>k</hi>-SAT\n   problem</title>");
        let title = root.children().next().unwrap();
        assert_eq!(title.text(), "On the k-SAT problem");
        assert_eq!(title.text_fragments(), vec!["On the", "k", "-SAT problem"]);
    }

    #[test]
    fn attributes_use_local_names_and_unescape() {
        let root = parse(br#"<idno xml:id="x1" type="DOI" note="a &amp; b">10.1/x</idno>"#);
        let idno = root.children().next().unwrap();
        assert_eq!(idno.attr("type"), Some("DOI"));
        assert_eq!(idno.attr("id"), Some("x1"));
        assert_eq!(idno.attr("note"), Some("a & b"));
    }

    #[test]
    fn mismatched_end_tag_closes_nearest_open_element() {
        let root = parse(b"<a><b><c>text</b><d/></a>");
        let a = root.children().next().unwrap();
        assert_eq!(names(a.children()), vec!["b", "d"]);
        assert_eq!(a.text(), "text");
    }

    #[test]
    fn truncated_document_keeps_partial_tree() {
        let root = parse(b"<a><b>first</b><b>second");
        let a = root.children().next().unwrap();
        let texts: Vec<String> = a.children().map(|b| b.text()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn stray_end_tag_is_ignored() {
        let root = parse(b"<a></z><b>ok</b></a>");
        let a = root.children().next().unwrap();
        assert_eq!(names(a.children()), vec!["b"]);
    }

    #[test]
    fn attribute_with_undecodable_entity_falls_back_to_raw() {
        let root = parse(br#"<idno type="DOI" note="a &bogus; b">10.1/x</idno>"#);
        let idno = root.children().next().unwrap();
        assert_eq!(idno.attr("type"), Some("DOI"));
        assert_eq!(idno.attr("note"), Some("a &bogus; b"));
        assert_eq!(idno.text(), "10.1/x");
    }

    #[test]
    fn unknown_entity_is_kept_verbatim() {
        let root = parse(b"<p>a&nbsp;b</p>");
        assert!(root.text().contains("a"));
        assert!(root.text().contains("b"));
    }

    #[test]
    fn empty_input_yields_empty_root() {
        let root = parse(b"");
        assert_eq!(root.descendants().count(), 0);
    }
}
