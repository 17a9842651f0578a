//! In-memory SVG document tree.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Attributes and
//! style properties keep insertion order so serialized output is stable.

use std::collections::BTreeMap;
use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::geometry::fmt_num;

/// Index of a node in its [`SvgDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub name: String,
    attrs: Vec<(String, String)>,
    style: Vec<(String, String)>,
    children: Vec<NodeId>,
    text: Option<String>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn style(&self) -> &[(String, String)] {
        &self.style
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The `style` attribute value built from the style properties.
    pub fn style_string(&self) -> String {
        self.style
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// An SVG document: a root `<svg>` with a `<defs>` child.
#[derive(Debug, Clone)]
pub struct SvgDocument {
    nodes: Vec<Node>,
    root: NodeId,
    defs: NodeId,
    id_counters: BTreeMap<String, u32>,
}

impl SvgDocument {
    /// A document of `width` x `height` points.
    pub fn new(width: f64, height: f64) -> Self {
        let mut doc = SvgDocument {
            nodes: Vec::new(),
            root: NodeId(0),
            defs: NodeId(0),
            id_counters: BTreeMap::new(),
        };
        let root = doc.create("svg");
        doc.set_attr(root, "xmlns", "http://www.w3.org/2000/svg");
        doc.set_attr(root, "xmlns:xlink", "http://www.w3.org/1999/xlink");
        doc.set_attr(root, "xmlns:inkscape", "http://www.inkscape.org/namespaces/inkscape");
        doc.set_attr(root, "version", "1.1");
        doc.set_attr(root, "width", &fmt_num(width));
        doc.set_attr(root, "height", &fmt_num(height));
        doc.set_attr(
            root,
            "viewBox",
            &format!("0 0 {} {}", fmt_num(width), fmt_num(height)),
        );
        doc.root = root;
        doc.defs = doc.create_child(root, "defs");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn defs(&self) -> NodeId {
        self.defs
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Create a detached element.
    pub fn create(&mut self, name: &str) -> NodeId {
        self.nodes.push(Node {
            name: name.to_string(),
            ..Node::default()
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Create an element as the last child of `parent`.
    pub fn create_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.create(name);
        self.append(parent, id);
        id
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Remove `id` from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.last().copied()
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        let attrs = &mut self.node_mut(id).attrs;
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)
            .attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        self.node_mut(id).attrs.retain(|(k, _)| k != key);
    }

    pub fn set_style(&mut self, id: NodeId, key: &str, value: &str) {
        let style = &mut self.node_mut(id).style;
        match style.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => style.push((key.to_string(), value.to_string())),
        }
    }

    pub fn style(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)
            .style
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.node_mut(id).text = Some(text.to_string());
    }

    /// A fresh id such as `clipPath3`. Counters are per prefix.
    pub fn unique_id(&mut self, prefix: &str) -> String {
        let n = self.id_counters.entry(prefix.to_string()).or_insert(0);
        *n += 1;
        format!("{prefix}{n}")
    }

    /// The node's `id`, assigning a fresh one when missing.
    pub fn ensure_id(&mut self, node: NodeId, prefix: &str) -> String {
        if let Some(id) = self.attr(node, "id") {
            return id.to_string();
        }
        let id = self.unique_id(prefix);
        self.set_attr(node, "id", &id);
        id
    }

    /// Depth-first, document-order descendants of `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.node(n).children.iter().rev().copied());
        }
        out
    }

    /// All attached elements named `name`, in document order.
    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.node(*n).name == name)
            .collect()
    }

    /// Look up an attached element by its `id` attribute.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    pub fn write_to<W: io::Write>(&self, out: W) -> io::Result<()> {
        let mut writer = Writer::new(out);
        emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
        self.write_node(&mut writer, self.root)?;
        writer.into_inner().flush()
    }

    fn write_node<W: io::Write>(&self, writer: &mut Writer<W>, id: NodeId) -> io::Result<()> {
        let node = self.node(id);
        // Empty <defs> adds nothing.
        if id == self.defs && node.children.is_empty() {
            return Ok(());
        }
        let mut start = BytesStart::new(node.name.as_str());
        for (k, v) in &node.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if !node.style.is_empty() {
            let style = node.style_string();
            start.push_attribute(("style", style.as_str()));
        }

        if node.children.is_empty() && node.text.is_none() {
            return emit(writer, Event::Empty(start));
        }
        emit(writer, Event::Start(start))?;
        if let Some(ref text) = node.text {
            emit(writer, Event::Text(BytesText::new(text)))?;
        }
        for child in &node.children {
            self.write_node(writer, *child)?;
        }
        emit(writer, Event::End(BytesEnd::new(node.name.as_str())))
    }

    /// Serialize to a string.
    pub fn to_svg_string(&self) -> String {
        let mut buf = Vec::new();
        if self.write_to(&mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn emit<W: io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> io::Result<()> {
    writer.write_event(event).map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_defs() {
        let doc = SvgDocument::new(100.0, 50.5);
        assert_eq!(doc.node(doc.root()).name, "svg");
        assert_eq!(doc.node(doc.defs()).parent(), Some(doc.root()));
        assert_eq!(doc.attr(doc.root(), "viewBox"), Some("0 0 100 50.5"));
    }

    #[test]
    fn test_attrs_replace_in_place() {
        let mut doc = SvgDocument::new(1.0, 1.0);
        let g = doc.create_child(doc.root(), "g");
        doc.set_attr(g, "a", "1");
        doc.set_attr(g, "b", "2");
        doc.set_attr(g, "a", "3");
        assert_eq!(
            doc.node(g).attrs(),
            &[("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
        doc.remove_attr(g, "a");
        assert_eq!(doc.attr(g, "a"), None);
    }

    #[test]
    fn test_append_moves_node() {
        let mut doc = SvgDocument::new(1.0, 1.0);
        let a = doc.create_child(doc.root(), "g");
        let b = doc.create_child(doc.root(), "g");
        let p = doc.create_child(a, "path");
        doc.append(b, p);
        assert!(doc.node(a).children().is_empty());
        assert_eq!(doc.node(b).children(), &[p]);
        assert_eq!(doc.node(p).parent(), Some(b));
        doc.detach(p);
        assert!(doc.node(b).children().is_empty());
    }

    #[test]
    fn test_unique_ids_per_prefix() {
        let mut doc = SvgDocument::new(1.0, 1.0);
        assert_eq!(doc.unique_id("clipPath"), "clipPath1");
        assert_eq!(doc.unique_id("clipPath"), "clipPath2");
        assert_eq!(doc.unique_id("mask"), "mask1");
        let g = doc.create_child(doc.root(), "g");
        let id = doc.ensure_id(g, "g");
        assert_eq!(doc.ensure_id(g, "g"), id);
        assert_eq!(doc.find_by_id(&id), Some(g));
    }

    #[test]
    fn test_serialization_escapes_and_orders() {
        let mut doc = SvgDocument::new(10.0, 10.0);
        let t = doc.create_child(doc.root(), "text");
        doc.set_style(t, "font-family", "Foo & Bar");
        doc.set_style(t, "font-size", "12");
        doc.set_text(t, "a<b");
        let svg = doc.to_svg_string();
        assert!(svg.starts_with("<?xml version=\"1.0\""));
        assert!(!svg.contains("<defs"));
        assert!(svg.contains("style=\"font-family:Foo &amp; Bar;font-size:12\""));
        assert!(svg.contains(">a&lt;b</text>"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let mut doc = SvgDocument::new(1.0, 1.0);
        let g = doc.create_child(doc.root(), "g");
        let p1 = doc.create_child(g, "path");
        let p2 = doc.create_child(doc.root(), "path");
        assert_eq!(doc.elements_named("path"), vec![p1, p2]);
    }
}
