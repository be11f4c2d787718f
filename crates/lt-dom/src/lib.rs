//! DOM tree data structures.

mod selector;

pub use selector::SelectorList;

use lt_core::TableError;
use lt_core::TableResult;
use lt_css::StyleDeclarations;

/// ID used to address nodes in the DOM arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

/// Element payload. The `style` attribute is held as parsed declarations and
/// exposed through [`Element::style`], never through [`Element::attr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag_name: String,
    attrs: Vec<(String, String)>,
    style: StyleDeclarations,
}

impl Element {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.trim().to_ascii_lowercase(),
            attrs: Vec::new(),
            style: StyleDeclarations::empty(),
        }
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn style(&self) -> &StyleDeclarations {
        &self.style
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.trim().to_ascii_lowercase();
        if name == "style" {
            self.style = StyleDeclarations::parse(value);
            return;
        }

        if let Some(entry) = self.attrs.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value.to_owned();
        } else {
            self.attrs.push((name, value.to_owned()));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena-backed document. Nodes are never freed; detached nodes simply have
/// no parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element::new(tag_name)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_owned()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Comment(text.to_owned()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> TableResult<&mut Element> {
        match self.nodes.get_mut(id.0).map(|node| &mut node.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(_) => Err(TableError::dom(format!("node {} is not an element", id.0))),
            None => Err(TableError::dom(format!("unknown node {}", id.0))),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag_name)
    }

    pub fn is_element_named(&self, id: NodeId, tag_name: &str) -> bool {
        self.tag_name(id)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(tag_name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|parent| self.element(*parent).is_some())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let pos = siblings.iter().position(|sibling| *sibling == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Outermost ancestor of `id`: the document root for connected nodes.
    pub fn top_ancestor(&self, id: NodeId) -> NodeId {
        let mut top = id;
        while let Some(parent) = self.parent(top) {
            top = parent;
        }
        top
    }

    /// Direct element children with the given tag name.
    pub fn children_named(&self, id: NodeId, tag_name: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element_named(*child, tag_name))
            .collect()
    }

    /// Pre-order descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root(), id)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> TableResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` before `reference` under `parent`, or appends when
    /// `reference` is `None`. The child is first detached from any old parent.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> TableResult<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(TableError::dom("insertBefore node is invalid"));
        }
        if matches!(self.kind(parent), Some(NodeKind::Text(_) | NodeKind::Comment(_))) {
            return Err(TableError::dom("insertBefore target cannot have children"));
        }
        if child == self.root() {
            return Err(TableError::dom("cannot insert the document root"));
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(TableError::dom(
                    "insertBefore reference is not a direct child",
                ));
            }
            if reference == child {
                return Ok(());
            }
        }

        // parent must not sit inside child's subtree
        if self.is_inclusive_ancestor(child, parent) {
            return Err(TableError::dom("insertBefore would create a cycle"));
        }

        self.detach(child);

        let index = match reference {
            Some(reference) => self.nodes[parent.0]
                .children
                .iter()
                .position(|id| *id == reference)
                .ok_or_else(|| TableError::dom("insertBefore reference is missing"))?,
            None => self.nodes[parent.0].children.len(),
        };

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
        Ok(())
    }

    /// Unlinks a node from its parent. No-op for already detached nodes.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
        self.nodes[id.0].parent = None;
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get_mut(id.0)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> TableResult<()> {
        self.element_mut(id)?;
        self.clear_children(id);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node)?;
        }
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => text.clone(),
            Some(NodeKind::Comment(_)) | None => String::new(),
            Some(NodeKind::Document | NodeKind::Element(_)) => self
                .descendants(id)
                .into_iter()
                .filter_map(|node| match self.kind(node) {
                    Some(NodeKind::Text(text)) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> TableResult<()> {
        self.element_mut(id)?.set_attr(name, value);
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.element(id)
            .is_some_and(|element| element.has_class(class_name))
    }

    pub fn add_class(&mut self, id: NodeId, class_name: &str) -> TableResult<()> {
        let element = self.element_mut(id)?;
        if element.has_class(class_name) {
            return Ok(());
        }
        let classes = match element.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class_name}"),
            _ => class_name.to_owned(),
        };
        element.set_attr("class", &classes);
        Ok(())
    }

    pub fn style(&self, id: NodeId) -> Option<&StyleDeclarations> {
        self.element(id).map(Element::style)
    }

    pub fn style_value(&self, id: NodeId, property: &str) -> Option<&str> {
        self.style(id).and_then(|style| style.get(property))
    }

    /// Equivalent of `element.style[property] = value`.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> TableResult<()> {
        self.element_mut(id)?.style.set(property, value);
        Ok(())
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        if element_id.is_empty() {
            return None;
        }
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.attr(*node, "id") == Some(element_id))
    }

    /// First element under `scope` (exclusive) matching `selector`, in
    /// document order.
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> TableResult<Option<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .find(|node| list.matches(self, *node)))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> TableResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|node| list.matches(self, *node))
            .collect())
    }

    pub fn matches(&self, id: NodeId, selector: &str) -> TableResult<bool> {
        Ok(SelectorList::parse(selector)?.matches(self, id))
    }
}

#[cfg(test)]
mod tests {
    use super::Document;
    use super::NodeKind;
    use lt_core::TableResult;

    fn table_with_rows(doc: &mut Document, rows: usize) -> TableResult<(super::NodeId, Vec<super::NodeId>)> {
        let table = doc.create_element("TABLE");
        doc.append_child(doc.root(), table)?;
        let mut out = Vec::new();
        for _ in 0..rows {
            let tr = doc.create_element("tr");
            doc.append_child(table, tr)?;
            out.push(tr);
        }
        Ok((table, out))
    }

    #[test]
    fn insert_before_moves_and_orders_children() -> TableResult<()> {
        let mut doc = Document::new();
        let (table, rows) = table_with_rows(&mut doc, 3)?;
        doc.insert_before(table, rows[2], Some(rows[0]))?;
        assert_eq!(doc.children(table), &[rows[2], rows[0], rows[1]]);

        let thead = doc.create_element("thead");
        doc.insert_before(table, thead, doc.children(table).first().copied())?;
        doc.append_child(thead, rows[2])?;
        assert_eq!(doc.children(table), &[thead, rows[0], rows[1]]);
        assert_eq!(doc.parent(rows[2]), Some(thead));
        assert_eq!(doc.tag_name(table), Some("table"));
        Ok(())
    }

    #[test]
    fn rejects_cycles_and_foreign_references() -> TableResult<()> {
        let mut doc = Document::new();
        let (table, rows) = table_with_rows(&mut doc, 2)?;
        assert!(doc.append_child(rows[0], table).is_err());
        assert!(doc.insert_before(rows[0], rows[1], Some(table)).is_err());
        let text = doc.create_text("x");
        assert!(doc.append_child(text, rows[0]).is_err());
        assert_eq!(doc.children(table), &[rows[0], rows[1]]);
        Ok(())
    }

    #[test]
    fn style_and_class_helpers_round_through_attributes() -> TableResult<()> {
        let mut doc = Document::new();
        let (_, rows) = table_with_rows(&mut doc, 1)?;
        let row = rows[0];
        doc.set_attr(row, "style", "display: none")?;
        doc.set_style(row, "width", "20px")?;
        assert_eq!(doc.style_value(row, "display"), Some("none"));
        assert_eq!(doc.style_value(row, "width"), Some("20px"));
        assert_eq!(doc.attr(row, "style"), None);

        doc.add_class(row, "a")?;
        doc.add_class(row, "b")?;
        doc.add_class(row, "a")?;
        assert_eq!(doc.attr(row, "class"), Some("a b"));
        assert!(doc.has_class(row, "b"));
        Ok(())
    }

    #[test]
    fn text_content_and_queries() -> TableResult<()> {
        let mut doc = Document::new();
        let (table, rows) = table_with_rows(&mut doc, 2)?;
        doc.set_attr(table, "id", "live")?;
        let td = doc.create_element("td");
        doc.append_child(rows[1], td)?;
        doc.set_text_content(td, "hello")?;

        assert_eq!(doc.text_content(table), "hello");
        assert_eq!(doc.get_element_by_id("live"), Some(table));
        assert_eq!(doc.query_selector(doc.root(), "#live tr")?, Some(rows[0]));
        assert_eq!(doc.query_selector_all(table, "tr > td")?, vec![td]);
        assert!(matches!(doc.kind(doc.children(td)[0]), Some(NodeKind::Text(_))));
        Ok(())
    }

    #[test]
    fn detached_nodes_are_not_connected() -> TableResult<()> {
        let mut doc = Document::new();
        let (table, rows) = table_with_rows(&mut doc, 1)?;
        doc.detach(rows[0]);
        assert!(!doc.is_connected(rows[0]));
        assert!(doc.is_connected(table));
        assert!(doc.children(table).is_empty());

        // detaching twice is harmless
        doc.detach(rows[0]);
        assert_eq!(doc.parent(rows[0]), None);
        Ok(())
    }
}
