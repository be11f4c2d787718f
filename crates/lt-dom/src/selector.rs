//! Selector subset used for table lookups: `tag`, `*`, `#id`, `.class`,
//! `[attr]`, `[attr=value]`, descendant and child combinators, comma groups.

use crate::Document;
use crate::NodeId;
use lt_core::TableError;
use lt_core::TableResult;

/// Parsed, comma-separated selector groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    groups: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<CompoundSelector>,
    // combinators[i] joins compounds[i] and compounds[i + 1]
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    value: Option<String>,
}

impl SelectorList {
    pub fn parse(input: &str) -> TableResult<Self> {
        let mut groups = Vec::new();
        for part in split_groups(input) {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                return Err(TableError::selector(input));
            }
            let group = parse_complex(trimmed).ok_or_else(|| TableError::selector(input))?;
            groups.push(group);
        }
        Ok(Self { groups })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        doc.element(node).is_some() && self.groups.iter().any(|group| group.matches(doc, node))
    }
}

impl ComplexSelector {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        match self.compounds.len() {
            0 => false,
            len => self.match_from(doc, node, len - 1),
        }
    }

    fn match_from(&self, doc: &Document, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(doc, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent_element(node)
                .is_some_and(|parent| self.match_from(doc, parent, idx - 1)),
            Combinator::Descendant => {
                let mut cursor = doc.parent_element(node);
                while let Some(ancestor) = cursor {
                    if self.match_from(doc, ancestor, idx - 1) {
                        return true;
                    }
                    cursor = doc.parent_element(ancestor);
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if tag != "*" && !element.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }

        self.attrs.iter().all(|attr| match (&attr.value, element.attr(&attr.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

fn split_groups(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut quote: Option<u8> = None;
    let mut bracket_depth = 0_u32;

    for (idx, byte) in input.bytes().enumerate() {
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
            continue;
        }

        match byte {
            b'\'' | b'"' => quote = Some(byte),
            b'[' => bracket_depth = bracket_depth.saturating_add(1),
            b']' => bracket_depth = bracket_depth.saturating_sub(1),
            b',' if bracket_depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx.saturating_add(1);
            }
            _ => {}
        }
    }

    parts.push(&input[start..]);
    parts
}

fn parse_complex(input: &str) -> Option<ComplexSelector> {
    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut current = CompoundSelector::default();
    let mut pending: Option<Combinator> = None;

    while idx < bytes.len() {
        let byte = bytes[idx];

        if byte.is_ascii_whitespace() {
            if !current.is_empty() {
                compounds.push(std::mem::take(&mut current));
                pending = Some(Combinator::Descendant);
            }
            idx = idx.saturating_add(1);
            continue;
        }

        if byte == b'>' {
            if !current.is_empty() {
                compounds.push(std::mem::take(&mut current));
            } else if compounds.is_empty() || pending == Some(Combinator::Child) {
                return None;
            }
            pending = Some(Combinator::Child);
            idx = idx.saturating_add(1);
            continue;
        }

        if current.is_empty() {
            if let Some(combinator) = pending.take() {
                combinators.push(combinator);
            }
        }

        match byte {
            b'*' => {
                if current.tag.is_some() {
                    return None;
                }
                current.tag = Some("*".to_owned());
                idx = idx.saturating_add(1);
            }
            b'#' => {
                let (ident, next) = read_ident(bytes, idx.saturating_add(1))?;
                current.id = Some(ident);
                idx = next;
            }
            b'.' => {
                let (ident, next) = read_ident(bytes, idx.saturating_add(1))?;
                current.classes.push(ident);
                idx = next;
            }
            b'[' => {
                let (attr, next) = read_attr(input, idx.saturating_add(1))?;
                current.attrs.push(attr);
                idx = next;
            }
            _ if is_ident_byte(byte) => {
                if current.tag.is_some() || !current.is_empty() {
                    return None;
                }
                let (ident, next) = read_ident(bytes, idx)?;
                current.tag = Some(ident.to_ascii_lowercase());
                idx = next;
            }
            _ => return None,
        }
    }

    if current.is_empty() {
        // trailing combinator such as `tr >`
        if pending == Some(Combinator::Child) {
            return None;
        }
    } else {
        compounds.push(current);
    }

    if compounds.is_empty() || combinators.len() + 1 != compounds.len() {
        return None;
    }

    Some(ComplexSelector {
        compounds,
        combinators,
    })
}

fn read_ident(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start;
    while idx < bytes.len() && is_ident_byte(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == start {
        return None;
    }
    Some((String::from_utf8_lossy(&bytes[start..idx]).into_owned(), idx))
}

fn read_attr(input: &str, start: usize) -> Option<(AttrSelector, usize)> {
    let rest = input.get(start..)?;
    let close = find_attr_close(rest)?;
    let body = rest[..close].trim();
    let next = start + close + 1;

    let Some((name, value)) = body.split_once('=') else {
        let name = body.to_ascii_lowercase();
        if name.is_empty() || !name.bytes().all(is_ident_byte) {
            return None;
        }
        return Some((AttrSelector { name, value: None }, next));
    };

    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || !name.bytes().all(is_ident_byte) {
        return None;
    }

    let value = value.trim();
    let value = match value.as_bytes().first().copied() {
        Some(quote @ (b'"' | b'\'')) => {
            let inner = value.get(1..)?;
            inner.strip_suffix(quote as char)?.to_owned()
        }
        _ => value.to_owned(),
    };

    Some((
        AttrSelector {
            name,
            value: Some(value),
        },
        next,
    ))
}

fn find_attr_close(input: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, byte) in input.bytes().enumerate() {
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
            continue;
        }
        match byte {
            b'\'' | b'"' => quote = Some(byte),
            b']' => return Some(idx),
            _ => {}
        }
    }
    None
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || byte >= 0x80
}

#[cfg(test)]
mod tests {
    use super::SelectorList;
    use crate::Document;
    use lt_core::TableResult;

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "tr[", "a,,b", "> tr", "tr >", "tr > > td", "td!", "#", ".a.", "div*"] {
            assert!(SelectorList::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn matches_compound_and_combinators() -> TableResult<()> {
        let mut doc = Document::new();
        let table = doc.create_element("table");
        doc.append_child(doc.root(), table)?;
        doc.set_attr(table, "id", "live")?;
        doc.set_attr(table, "class", "grid wide")?;
        doc.set_attr(table, "data-kind", "feed")?;
        let tbody = doc.create_element("tbody");
        doc.append_child(table, tbody)?;
        let tr = doc.create_element("tr");
        doc.append_child(tbody, tr)?;
        let th = doc.create_element("th");
        let td = doc.create_element("td");
        doc.append_child(tr, th)?;
        doc.append_child(tr, td)?;

        assert!(doc.matches(table, "table#live.grid.wide")?);
        assert!(doc.matches(table, "[data-kind='feed']")?);
        assert!(doc.matches(table, "[data-kind]")?);
        assert!(!doc.matches(table, "[data-kind=other]")?);
        assert!(doc.matches(td, "#live td")?);
        assert!(!doc.matches(td, "table > tr > td")?);
        assert!(doc.matches(td, "table > tbody > tr > td")?);
        assert_eq!(doc.query_selector_all(tr, "td,th")?, vec![th, td]);
        assert_eq!(doc.query_selector(doc.root(), "*")?, Some(table));
        Ok(())
    }
}
