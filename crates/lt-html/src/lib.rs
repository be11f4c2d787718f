//! HTML tokenization, tree building and serialization.

use lt_core::TableError;
use lt_core::TableResult;
use lt_dom::Document;
use lt_dom::NodeId;
use lt_dom::NodeKind;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is kept verbatim up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];
/// Like raw text, but character references are still decoded.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

/// Parses raw HTML into a DOM document.
///
/// Table content is kept as written: rows outside a section are not wrapped
/// in an implicit `<tbody>`.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        let mut doc = Document::new();
        let root = doc.root();
        // the root accepts any child, so tree building cannot fail here
        if let Err(error) = build_tree(&mut doc, root, input) {
            log::warn!("html tree building stopped early: {error}");
        }
        doc
    }

    /// Parses `markup` and appends the resulting nodes under `parent`,
    /// the way `innerHTML +=` would on an empty element.
    pub fn parse_fragment_into(
        &self,
        doc: &mut Document,
        parent: NodeId,
        markup: &str,
    ) -> TableResult<()> {
        if doc.element(parent).is_none() {
            return Err(TableError::dom("fragment parent is not an element"));
        }
        build_tree(doc, parent, markup)
    }
}

fn build_tree(doc: &mut Document, base: NodeId, input: &str) -> TableResult<()> {
    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut stack = vec![base];

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            append_text(doc, current(&stack, base), &decode_entities(&input[idx..next]))?;
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            let body_start = idx.saturating_add(4);
            let (body_end, after) = match find_subslice(bytes, body_start, b"-->") {
                Some(end) => (end, end.saturating_add(3)),
                None => (bytes.len(), bytes.len()),
            };
            let comment = doc.create_comment(input.get(body_start..body_end).unwrap_or_default());
            doc.append_child(current(&stack, base), comment)?;
            idx = after;
            continue;
        }

        if starts_with(bytes, idx, b"<!") {
            idx = skip_to_gt(bytes, idx.saturating_add(2));
            continue;
        }

        if starts_with(bytes, idx, b"<?") {
            idx = skip_processing_instruction(bytes, idx);
            continue;
        }

        let Some((tag, next_idx)) = parse_tag(input, idx) else {
            // a lone `<` is text
            append_text(doc, current(&stack, base), "<")?;
            idx = idx.saturating_add(1);
            continue;
        };

        if tag.is_end {
            match stack
                .iter()
                .rposition(|open| doc.is_element_named(*open, &tag.name))
                .filter(|pos| *pos > 0)
            {
                Some(pos) => stack.truncate(pos),
                None => log::debug!("ignoring stray end tag </{}>", tag.name),
            }
            idx = next_idx;
            continue;
        }

        close_implied_elements(doc, &mut stack, &tag.name);

        let element = doc.create_element(&tag.name);
        for (name, value) in &tag.attrs {
            if doc.attr(element, name).is_none() {
                doc.set_attr(element, name, value)?;
            }
        }
        doc.append_child(current(&stack, base), element)?;

        let is_raw = RAW_TEXT_ELEMENTS.contains(&tag.name.as_str());
        let is_escapable_raw = ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&tag.name.as_str());
        if !tag.self_closing && (is_raw || is_escapable_raw) {
            let (raw, after_raw) = read_raw_text_until_end_tag(input, next_idx, &tag.name);
            let text = if is_raw {
                raw.to_owned()
            } else {
                decode_entities(raw)
            };
            append_text(doc, element, &text)?;
            idx = after_raw;
            continue;
        }

        if !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str()) {
            stack.push(element);
        }
        idx = next_idx;
    }

    Ok(())
}

fn current(stack: &[NodeId], base: NodeId) -> NodeId {
    stack.last().copied().unwrap_or(base)
}

fn append_text(doc: &mut Document, parent: NodeId, text: &str) -> TableResult<()> {
    if text.is_empty() {
        return Ok(());
    }
    let node = doc.create_text(text);
    doc.append_child(parent, node)
}

/// Pops elements that an incoming start tag closes implicitly, e.g. an open
/// `<tr>` (and its cells) when the next `<tr>` starts.
fn close_implied_elements(doc: &Document, stack: &mut Vec<NodeId>, incoming: &str) {
    if matches!(incoming, "thead" | "tbody" | "tfoot") {
        if let Some(pos) = stack
            .iter()
            .rposition(|open| doc.is_element_named(*open, "table"))
        {
            stack.truncate(pos + 1);
        }
        return;
    }

    let (targets, boundaries): (&[&str], &[&str]) = match incoming {
        "tr" => (&["tr"], &["thead", "tbody", "tfoot", "table"]),
        "td" | "th" => (&["td", "th"], &["tr", "table"]),
        "li" => (&["li"], &["ul", "ol"]),
        "option" => (&["option"], &["select", "datalist"]),
        "p" | "div" | "table" | "ul" | "ol" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            (&["p"], &["button", "td", "th", "table"])
        }
        _ => return,
    };

    // stack[0] is the insertion base and never popped
    for pos in (1..stack.len()).rev() {
        let Some(tag) = doc.tag_name(stack[pos]) else {
            continue;
        };
        if targets.contains(&tag) {
            stack.truncate(pos);
            return;
        }
        if boundaries.contains(&tag) {
            return;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    attrs: Vec<(String, String)>,
    is_end: bool,
    self_closing: bool,
}

fn parse_tag(input: &str, start: usize) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start.saturating_add(1);
    let mut is_end = false;
    if bytes.get(idx).copied() == Some(b'/') {
        is_end = true;
        idx = idx.saturating_add(1);
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }

    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = input[name_start..idx].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx).copied() {
            None => return None,
            Some(b'>') => break,
            Some(b'/') => {
                idx = idx.saturating_add(1);
                if bytes.get(idx).copied() == Some(b'>') {
                    self_closing = true;
                    break;
                }
                continue;
            }
            Some(_) => {}
        }

        let attr_start = idx;
        while idx < bytes.len() && !is_attr_name_terminator(bytes[idx]) {
            idx = idx.saturating_add(1);
        }
        if idx == attr_start {
            // a stray `=` or quote before any name
            idx = idx.saturating_add(1);
            continue;
        }
        let attr_name = input[attr_start..idx].to_ascii_lowercase();

        idx = skip_spaces(bytes, idx);
        if bytes.get(idx).copied() != Some(b'=') {
            attrs.push((attr_name, String::new()));
            continue;
        }

        idx = skip_spaces(bytes, idx.saturating_add(1));
        let value = match bytes.get(idx).copied() {
            Some(quote @ (b'"' | b'\'')) => {
                let value_start = idx.saturating_add(1);
                let value_end = find_byte(bytes, value_start, quote)?;
                idx = value_end.saturating_add(1);
                &input[value_start..value_end]
            }
            _ => {
                let value_start = idx;
                while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() && bytes[idx] != b'>'
                {
                    idx = idx.saturating_add(1);
                }
                &input[value_start..idx]
            }
        };
        attrs.push((attr_name, decode_entities(value)));
    }

    Some((
        ParsedTag {
            name,
            attrs,
            is_end,
            self_closing,
        },
        idx.saturating_add(1),
    ))
}

fn read_raw_text_until_end_tag<'a>(
    input: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            if let Some((_, end_idx)) = parse_tag(input, idx) {
                return (&input[start..idx], end_idx);
            }
        }

        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

/// Decodes the handful of character references that show up in table
/// markup. Unknown references are left as written.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_reference(&tail[1..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Serializes a node and its subtree. For the document node this is the
/// concatenation of its children.
pub fn serialize(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Serializes the children of a node, like `element.innerHTML`.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(id) {
        write_node(doc, *child, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        None => {}
        Some(NodeKind::Document) => {
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
        }
        Some(NodeKind::Text(text)) => {
            let raw_parent = doc
                .parent(id)
                .and_then(|parent| doc.tag_name(parent))
                .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
            if raw_parent {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Some(NodeKind::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Some(NodeKind::Element(element)) => {
            out.push('<');
            out.push_str(element.tag_name());
            for (name, value) in element.attrs() {
                push_attr(out, name, value);
            }
            if !element.style().is_empty() {
                push_attr(out, "style", &element.style().to_string());
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&element.tag_name()) {
                return;
            }

            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(element.tag_name());
            out.push('>');
        }
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

/// Escapes text so it renders literally when placed in element content.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn skip_processing_instruction(bytes: &[u8], start: usize) -> usize {
    if let Some(end) = find_subslice(bytes, start.saturating_add(2), b"?>") {
        return end.saturating_add(2);
    }

    skip_to_gt(bytes, start.saturating_add(2))
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx.saturating_add(1);
        }
        idx = idx.saturating_add(1);
    }

    bytes.len()
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_attr_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::HtmlParser;
    use super::decode_entities;
    use super::escape_text;
    use super::inner_html;
    use super::serialize;
    use lt_core::TableResult;

    #[test]
    fn builds_table_tree_without_implicit_tbody() -> TableResult<()> {
        let doc = HtmlParser.parse(
            "<table id=live><tr><th>Name<th>Time<tr><td>a</td><td>b</td></tr></table>",
        );
        let Some(table) = doc.get_element_by_id("live") else {
            panic!("table should be parsed");
        };
        let rows = doc.element_children(table);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| doc.is_element_named(*row, "tr")));
        assert_eq!(doc.children_named(rows[0], "th").len(), 2);
        assert_eq!(doc.text_content(rows[0]), "NameTime");
        assert!(doc.query_selector(doc.root(), "tbody")?.is_none());
        Ok(())
    }

    #[test]
    fn parses_attributes_styles_and_void_elements() -> TableResult<()> {
        let doc = HtmlParser.parse(
            r#"<div class='a b' data-x="1 &amp; 2" hidden style="width: 10px;color:red"><br/><img src=x.png>tail</div>"#,
        );
        let Some(div) = doc.query_selector(doc.root(), "div.a.b")? else {
            panic!("div should be parsed");
        };
        assert_eq!(doc.attr(div, "data-x"), Some("1 & 2"));
        assert_eq!(doc.attr(div, "hidden"), Some(""));
        assert_eq!(doc.style_value(div, "color"), Some("red"));
        assert_eq!(doc.element_children(div).len(), 2);
        assert_eq!(doc.text_content(div), "tail");
        Ok(())
    }

    #[test]
    fn keeps_script_and_style_raw_text() {
        let doc = HtmlParser.parse("<style>td > b { color: red }</style><script>if (a < b) {}</script>");
        assert_eq!(
            serialize(&doc, doc.root()),
            "<style>td > b { color: red }</style><script>if (a < b) {}</script>"
        );
    }

    #[test]
    fn fragment_parsing_appends_under_parent() -> TableResult<()> {
        let mut doc = HtmlParser.parse("<table><tr><td></td></tr></table>");
        let Some(td) = doc.query_selector(doc.root(), "td")? else {
            panic!("td should be parsed");
        };
        HtmlParser.parse_fragment_into(&mut doc, td, "<b>bold</b> &lt;tag&gt;")?;
        assert_eq!(inner_html(&doc, td), "<b>bold</b> &lt;tag&gt;");

        let root = doc.root();
        assert!(HtmlParser.parse_fragment_into(&mut doc, root, "x").is_err());
        Ok(())
    }

    #[test]
    fn serializes_styles_and_escapes_attributes() -> TableResult<()> {
        let mut doc = HtmlParser.parse("<p title='say \"hi\"'>x</p><!-- note -->");
        let Some(p) = doc.query_selector(doc.root(), "p")? else {
            panic!("p should be parsed");
        };
        doc.set_style(p, "width", "20px")?;
        assert_eq!(
            serialize(&doc, doc.root()),
            "<p title=\"say &quot;hi&quot;\" style=\"width: 20px;\">x</p><!-- note -->"
        );
        Ok(())
    }

    #[test]
    fn ignores_stray_end_tags_and_lone_angle_brackets() {
        let doc = HtmlParser.parse("</td>1 < 2<p>a</span>b</p>");
        assert_eq!(serialize(&doc, doc.root()), "1 &lt; 2<p>ab</p>");
    }

    #[test]
    fn decodes_numeric_and_named_references() {
        assert_eq!(decode_entities("&#65;&#x42;&lt;&bogus;&"), "AB<&bogus;&");
        assert_eq!(escape_text("<a & b>"), "&lt;a &amp; b&gt;");
    }
}
