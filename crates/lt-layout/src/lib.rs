//! Layout engine entry points (display resolution + block flow geometry).
//!
//! This is a measuring engine, not a renderer: it answers `offsetTop`,
//! `offsetHeight` and `offsetWidth` for element boxes after inline styles have
//! been written.

use lt_css::Length;
use lt_dom::Document;
use lt_dom::NodeId;
use lt_dom::NodeKind;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "br", "button", "code", "em", "i", "img", "input", "label", "small", "span",
    "strong", "sub", "sup", "time", "u",
];
const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "link", "meta", "script", "style", "template", "title",
];

/// Metrics used when content does not specify its own size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub viewport_width: f32,
    pub line_height: f32,
    /// Vertical padding applied on each side of a table cell.
    pub cell_padding: f32,
    pub font_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            line_height: 18.0,
            cell_padding: 1.0,
            font_size: 16.0,
        }
    }
}

/// Resolved `display` of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    None,
    Block,
    Inline,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
}

impl Display {
    pub fn of(doc: &Document, id: NodeId) -> Self {
        let Some(element) = doc.element(id) else {
            return Self::Inline;
        };

        if element.attr("hidden").is_some() {
            return Self::None;
        }

        if let Some(value) = element.style().get("display") {
            match value.to_ascii_lowercase().as_str() {
                "none" => return Self::None,
                "inline" | "inline-block" | "inline-flex" => return Self::Inline,
                "table" | "inline-table" => return Self::Table,
                "table-row-group" | "table-header-group" | "table-footer-group" => {
                    return Self::TableRowGroup;
                }
                "table-row" => return Self::TableRow,
                "table-cell" => return Self::TableCell,
                // block, flex, grid, list-item and anything unknown flow as blocks
                _ => return Self::Block,
            }
        }

        let tag = element.tag_name();
        match tag {
            "table" => Self::Table,
            "thead" | "tbody" | "tfoot" => Self::TableRowGroup,
            "tr" => Self::TableRow,
            "td" | "th" => Self::TableCell,
            _ if HIDDEN_ELEMENTS.contains(&tag) => Self::None,
            _ if INLINE_ELEMENTS.contains(&tag) => Self::Inline,
            _ => Self::Block,
        }
    }
}

/// Border-box geometry in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Geometry for every rendered element. Elements under `display: none`
/// have no entry and measure as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutTree {
    boxes: HashMap<NodeId, BoxGeometry>,
}

impl LayoutTree {
    pub fn geometry(&self, id: NodeId) -> Option<BoxGeometry> {
        self.boxes.get(&id).copied()
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn offset_height(&self, id: NodeId) -> f32 {
        self.geometry(id).map_or(0.0, |geometry| geometry.height)
    }

    pub fn offset_width(&self, id: NodeId) -> f32 {
        self.geometry(id).map_or(0.0, |geometry| geometry.width)
    }

    /// Nearest rendered ancestor that is a table, a cell, or positioned.
    pub fn offset_parent(&self, doc: &Document, id: NodeId) -> Option<NodeId> {
        self.geometry(id)?;
        let mut cursor = doc.parent_element(id);
        while let Some(ancestor) = cursor {
            let is_positioned = doc
                .style_value(ancestor, "position")
                .is_some_and(|position| !position.eq_ignore_ascii_case("static"));
            let is_table_like = matches!(doc.tag_name(ancestor), Some("table" | "td" | "th"));
            if (is_positioned || is_table_like) && self.geometry(ancestor).is_some() {
                return Some(ancestor);
            }
            cursor = doc.parent_element(ancestor);
        }
        None
    }

    /// Distance from the top of the offset parent (or the document).
    pub fn offset_top(&self, doc: &Document, id: NodeId) -> f32 {
        let Some(geometry) = self.geometry(id) else {
            return 0.0;
        };
        let parent_top = self
            .offset_parent(doc, id)
            .and_then(|parent| self.geometry(parent))
            .map_or(0.0, |parent| parent.y);
        geometry.y - parent_top
    }
}

/// Computes box geometry from the DOM and its inline styles.
#[derive(Debug, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn compute(&self, doc: &Document) -> LayoutTree {
        self.compute_subtree(doc, doc.root())
    }

    /// Lays out the tree rooted at `root` as if it were placed at the origin.
    /// Detached subtrees can be measured this way.
    pub fn compute_subtree(&self, doc: &Document, root: NodeId) -> LayoutTree {
        let mut tree = LayoutTree::default();
        let width = self.config.viewport_width;
        match doc.kind(root) {
            Some(NodeKind::Element(_)) => {
                if Display::of(doc, root) != Display::None {
                    self.layout_box(doc, root, 0.0, 0.0, width, None, &mut tree);
                }
            }
            Some(_) => {
                self.layout_children(doc, root, 0.0, 0.0, width, None, &mut tree);
            }
            None => {}
        }
        log::debug!("layout produced {} boxes", tree.box_count());
        tree
    }

    /// Stacks the children of `parent` vertically and returns their total
    /// height. Adjacent inline content shares one line box.
    #[allow(clippy::too_many_arguments)]
    fn layout_children(
        &self,
        doc: &Document,
        parent: NodeId,
        x: f32,
        y: f32,
        width: f32,
        parent_height: Option<f32>,
        tree: &mut LayoutTree,
    ) -> f32 {
        let line_height = self.config.line_height;
        let mut cursor = y;
        let mut line_top: Option<f32> = None;

        for child in doc.children(parent) {
            match doc.kind(*child) {
                Some(NodeKind::Text(text)) if !text.trim().is_empty() => {
                    if line_top.is_none() {
                        line_top = Some(cursor);
                        cursor += line_height;
                    }
                }
                Some(NodeKind::Element(_)) => match Display::of(doc, *child) {
                    Display::None => {}
                    Display::Inline => {
                        let top = *line_top.get_or_insert_with(|| {
                            let top = cursor;
                            cursor += line_height;
                            top
                        });
                        let inline_width = self.resolve_width(doc, *child, width);
                        tree.boxes.insert(
                            *child,
                            BoxGeometry {
                                x,
                                y: top,
                                width: inline_width,
                                height: line_height,
                            },
                        );
                        // descendants of inline boxes share the line
                        self.layout_children(doc, *child, x, top, inline_width, None, tree);
                    }
                    _ => {
                        line_top = None;
                        cursor += self.layout_box(doc, *child, x, cursor, width, parent_height, tree);
                    }
                },
                _ => {}
            }
        }

        cursor - y
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_box(
        &self,
        doc: &Document,
        id: NodeId,
        x: f32,
        y: f32,
        available_width: f32,
        parent_height: Option<f32>,
        tree: &mut LayoutTree,
    ) -> f32 {
        let width = self.resolve_width(doc, id, available_width);
        let explicit_height = doc
            .style_value(id, "height")
            .and_then(Length::parse)
            .and_then(|length| length.to_px(parent_height, self.config.font_size))
            .map(|height| height.max(0.0));

        let content_height = if Display::of(doc, id) == Display::TableRow {
            self.layout_row(doc, id, x, y, width, tree)
        } else {
            self.layout_children(doc, id, x, y, width, explicit_height, tree)
        };

        let height = explicit_height.unwrap_or(content_height);
        tree.boxes.insert(
            id,
            BoxGeometry {
                x,
                y,
                width,
                height,
            },
        );
        height
    }

    /// Lays cells out side by side. Cells without an explicit width share the
    /// space the sized cells leave over.
    fn layout_row(
        &self,
        doc: &Document,
        row: NodeId,
        x: f32,
        y: f32,
        width: f32,
        tree: &mut LayoutTree,
    ) -> f32 {
        let cells: Vec<NodeId> = doc
            .element_children(row)
            .into_iter()
            .filter(|cell| Display::of(doc, *cell) != Display::None)
            .collect();

        let sized: Vec<Option<f32>> = cells
            .iter()
            .map(|cell| self.explicit_width(doc, *cell, width))
            .collect();
        let fixed_total: f32 = sized.iter().flatten().sum();
        let auto_count = sized.iter().filter(|size| size.is_none()).count();
        let auto_width = if auto_count > 0 {
            ((width - fixed_total).max(0.0)) / auto_count as f32
        } else {
            0.0
        };

        let padding = self.config.cell_padding;
        let mut cursor_x = x;
        let mut row_height = 0.0_f32;
        for (cell, size) in cells.iter().zip(&sized) {
            let cell_width = size.unwrap_or(auto_width);
            let content = self.layout_children(
                doc,
                *cell,
                cursor_x,
                y + padding,
                cell_width,
                None,
                tree,
            );
            let cell_height = doc
                .style_value(*cell, "height")
                .and_then(Length::parse)
                .and_then(|length| length.to_px(None, self.config.font_size))
                .unwrap_or(0.0)
                .max(content + padding * 2.0);
            tree.boxes.insert(
                *cell,
                BoxGeometry {
                    x: cursor_x,
                    y,
                    width: cell_width,
                    height: cell_height,
                },
            );
            row_height = row_height.max(cell_height);
            cursor_x += cell_width;
        }

        // cells stretch to the row height
        for cell in &cells {
            if let Some(geometry) = tree.boxes.get_mut(cell) {
                geometry.height = row_height;
            }
        }

        row_height
    }

    fn explicit_width(&self, doc: &Document, id: NodeId, available_width: f32) -> Option<f32> {
        doc.style_value(id, "width")
            .and_then(Length::parse)
            .and_then(|length| length.to_px(Some(available_width), self.config.font_size))
            .map(|width| width.max(0.0))
    }

    fn resolve_width(&self, doc: &Document, id: NodeId, available_width: f32) -> f32 {
        self.explicit_width(doc, id, available_width)
            .unwrap_or(available_width)
    }
}

#[cfg(test)]
mod tests {
    use super::Display;
    use super::LayoutConfig;
    use super::LayoutEngine;
    use lt_dom::Document;
    use lt_dom::NodeId;
    use lt_html::HtmlParser;

    fn find(doc: &Document, selector: &str) -> NodeId {
        match doc.query_selector(doc.root(), selector) {
            Ok(Some(node)) => node,
            other => panic!("{selector} did not resolve: {other:?}"),
        }
    }

    #[test]
    fn empty_document_has_no_boxes() {
        let doc = HtmlParser.parse("");
        let tree = LayoutEngine::default().compute(&doc);
        assert_eq!(tree.box_count(), 0);
    }

    #[test]
    fn rows_take_line_height_plus_cell_padding() {
        let doc = HtmlParser.parse(
            "<table><thead><tr><th>Name</th><th>Time</th></tr></thead>\
             <tbody><tr><td>a</td></tr><tr><td>b</td></tr></tbody></table>",
        );
        let tree = LayoutEngine::default().compute(&doc);
        let table = find(&doc, "table");
        let tbody = find(&doc, "tbody");

        assert_eq!(tree.offset_height(find(&doc, "thead")), 20.0);
        assert_eq!(tree.offset_height(tbody), 40.0);
        assert_eq!(tree.offset_height(table), 60.0);
        assert_eq!(tree.offset_top(&doc, tbody), 20.0);
        assert_eq!(tree.offset_parent(&doc, tbody), Some(table));
    }

    #[test]
    fn explicit_heights_and_display_none_are_respected() {
        let doc = HtmlParser.parse(
            "<div style='height: 200px'><table style='height: 50%'>\
             <thead style='display: none'><tr><td>x</td></tr></thead>\
             <tbody><tr><td>y</td></tr></tbody></table></div>",
        );
        let tree = LayoutEngine::default().compute(&doc);
        let table = find(&doc, "table");
        let thead = find(&doc, "thead");
        let tbody = find(&doc, "tbody");

        assert_eq!(tree.offset_height(table), 100.0);
        assert_eq!(tree.offset_height(thead), 0.0);
        assert!(tree.geometry(thead).is_none());
        assert_eq!(tree.offset_top(&doc, tbody), 0.0);
        assert_eq!(Display::of(&doc, thead), Display::None);
    }

    #[test]
    fn detached_subtrees_measure_from_the_origin() {
        let mut doc = HtmlParser.parse("<table style='height: 40px'><tr><td>x</td></tr></table>");
        let table = find(&doc, "table");
        doc.detach(table);

        assert_eq!(LayoutEngine::default().compute(&doc).offset_height(table), 0.0);
        let tree = LayoutEngine::default().compute_subtree(&doc, table);
        assert_eq!(tree.offset_height(table), 40.0);
    }

    #[test]
    fn cells_split_unsized_width_and_stretch_to_row() {
        let doc = HtmlParser.parse(
            "<table style='width: 400px'><tr>\
             <td style='width: 100px'>a</td><td></td><td style='height: 30px'></td></tr></table>",
        );
        let tree = LayoutEngine::new(LayoutConfig::default()).compute(&doc);
        let cells = match doc.query_selector_all(doc.root(), "td") {
            Ok(cells) => cells,
            Err(error) => panic!("query failed: {error}"),
        };
        assert_eq!(tree.offset_width(cells[0]), 100.0);
        assert_eq!(tree.offset_width(cells[1]), 150.0);
        assert!(cells.iter().all(|cell| tree.offset_height(*cell) == 30.0));
    }
}
