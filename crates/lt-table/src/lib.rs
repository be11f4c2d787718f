//! Live scrolling tables: a fixed header over an independently scrolling body.
//!
//! [`LiveTable::initialize`] rearranges an existing `<table>` so that it has
//! exactly one `<thead>` and one `<tbody>`, pins every cell to a configured
//! column width, and styles both sections as blocks so the body scrolls on its
//! own. The returned handle prepends rows with [`LiveTable::append_row`].

mod options;

pub use options::BodyPlacement;
pub use options::ColumnWidths;
pub use options::ContentPolicy;
pub use options::LiveTableOptions;

use core::fmt;
use lt_core::TableError;
use lt_core::TableResult;
use lt_css::is_single_value;
use lt_css::normalize_length_spec;
use lt_dom::Document;
use lt_dom::NodeId;
use lt_html::HtmlParser;
use lt_layout::LayoutEngine;

/// Class carried by rows created through [`LiveTable::append_row`].
pub const NEWLY_ADDED_ROW_CLASS: &str = "newly-added-row";

/// Table to adapt: a node handle, or a selector resolved to its first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    Node(NodeId),
    Selector(String),
}

impl From<NodeId> for TableRef {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<&str> for TableRef {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_owned())
    }
}

impl From<String> for TableRef {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "node #{}", id.index()),
            Self::Selector(selector) => write!(f, "`{selector}`"),
        }
    }
}

/// Adapts `table` with default [`LiveTableOptions`].
pub fn initialize<I, S>(
    doc: &mut Document,
    table: impl Into<TableRef>,
    height: &str,
    widths: I,
) -> TableResult<LiveTable>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    LiveTable::initialize(
        doc,
        table,
        height,
        ColumnWidths::new(widths)?,
        LiveTableOptions::default(),
    )
}

/// Handle to an adapted table. It owns the column widths and options used by
/// every later [`LiveTable::append_row`] call; the DOM itself stays with the
/// caller's [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTable {
    table: NodeId,
    widths: ColumnWidths,
    options: LiveTableOptions,
}

impl LiveTable {
    /// Validates everything up front, so an error leaves `doc` untouched.
    pub fn initialize(
        doc: &mut Document,
        table: impl Into<TableRef>,
        height: &str,
        widths: ColumnWidths,
        options: LiveTableOptions,
    ) -> TableResult<Self> {
        let table_ref = table.into();
        let table = resolve_table(doc, &table_ref)?;

        let height = normalize_length_spec(height);
        if height.is_empty() {
            return Err(TableError::configuration("table height must not be blank"));
        }
        if !is_single_value(&height) {
            return Err(TableError::configuration(format!(
                "table height `{height}` is not a single CSS value"
            )));
        }
        options.validate()?;

        // hidden while sections move around
        doc.set_style(table, "display", "none")?;

        let thead = ensure_header(doc, table)?;
        style_section_rows(doc, thead, &widths)?;
        log::debug!("header section ready for {table_ref}");

        let tbody = ensure_body(doc, table, thead, options.body_placement)?;
        style_section_rows(doc, tbody, &widths)?;
        log::debug!("body section ready for {table_ref}");

        let live = Self {
            table,
            widths,
            options,
        };

        live.apply_layout_styles(doc, thead, tbody, &height)?;
        doc.set_style(table, "display", live.options.restore_display.trim())?;

        // must run last: measures the layout produced by everything above
        let body_height = live.fit_body_height(doc, tbody)?;

        log::info!(
            "live table {table_ref} initialized: height={height}, columns={}, body_height={body_height}px",
            live.widths.len()
        );
        Ok(live)
    }

    pub fn table(&self) -> NodeId {
        self.table
    }

    pub fn widths(&self) -> &ColumnWidths {
        &self.widths
    }

    pub fn options(&self) -> &LiveTableOptions {
        &self.options
    }

    pub fn header(&self, doc: &Document) -> Option<NodeId> {
        doc.children_named(self.table, "thead").first().copied()
    }

    pub fn body(&self, doc: &Document) -> Option<NodeId> {
        doc.children_named(self.table, "tbody").first().copied()
    }

    /// Builds a row from `cells`, tags it with the marker class and inserts
    /// it ahead of every existing body row. Returns the new row.
    pub fn append_row<I, S>(&self, doc: &mut Document, cells: I) -> TableResult<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tbody = self.body(doc).ok_or_else(|| {
            TableError::not_found("table body section is missing; it was removed after setup")
        })?;
        let first_row = doc.children_named(tbody, "tr").first().copied();

        let row = doc.create_element("tr");
        doc.add_class(row, &self.options.marker_class)?;
        let mut cell_count = 0_usize;
        for (index, content) in cells.into_iter().enumerate() {
            let cell = doc.create_element("td");
            set_cell_width(doc, cell, self.widths.for_column(index))?;
            self.write_cell(doc, cell, content.as_ref())?;
            doc.append_child(row, cell)?;
            cell_count = index + 1;
        }

        doc.insert_before(tbody, row, first_row)?;
        log::debug!("prepended row with {cell_count} cells");
        Ok(row)
    }

    fn write_cell(&self, doc: &mut Document, cell: NodeId, content: &str) -> TableResult<()> {
        match self.options.content_policy {
            ContentPolicy::Text => doc.set_text_content(cell, content),
            ContentPolicy::Markup => HtmlParser.parse_fragment_into(doc, cell, content),
        }
    }

    fn apply_layout_styles(
        &self,
        doc: &mut Document,
        thead: NodeId,
        tbody: NodeId,
        height: &str,
    ) -> TableResult<()> {
        doc.set_style(thead, "display", "block")?;
        doc.set_style(thead, "overflow-x", "hidden")?;

        doc.set_style(tbody, "display", "block")?;
        doc.set_style(tbody, "overflow-x", "hidden")?;
        doc.set_style(tbody, "overflow-y", "scroll")?;

        doc.set_style(self.table, "table-layout", "fixed")?;
        doc.set_style(self.table, "overflow-x", "hidden")?;
        doc.set_style(self.table, "overflow-y", "hidden")?;
        doc.set_style(self.table, "height", height)
    }

    /// Sets the body height to whatever the table leaves below the body's top
    /// edge, and returns it in pixels.
    fn fit_body_height(&self, doc: &mut Document, tbody: NodeId) -> TableResult<i64> {
        if !doc.is_connected(self.table) {
            log::debug!("table is detached from the document; measuring its own tree");
        }
        let engine = LayoutEngine::new(self.options.layout);
        let layout = engine.compute_subtree(doc, doc.top_ancestor(self.table));
        let available = layout.offset_height(self.table) - layout.offset_top(doc, tbody);
        let body_height = available.max(0.0).round() as i64;
        doc.set_style(tbody, "height", &format!("{body_height}px"))?;
        Ok(body_height)
    }
}

fn resolve_table(doc: &Document, table_ref: &TableRef) -> TableResult<NodeId> {
    let candidate = match table_ref {
        TableRef::Node(id) => Some(*id),
        TableRef::Selector(selector) => match doc.query_selector(doc.root(), selector) {
            Ok(Some(found)) => Some(found),
            // plain ids are accepted as well as selectors
            Ok(None) => doc.get_element_by_id(selector.trim()),
            Err(error) => {
                log::debug!("{error}; retrying {table_ref} as an element id");
                doc.get_element_by_id(selector.trim())
            }
        },
    };

    candidate
        .filter(|id| doc.is_element_named(*id, "table"))
        .ok_or_else(|| TableError::not_found(format!("cannot find an HTML table from {table_ref}")))
}

/// Returns the table's `<thead>`, creating one from the table's first row
/// when it has none.
fn ensure_header(doc: &mut Document, table: NodeId) -> TableResult<NodeId> {
    if let Some(thead) = doc.children_named(table, "thead").first().copied() {
        return Ok(thead);
    }

    let first_row = own_rows(doc, table).first().copied();
    let thead = doc.create_element("thead");
    let first_child = doc.children(table).first().copied();
    doc.insert_before(table, thead, first_child)?;

    match first_row {
        Some(row) => doc.append_child(thead, row)?,
        None => log::warn!("table has no rows; created an empty header section"),
    }
    Ok(thead)
}

/// Returns the table's `<tbody>`, creating one when it has none. Rows left
/// directly under the table move into the new body, as a parser's implied
/// `<tbody>` would have held them.
fn ensure_body(
    doc: &mut Document,
    table: NodeId,
    thead: NodeId,
    placement: BodyPlacement,
) -> TableResult<NodeId> {
    if let Some(tbody) = doc.children_named(table, "tbody").first().copied() {
        return Ok(tbody);
    }

    let loose_rows = doc.children_named(table, "tr");
    let tbody = doc.create_element("tbody");
    let reference = match placement {
        BodyPlacement::BeforeHeader => Some(thead),
        BodyPlacement::AfterHeader => doc.next_sibling(thead),
    };
    doc.insert_before(table, tbody, reference)?;

    for row in loose_rows {
        doc.append_child(tbody, row)?;
    }
    Ok(tbody)
}

/// Rows belonging to `table` itself, skipping rows of nested tables.
fn own_rows(doc: &Document, table: NodeId) -> Vec<NodeId> {
    doc.descendants(table)
        .into_iter()
        .filter(|node| doc.is_element_named(*node, "tr"))
        .filter(|row| nearest_table(doc, *row) == Some(table))
        .collect()
}

fn nearest_table(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut cursor = doc.parent_element(node);
    while let Some(ancestor) = cursor {
        if doc.is_element_named(ancestor, "table") {
            return Some(ancestor);
        }
        cursor = doc.parent_element(ancestor);
    }
    None
}

fn style_section_rows(doc: &mut Document, section: NodeId, widths: &ColumnWidths) -> TableResult<()> {
    for row in doc.children_named(section, "tr") {
        let cells: Vec<NodeId> = doc
            .element_children(row)
            .into_iter()
            .filter(|cell| doc.is_element_named(*cell, "td") || doc.is_element_named(*cell, "th"))
            .collect();
        for (index, cell) in cells.into_iter().enumerate() {
            set_cell_width(doc, cell, widths.for_column(index))?;
        }
    }
    Ok(())
}

fn set_cell_width(doc: &mut Document, cell: NodeId, width: &str) -> TableResult<()> {
    doc.set_style(cell, "min-width", width)?;
    doc.set_style(cell, "width", width)
}

/// [`highlight_stylesheet`] for the default marker class.
pub const HIGHLIGHT_STYLESHEET: &str = ".newly-added-row {
  animation: fadein 1.5s;
}
@keyframes fadein {
  from { background-color: black; color: white; }
  to { background-color: transparent; color: inherit; }
}
";

/// Fade-in highlight for freshly appended rows, keyed on `marker_class`.
pub fn highlight_stylesheet(marker_class: &str) -> String {
    format!(
        ".{marker_class} {{\n  animation: fadein 1.5s;\n}}\n\
         @keyframes fadein {{\n  \
         from {{ background-color: black; color: white; }}\n  \
         to {{ background-color: transparent; color: inherit; }}\n}}\n"
    )
}
