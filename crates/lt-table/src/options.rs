use crate::NEWLY_ADDED_ROW_CLASS;
use lt_core::TableError;
use lt_core::TableResult;
use lt_css::Length;
use lt_css::is_single_value;
use lt_css::normalize_length_spec;
use lt_layout::LayoutConfig;
use serde::Deserialize;
use serde::Serialize;

/// Where a newly created `<tbody>` goes relative to the header section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPlacement {
    /// Immediately before `<thead>` in tree order. Headers still render on
    /// top because both sections become independent blocks.
    #[default]
    BeforeHeader,
    AfterHeader,
}

/// How cell contents passed to `append_row` are inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    /// Contents become a text node; markup is shown literally.
    #[default]
    Text,
    /// Contents are parsed as HTML. Callers must sanitize untrusted input.
    Markup,
}

/// Tunables for [`crate::LiveTable::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveTableOptions {
    pub body_placement: BodyPlacement,
    pub content_policy: ContentPolicy,
    pub marker_class: String,
    /// `display` value written back once styling is done.
    pub restore_display: String,
    pub layout: LayoutConfig,
}

impl Default for LiveTableOptions {
    fn default() -> Self {
        Self {
            body_placement: BodyPlacement::default(),
            content_policy: ContentPolicy::default(),
            marker_class: NEWLY_ADDED_ROW_CLASS.to_owned(),
            restore_display: "block".to_owned(),
            layout: LayoutConfig::default(),
        }
    }
}

impl LiveTableOptions {
    pub fn validate(&self) -> TableResult<()> {
        let marker = self.marker_class.trim();
        if marker.is_empty() || marker.contains(char::is_whitespace) {
            return Err(TableError::configuration(format!(
                "marker class `{}` must be a single non-empty class name",
                self.marker_class
            )));
        }

        let display = self.restore_display.trim();
        if display.is_empty() || display.eq_ignore_ascii_case("none") || !is_single_value(display)
        {
            return Err(TableError::configuration(
                "restore_display must be a rendering display value",
            ));
        }

        let layout = &self.layout;
        let metrics = [
            ("viewport_width", layout.viewport_width),
            ("line_height", layout.line_height),
            ("cell_padding", layout.cell_padding),
            ("font_size", layout.font_size),
        ];
        for (name, value) in metrics {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TableError::configuration(format!(
                    "layout.{name} must be a finite number >= 0, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Non-empty list of column size specifications, cycled per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnWidths(Vec<String>);

impl ColumnWidths {
    pub fn new<I, S>(widths: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for (idx, raw) in widths.into_iter().enumerate() {
            let width = normalize_length_spec(raw.as_ref());
            if width.is_empty() {
                return Err(TableError::configuration(format!(
                    "column width {idx} is blank"
                )));
            }
            if !is_single_value(&width) {
                return Err(TableError::configuration(format!(
                    "column width {idx} `{width}` is not a single CSS value"
                )));
            }
            if Length::parse(&width).is_none() {
                log::warn!("column width `{width}` is not a plain length; passing it through");
            }
            out.push(width);
        }

        if out.is_empty() {
            return Err(TableError::configuration(
                "column width list must not be empty",
            ));
        }

        Ok(Self(out))
    }

    /// Width for the zero-based column `index`, wrapping around the list.
    pub fn for_column(&self, index: usize) -> &str {
        &self.0[index % self.0.len()]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for ColumnWidths {
    type Error = TableError;

    fn try_from(widths: Vec<String>) -> TableResult<Self> {
        Self::new(widths)
    }
}

impl From<ColumnWidths> for Vec<String> {
    fn from(widths: ColumnWidths) -> Self {
        widths.0
    }
}
