use clap::Parser;
use std::path::PathBuf;

/// Turns a table inside an HTML file into a live table with a fixed header
/// and a scrolling body.
#[derive(Parser, Debug, PartialEq)]
#[command(version, about)]
pub struct CliArgs {
    /// HTML file to transform.
    pub input: PathBuf,

    /// Selector or element id of the table.
    #[arg(short, long)]
    pub table: Option<String>,

    /// Overall table height, e.g. `400px` or `400`.
    #[arg(long)]
    pub height: Option<String>,

    /// Column width; repeat for each column. The list is cycled.
    #[arg(short, long = "width", value_name = "WIDTH")]
    pub widths: Vec<String>,

    /// TOML file with `[table]` and `[layout]` sections.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Row to prepend; cells are split on the cell separator. Rows are
    /// appended in the order given, so the last one ends up on top.
    #[arg(short, long = "row", value_name = "CELLS")]
    pub rows: Vec<String>,

    #[arg(long, default_value = "|")]
    pub cell_separator: String,

    /// Parse cell contents as HTML instead of inserting them as text.
    #[arg(long)]
    pub raw_markup: bool,

    /// Inject the fade-in stylesheet for appended rows.
    #[arg(long)]
    pub highlight_style: bool,

    /// Write here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Cells of every `--row`, split on the separator.
    pub fn row_cells(&self) -> Vec<Vec<String>> {
        let separator = if self.cell_separator.is_empty() {
            "|"
        } else {
            self.cell_separator.as_str()
        };
        self.rows
            .iter()
            .map(|row| row.split(separator).map(|cell| cell.trim().to_owned()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_widths_and_rows() {
        let args = CliArgs::parse_from([
            "livetable",
            "scores.html",
            "--table",
            "#scores",
            "--height",
            "300px",
            "-w",
            "120px",
            "-w",
            "30%",
            "--row",
            "Bob | 10:05",
            "--highlight-style",
        ]);

        assert_eq!(args.input, PathBuf::from("scores.html"));
        assert_eq!(args.table.as_deref(), Some("#scores"));
        assert_eq!(args.widths, ["120px", "30%"]);
        assert!(args.highlight_style);
        assert!(!args.raw_markup);
        assert_eq!(args.row_cells(), [["Bob", "10:05"]]);
    }

    #[test]
    fn custom_separator_splits_cells() {
        let args = CliArgs::parse_from([
            "livetable",
            "in.html",
            "--cell-separator",
            ";",
            "--row",
            "a;b;c",
        ]);
        assert_eq!(args.row_cells(), [["a", "b", "c"]]);
    }
}
