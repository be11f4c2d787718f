//! TOML configuration for the `livetable` binary.
//!
//! ```toml
//! [table]
//! selector = "#scores"
//! height = "400px"
//! widths = ["120px", "30%"]
//! body_placement = "after_header"
//! content_policy = "text"
//!
//! [layout]
//! line_height = 20.0
//! ```
//!
//! Every key is optional. Command-line flags win over file values.

use crate::CliError;
use crate::cli::CliArgs;
use lt_layout::LayoutConfig;
use lt_table::BodyPlacement;
use lt_table::ColumnWidths;
use lt_table::ContentPolicy;
use lt_table::LiveTableOptions;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const DEFAULT_SELECTOR: &str = "table";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub table: TableSection,
    pub layout: Option<LayoutConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableSection {
    pub selector: Option<String>,
    pub height: Option<String>,
    pub widths: Option<Vec<String>>,
    pub body_placement: Option<BodyPlacement>,
    pub content_policy: Option<ContentPolicy>,
    pub marker_class: Option<String>,
    pub restore_display: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

/// Everything a run needs, after merging flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub selector: String,
    pub height: String,
    pub widths: ColumnWidths,
    pub options: LiveTableOptions,
}

impl RunSettings {
    pub fn resolve(args: &CliArgs, file: FileConfig) -> Result<Self, CliError> {
        let table = file.table;

        let selector = args
            .table
            .clone()
            .or(table.selector)
            .unwrap_or_else(|| DEFAULT_SELECTOR.to_owned());
        let height = args
            .height
            .clone()
            .or(table.height)
            .ok_or(CliError::MissingSetting("height"))?;
        let widths = if args.widths.is_empty() {
            table.widths.ok_or(CliError::MissingSetting("widths"))?
        } else {
            args.widths.clone()
        };

        let defaults = LiveTableOptions::default();
        let content_policy = if args.raw_markup {
            ContentPolicy::Markup
        } else {
            table.content_policy.unwrap_or(defaults.content_policy)
        };
        let options = LiveTableOptions {
            body_placement: table.body_placement.unwrap_or(defaults.body_placement),
            content_policy,
            marker_class: table.marker_class.unwrap_or(defaults.marker_class),
            restore_display: table.restore_display.unwrap_or(defaults.restore_display),
            layout: file.layout.unwrap_or(defaults.layout),
        };

        Ok(Self {
            selector,
            height,
            widths: ColumnWidths::new(widths)?,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = match NamedTempFile::new() {
            Ok(file) => file,
            Err(error) => panic!("temp file: {error}"),
        };
        if let Err(error) = file.write_all(contents.as_bytes()) {
            panic!("write config: {error}");
        }
        file
    }

    fn load(contents: &str) -> FileConfig {
        let file = write_config(contents);
        match FileConfig::load(file.path()) {
            Ok(config) => config,
            Err(error) => panic!("config should load: {error}"),
        }
    }

    #[test]
    fn file_values_fill_missing_flags() {
        let config = load(
            r##"
            [table]
            selector = "#scores"
            height = "400"
            widths = ["120px", "30%"]
            body_placement = "after_header"

            [layout]
            line_height = 20.0
            "##,
        );
        let args = CliArgs::parse_from(["livetable", "in.html"]);

        let settings = match RunSettings::resolve(&args, config) {
            Ok(settings) => settings,
            Err(error) => panic!("settings should resolve: {error}"),
        };

        assert_eq!(settings.selector, "#scores");
        assert_eq!(settings.height, "400");
        assert_eq!(settings.widths.as_slice(), ["120px", "30%"]);
        assert_eq!(settings.options.body_placement, BodyPlacement::AfterHeader);
        assert_eq!(settings.options.layout.line_height, 20.0);
        assert_eq!(settings.options.layout.cell_padding, 1.0);
    }

    #[test]
    fn flags_override_file_values() {
        let config = load(
            r#"
            [table]
            height = "400px"
            widths = ["120px"]
            content_policy = "text"
            "#,
        );
        let args = CliArgs::parse_from([
            "livetable",
            "in.html",
            "--height",
            "250px",
            "-w",
            "80px",
            "--raw-markup",
        ]);

        let settings = match RunSettings::resolve(&args, config) {
            Ok(settings) => settings,
            Err(error) => panic!("settings should resolve: {error}"),
        };

        assert_eq!(settings.selector, "table");
        assert_eq!(settings.height, "250px");
        assert_eq!(settings.widths.as_slice(), ["80px"]);
        assert_eq!(settings.options.content_policy, ContentPolicy::Markup);
    }

    #[test]
    fn missing_height_and_empty_widths_are_reported() {
        let args = CliArgs::parse_from(["livetable", "in.html", "-w", "10px"]);
        assert!(matches!(
            RunSettings::resolve(&args, FileConfig::default()),
            Err(CliError::MissingSetting("height"))
        ));

        let config = load("[table]\nheight = \"10px\"\nwidths = []\n");
        let args = CliArgs::parse_from(["livetable", "in.html"]);
        assert!(matches!(
            RunSettings::resolve(&args, config),
            Err(CliError::Table(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[table]\nhieght = \"10px\"\n");
        assert!(matches!(
            FileConfig::load(file.path()),
            Err(CliError::Config { .. })
        ));
    }
}
