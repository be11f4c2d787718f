mod cli;
mod config;
mod decode;

use clap::Parser;
use cli::CliArgs;
use config::FileConfig;
use config::RunSettings;
use lt_core::TableError;
use lt_dom::Document;
use lt_html::HtmlParser;
use lt_table::LiveTable;
use lt_table::highlight_stylesheet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no {0} given; pass it as a flag or in the config file")]
    MissingSetting(&'static str),
}

fn setup_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), CliError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = RunSettings::resolve(args, file)?;

    let bytes = fs::read(&args.input).map_err(|source| CliError::Io {
        path: args.input.clone(),
        source,
    })?;
    let source = decode::decode_html(&bytes);
    let output = transform(&source, &settings, &args.row_cells(), args.highlight_style)?;

    match &args.output {
        Some(path) => fs::write(path, output).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?,
        None => print!("{output}"),
    }
    Ok(())
}

/// Adapts the configured table in `source`, prepends `rows` and returns the
/// serialized document.
fn transform(
    source: &str,
    settings: &RunSettings,
    rows: &[Vec<String>],
    highlight: bool,
) -> Result<String, CliError> {
    let mut doc = HtmlParser.parse(source);
    let live = LiveTable::initialize(
        &mut doc,
        settings.selector.as_str(),
        &settings.height,
        settings.widths.clone(),
        settings.options.clone(),
    )?;

    for cells in rows {
        live.append_row(&mut doc, cells)?;
    }
    if highlight {
        inject_stylesheet(&mut doc, &highlight_stylesheet(&live.options().marker_class))?;
    }

    let mut out = String::with_capacity(source.len() + 256);
    if let Some(doctype) = leading_doctype(source) {
        out.push_str(doctype);
        out.push('\n');
    }
    out.push_str(&lt_html::serialize(&doc, doc.root()));
    Ok(out)
}

/// Appends a `<style>` to `<head>`, or to the top of the document when there
/// is no head.
fn inject_stylesheet(doc: &mut Document, css: &str) -> Result<(), TableError> {
    let style = doc.create_element("style");
    doc.set_text_content(style, css)?;
    match doc.query_selector(doc.root(), "head")? {
        Some(head) => doc.append_child(head, style),
        None => {
            let first = doc.children(doc.root()).first().copied();
            doc.insert_before(doc.root(), style, first)
        }
    }
}

fn leading_doctype(source: &str) -> Option<&str> {
    let trimmed = source.trim_start_matches('\u{feff}').trim_start();
    let head = trimmed.get(..9)?;
    if !head.eq_ignore_ascii_case("<!doctype") {
        return None;
    }
    trimmed.find('>').map(|end| &trimmed[..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::tempdir;

    const PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Scores</title></head><body>\
        <table id=\"scores\"><tr><th>Name</th><th>Time</th></tr>\
        <tr><td>Alice</td><td>10:00</td></tr></table></body></html>";

    fn settings(args: &[&str]) -> (CliArgs, RunSettings) {
        let args = CliArgs::parse_from(args);
        match RunSettings::resolve(&args, FileConfig::default()) {
            Ok(settings) => (args, settings),
            Err(error) => panic!("settings should resolve: {error}"),
        }
    }

    #[test]
    fn transforms_page_and_prepends_rows() {
        let (args, settings) = settings(&[
            "livetable",
            "page.html",
            "--table",
            "scores",
            "--height",
            "100",
            "-w",
            "100px",
            "-w",
            "150px",
            "--row",
            "Bob|10:05",
            "--row",
            "<i>Carol</i>|10:07",
            "--highlight-style",
        ]);

        let output = match transform(PAGE, &settings, &args.row_cells(), args.highlight_style) {
            Ok(output) => output,
            Err(error) => panic!("transform failed: {error}"),
        };

        assert!(output.starts_with("<!DOCTYPE html>\n"));
        assert!(output.contains("<html><head><title>Scores</title><style>"));
        assert!(output.contains("<style>.newly-added-row {"));
        assert!(output.contains("height: 100px;"));
        let carol = output.find("&lt;i&gt;Carol&lt;/i&gt;");
        let bob = output.find(">Bob<");
        let alice = output.find(">Alice<");
        assert!(carol < bob && bob < alice, "rows out of order in {output}");
        assert!(carol.is_some());
    }

    #[test]
    fn missing_table_is_an_error() {
        let (args, settings) = settings(&["livetable", "page.html", "--height", "10px", "-w", "1px"]);
        let result = transform("<p>nothing</p>", &settings, &args.row_cells(), false);
        assert!(matches!(result, Err(CliError::Table(TableError::NotFound(_)))));
    }

    #[test]
    fn stylesheet_goes_to_document_top_without_head() -> Result<(), TableError> {
        let mut doc = HtmlParser.parse("<table></table>");
        inject_stylesheet(&mut doc, "td {}")?;
        assert_eq!(lt_html::serialize(&doc, doc.root()), "<style>td {}</style><table></table>");
        Ok(())
    }

    #[test]
    fn doctype_is_detected_case_insensitively() {
        assert_eq!(leading_doctype("  <!doctype html><p>"), Some("<!doctype html>"));
        assert_eq!(leading_doctype("<html>"), None);
        assert_eq!(leading_doctype(""), None);
    }

    #[test]
    fn run_reads_config_and_writes_output_file() {
        let dir = match tempdir() {
            Ok(dir) => dir,
            Err(error) => panic!("tempdir: {error}"),
        };
        let input = dir.path().join("page.html");
        let config = dir.path().join("livetable.toml");
        let output = dir.path().join("out.html");
        let setup = fs::write(&input, PAGE).and_then(|()| {
            fs::write(
                &config,
                "[table]\nselector = \"#scores\"\nheight = \"100px\"\nwidths = [\"100px\"]\n",
            )
        });
        if let Err(error) = setup {
            panic!("writing fixtures: {error}");
        }

        let args = CliArgs::parse_from([
            OsStr::new("livetable"),
            input.as_os_str(),
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("--output"),
            output.as_os_str(),
            OsStr::new("--row"),
            OsStr::new("Bob|10:05"),
        ]);
        if let Err(error) = run(&args) {
            panic!("run failed: {error}");
        }

        let written = match fs::read_to_string(&output) {
            Ok(written) => written,
            Err(error) => panic!("reading output: {error}"),
        };
        assert!(written.contains("class=\"newly-added-row\""));
        assert!(written.contains("<thead>") || written.contains("<thead "));
    }

    #[test]
    fn missing_input_reports_path() {
        let args = CliArgs::parse_from([
            "livetable",
            "/nonexistent/livetable/page.html",
            "--height",
            "10px",
            "-w",
            "1px",
        ]);
        let Err(error) = run(&args) else {
            panic!("missing input should fail");
        };
        assert!(error.to_string().contains("page.html"));
    }
}
