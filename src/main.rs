//! regionpdf – capture a region of an HTML page as a paginated PDF.
//!
//! Usage:
//!   regionpdf <input.html> [selector] [flags]
//!   regionpdf --demo notice|admission|long [selector] [flags]
//!
//! The selector defaults to `body`. With `--role` the role's content panel
//! and preset are used instead.

use std::{env, fs, path::PathBuf, process, sync::Arc};

use region_pdf::config::{ConfigOverrides, Orientation, PageSize};
use region_pdf::converter::Converter;
use region_pdf::dom::Page;
use region_pdf::presets::Role;
use region_pdf::status::{ConsoleSink, StatusBoard};
use region_pdf::templates::Demo;

#[derive(Default)]
struct Cli {
    input: Option<PathBuf>,
    selector: Option<String>,
    demo: Option<Demo>,
    role: Option<Role>,
    output: Option<PathBuf>,
    options_file: Option<PathBuf>,
    check: bool,
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("regionpdf");
    let cli = match parse_args(&args[1.min(args.len())..]) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            print_usage(prog);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage(prog);
            process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let page = match (&cli.demo, &cli.input) {
        (Some(demo), _) => Page::parse(&demo.html()),
        (None, Some(path)) => Page::from_file(path)?,
        (None, None) => return Err("no input file specified".to_string()),
    };

    let converter = Converter::with_defaults(page, StatusBoard::new(Arc::new(ConsoleSink)));

    if cli.check {
        let ok = converter.check_compatibility();
        println!("2D drawing: {}", if ok { "supported" } else { "unsupported" });
        return if ok { Ok(()) } else { Err("compatibility check failed".to_string()) };
    }

    if !converter.initialize() {
        return Err("converter could not be initialized".to_string());
    }

    let file_overrides = match &cli.options_file {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("cannot read '{}': {e}", path.display()))?;
            ConfigOverrides::from_json(&json)
                .map_err(|e| format!("invalid options in '{}': {e}", path.display()))?
        }
        None => ConfigOverrides::default(),
    };
    // Command-line flags win over the options file.
    let mut overrides = cli.overrides.or(file_overrides);

    // `-o dir/name.pdf` splits into out_dir + filename.
    if let Some(output) = &cli.output {
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            overrides.out_dir = Some(dir.to_path_buf());
        }
        overrides.filename = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
    }

    let report = match cli.role {
        Some(role) => {
            let filename = overrides.filename.clone();
            converter
                .convert_role_with(role, filename.as_deref(), &overrides)
                .await
        }
        None => {
            let selector = cli.selector.as_deref().unwrap_or("body");
            converter.convert(selector, &overrides).await
        }
    }
    .map_err(|e| e.to_string())?;

    let pages = report.page_count;
    eprintln!(
        "Wrote '{}' ({} page{})",
        report.path.display(),
        pages,
        if pages == 1 { "" } else { "s" }
    );
    Ok(())
}

/// `Ok(None)` means `--help` was requested.
fn parse_args(args: &[String]) -> Result<Option<Cli>, String> {
    let mut cli = Cli::default();
    let mut positional = 0usize;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg {
            "--help" | "-h" => return Ok(None),
            "--check" => cli.check = true,
            "--landscape" | "-l" => cli.overrides.orientation = Some(Orientation::Landscape),
            "--slice" => cli.overrides.slice_pages = Some(true),
            "--title" | "-t" => cli.overrides.title = Some(value(arg)?),
            "--output" | "-o" => cli.output = Some(PathBuf::from(value(arg)?)),
            "--out-dir" => cli.overrides.out_dir = Some(PathBuf::from(value(arg)?)),
            "--options" => cli.options_file = Some(PathBuf::from(value(arg)?)),
            "--role" => cli.role = Some(value(arg)?.parse()?),
            "--demo" => cli.demo = Some(value(arg)?.parse()?),
            "--page-size" => cli.overrides.page_size = Some(value(arg)?.parse::<PageSize>()?),
            "--margin" => cli.overrides.margin = Some(parse_number(arg, &value(arg)?)?),
            "--quality" => cli.overrides.quality = Some(parse_number(arg, &value(arg)?)?),
            "--scale" => cli.overrides.scale = Some(parse_number(arg, &value(arg)?)?),
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            path => {
                // With --demo the only positional is the selector.
                let slot = if cli.demo.is_some() { positional + 1 } else { positional };
                match slot {
                    0 => cli.input = Some(PathBuf::from(path)),
                    1 => cli.selector = Some(path.to_string()),
                    _ => return Err(format!("unexpected argument: {path}")),
                }
                positional += 1;
            }
        }
    }
    Ok(Some(cli))
}

fn parse_number(flag: &str, v: &str) -> Result<f32, String> {
    v.parse()
        .map_err(|_| format!("{flag} expects a number, got '{v}'"))
}

fn print_usage(prog: &str) {
    eprintln!("regionpdf – export a region of an HTML page as a PDF");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <input.html> [selector] [flags]");
    eprintln!("  {prog} --demo notice|admission|long [selector] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <input.html>       HTML page; relative image paths resolve next to it");
    eprintln!("  [selector]         Region to capture: tag, #id, .class or descendants (default: body)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --role <role>      Capture the content panel of a notice or admission page");
    eprintln!("  --output, -o       Output file (default: document.pdf, or the role's filename)");
    eprintln!("  --out-dir <dir>    Directory the PDF is written into (default: .)");
    eprintln!("  --options <json>   JSON file with configuration overrides");
    eprintln!("  --title, -t        Document title in PDF metadata");
    eprintln!("  --landscape, -l    Landscape page orientation");
    eprintln!("  --page-size <s>    a3, a4, a5, letter or legal (default: a4)");
    eprintln!("  --margin <pt>      Page margin in points (default: 10)");
    eprintln!("  --quality <q>      JPEG quality in (0, 1] (default: 1.0)");
    eprintln!("  --scale <n>        Raster pixels per CSS pixel, at least 1 (default: 2)");
    eprintln!("  --slice            Show consecutive bands of the region on each page");
    eprintln!("  --demo <page>      Use a bundled page instead of an input file");
    eprintln!("  --check            Report whether 2D drawing works and exit");
    eprintln!("  --help             Print this message");
}
