// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#![allow(clippy::uninlined_format_args)]

use std::path;

fn main() {
    if let Err(e) = process() {
        eprintln!("Error: {}.", e);
        std::process::exit(1);
    }
}

fn timed<F, T>(perf: bool, name: &str, mut f: F) -> T
where
    F: FnMut() -> T,
{
    let now = std::time::Instant::now();
    let result = f();
    if perf {
        let elapsed = now.elapsed().as_micros() as f64 / 1000.0;
        println!("{}: {:.2}ms", name, elapsed);
    }

    result
}

fn process() -> Result<(), String> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            println!("{}", HELP);
            return Err(e);
        }
    };

    if !args.quiet {
        if let Ok(()) = log::set_logger(&LOGGER) {
            let level = if args.verbose {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Warn
            };
            log::set_max_level(level);
        }
    }

    let mut package = timed(args.perf, "Package Parsing", || {
        let archive = resxps::DirArchive::new(&args.in_dir);
        resxps::Package::open(Box::new(archive), resxps::FontDatabase::new())
            .map_err(|e| e.to_string())
    })?;
    package.set_options(args.options.clone());

    if args.list_pages {
        for (idx, page) in package.pages().iter().enumerate() {
            let size = page.size();
            println!(
                "{}: {} {}x{}",
                idx + 1,
                page.part_name(),
                size.width(),
                size.height()
            );
        }

        return Ok(());
    }

    if package.pages().is_empty() {
        return Err("the package has no pages".to_string());
    }

    let index = args.page - 1;
    if args.text {
        let layout = timed(args.perf, "Text Extraction", || {
            package.extract_text(index).map_err(|e| e.to_string())
        })?;

        for entry in layout.entries() {
            let r = entry.rect;
            println!(
                "{:?} {:.4} {:.4} {:.4} {:.4}",
                entry.character, r.left, r.top, r.right, r.bottom
            );
        }

        if args.list_fonts {
            list_fonts(package.fonts());
        }

        return Ok(());
    }

    let page_size = package
        .page(index)
        .map_err(|e| e.to_string())?
        .size()
        .to_int_size();
    let size = args
        .fit_to
        .fit_to_size(page_size)
        .ok_or_else(|| "target size is zero".to_string())?;

    let pixmap = timed(args.perf, "Rendering", || {
        package.render_page(index, size).map_err(|e| e.to_string())
    })?;

    // `<out-png>` is checked by `parse_args`.
    let out_png = args.out_png.as_ref().ok_or("<out-png> must be set")?;
    timed(args.perf, "Saving", || {
        pixmap.save_png(out_png).map_err(|e| e.to_string())
    })?;

    if args.list_fonts {
        list_fonts(package.fonts());
    }

    Ok(())
}

fn list_fonts(fonts: &resxps::FontCache) {
    for (name, family) in fonts.families() {
        match family {
            Some(family) => println!("{}: '{}'", name, family),
            None => println!("{}: failed to load", name),
        }
    }
}

const HELP: &str = "\
resxps is an XPS page rendering application.

USAGE:
  resxps [OPTIONS] <in-dir> <out-png>
  resxps --text [OPTIONS] <in-dir>
  resxps --list-pages <in-dir>

  resxps doc/ page.png
  resxps --page 3 -w 1200 doc/ page.png
  resxps --text doc/

  <in-dir> is an unpacked XPS package, i.e. a directory that
  contains the '_rels/.rels' part.

OPTIONS:
      --help                    Prints this help
  -V, --version                 Prints version

      --page INDEX              Selects the page to process, starting from 1
                                [default: 1]
  -w, --width LENGTH            Sets the width in pixels
  -h, --height LENGTH           Sets the height in pixels
  -z, --zoom FACTOR             Zooms the image by a factor
      --no-anti-alias           Disables anti-aliasing

      --text                    Prints characters of the page with their
                                page-relative bounding boxes instead of rendering
      --list-pages              Prints all pages with their sizes
      --list-fonts              Prints fonts used by the page.
                                Useful for debugging

      --perf                    Prints performance stats
      --quiet                   Disables warnings
      --verbose                 Prints debug messages

ARGS:
  <in-dir>                      Input package directory
  <out-png>                     Output file
";

#[derive(Debug)]
struct CliArgs {
    page: usize,
    width: Option<u32>,
    height: Option<u32>,
    zoom: Option<f32>,
    no_anti_alias: bool,

    text: bool,
    list_pages: bool,
    list_fonts: bool,

    perf: bool,
    quiet: bool,
    verbose: bool,

    input: path::PathBuf,
    output: Option<path::PathBuf>,
}

fn collect_args() -> Result<CliArgs, pico_args::Error> {
    let mut input = pico_args::Arguments::from_env();

    if input.contains("--help") {
        print!("{}", HELP);
        std::process::exit(0);
    }

    if input.contains(["-V", "--version"]) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    Ok(CliArgs {
        page: input.opt_value_from_fn("--page", parse_page)?.unwrap_or(1),
        width: input.opt_value_from_fn(["-w", "--width"], parse_length)?,
        height: input.opt_value_from_fn(["-h", "--height"], parse_length)?,
        zoom: input.opt_value_from_fn(["-z", "--zoom"], parse_zoom)?,
        no_anti_alias: input.contains("--no-anti-alias"),

        text: input.contains("--text"),
        list_pages: input.contains("--list-pages"),
        list_fonts: input.contains("--list-fonts"),

        perf: input.contains("--perf"),
        quiet: input.contains("--quiet"),
        verbose: input.contains("--verbose"),

        input: input.free_from_str()?,
        output: input.opt_free_from_str()?,
    })
}

fn parse_page(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| "invalid page index")?;

    if n > 0 {
        Ok(n)
    } else {
        Err("page indices start from 1".to_string())
    }
}

fn parse_length(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|_| "invalid length")?;

    if n > 0 {
        Ok(n)
    } else {
        Err("LENGTH cannot be zero".to_string())
    }
}

fn parse_zoom(s: &str) -> Result<f32, String> {
    let n: f32 = s.parse().map_err(|_| "invalid zoom factor")?;

    if n > 0.0 {
        Ok(n)
    } else {
        Err("ZOOM should be positive".to_string())
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum FitTo {
    /// Keep original size.
    Original,
    /// Scale to width.
    Width(u32),
    /// Scale to height.
    Height(u32),
    /// Scale to size.
    Size(u32, u32),
    /// Zoom by factor.
    Zoom(f32),
}

impl FitTo {
    fn fit_to_size(&self, size: tiny_skia::IntSize) -> Option<tiny_skia::IntSize> {
        match *self {
            FitTo::Original => Some(size),
            FitTo::Width(w) => size.scale_to_width(w),
            FitTo::Height(h) => size.scale_to_height(h),
            FitTo::Size(w, h) => tiny_skia::IntSize::from_wh(w, h).map(|s| size.scale_to(s)),
            FitTo::Zoom(z) => size.scale_by(z),
        }
    }
}

struct Args {
    in_dir: path::PathBuf,
    out_png: Option<path::PathBuf>,
    page: usize,
    text: bool,
    list_pages: bool,
    list_fonts: bool,
    perf: bool,
    quiet: bool,
    verbose: bool,
    fit_to: FitTo,
    options: resxps::Options,
}

fn parse_args() -> Result<Args, String> {
    let args = collect_args().map_err(|e| e.to_string())?;

    if !(args.text || args.list_pages) && args.output.is_none() {
        return Err("<out-png> must be set".to_string());
    }

    if args.text && args.output.is_some() {
        println!("Warning: <out-png> has no effect when --text is set.");
    }

    let mut fit_to = FitTo::Original;
    if let (Some(w), Some(h)) = (args.width, args.height) {
        fit_to = FitTo::Size(w, h);
    } else if let Some(w) = args.width {
        fit_to = FitTo::Width(w);
    } else if let Some(h) = args.height {
        fit_to = FitTo::Height(h);
    } else if let Some(z) = args.zoom {
        fit_to = FitTo::Zoom(z);
    }

    let options = resxps::Options {
        anti_alias: !args.no_anti_alias,
        ..resxps::Options::default()
    };

    Ok(Args {
        in_dir: args.input,
        out_png: args.output,
        page: args.page,
        text: args.text,
        list_pages: args.list_pages,
        list_fonts: args.list_fonts,
        perf: args.perf,
        quiet: args.quiet,
        verbose: args.verbose,
        fit_to,
        options,
    })
}

/// A simple stderr logger.
static LOGGER: SimpleLogger = SimpleLogger;
struct SimpleLogger;
impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let target = if !record.target().is_empty() {
                record.target()
            } else {
                record.module_path().unwrap_or_default()
            };

            let line = record.line().unwrap_or(0);
            let args = record.args();

            match record.level() {
                log::Level::Error => eprintln!("Error (in {}:{}): {}", target, line, args),
                log::Level::Warn => eprintln!("Warning (in {}:{}): {}", target, line, args),
                log::Level::Info => eprintln!("Info (in {}:{}): {}", target, line, args),
                log::Level::Debug => eprintln!("Debug (in {}:{}): {}", target, line, args),
                log::Level::Trace => eprintln!("Trace (in {}:{}): {}", target, line, args),
            }
        }
    }

    fn flush(&self) {}
}
