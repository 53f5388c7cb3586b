//! mdpatch CLI - fill DOCX template placeholders from Markdown

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mdpatch::project::{project_resolved, ResolvedImages};
use mdpatch::resolve::{DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH};
use mdpatch::{
    parse_markdown, patch_document_with_markdown, BoxError, ImageData, ImageResolverOptions,
    MarkdownPatchOptions, OutputType, PatchOutput,
};

#[derive(Parser)]
#[command(name = "mdpatch")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Patch DOCX template placeholders with Markdown content", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace placeholders in a template
    Apply {
        /// Template DOCX file
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Placeholder patch: NAME=FILE.md, or NAME=@MARKDOWN for inline text
        #[arg(short, long = "patch", value_name = "NAME=SOURCE", required = true)]
        patches: Vec<String>,

        /// Directory relative image paths resolve against
        #[arg(long, value_name = "DIR", env = "MDPATCH_BASE_DIR")]
        base_dir: Option<PathBuf>,

        /// Image width in pixels
        #[arg(long, default_value_t = DEFAULT_IMAGE_WIDTH)]
        width: u32,

        /// Image height in pixels
        #[arg(long, default_value_t = DEFAULT_IMAGE_HEIGHT)]
        height: u32,

        /// Placeholder start marker
        #[arg(long, default_value = "{{")]
        start: String,

        /// Placeholder end marker
        #[arg(long, default_value = "}}")]
        end: String,

        /// Do not copy the placeholder's formatting onto inserted text
        #[arg(long)]
        no_keep_styles: bool,

        /// Replace only the first occurrence of each placeholder
        #[arg(long)]
        no_recursive: bool,

        /// Fail on remote images instead of downloading them
        #[arg(long)]
        no_fetch: bool,

        /// Write the document as base64 text
        #[arg(long)]
        base64: bool,
    },

    /// Print the paragraph outline projected from a Markdown file
    Inspect {
        /// Markdown file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show version information
    Version,
}

struct ApplyArgs {
    template: PathBuf,
    output: PathBuf,
    patches: Vec<String>,
    base_dir: Option<PathBuf>,
    width: u32,
    height: u32,
    start: String,
    end: String,
    keep_styles: bool,
    recursive: bool,
    fetch: bool,
    base64: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Apply {
            template,
            output,
            patches,
            base_dir,
            width,
            height,
            start,
            end,
            no_keep_styles,
            no_recursive,
            no_fetch,
            base64,
        }) => cmd_apply(ApplyArgs {
            template,
            output,
            patches,
            base_dir,
            width,
            height,
            start,
            end,
            keep_styles: !no_keep_styles,
            recursive: !no_recursive,
            fetch: !no_fetch,
            base64,
        }),
        Some(Commands::Inspect { input, compact }) => cmd_inspect(&input, compact),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!(
                "{}",
                "Usage: mdpatch apply <TEMPLATE> -o <OUTPUT> --patch NAME=FILE.md".yellow()
            );
            println!("       mdpatch --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_apply(args: ApplyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut markdown_patches = HashMap::new();
    for arg in &args.patches {
        let (name, markdown) = parse_patch_arg(arg)?;
        markdown_patches.insert(name, markdown);
    }

    let data = fs::read(&args.template)?;

    let mut resolver_options =
        ImageResolverOptions::new().with_default_size(args.width, args.height);
    if let Some(dir) = args.base_dir {
        resolver_options = resolver_options.with_base_dir(dir);
    }
    if args.fetch {
        resolver_options = with_http_fetch(resolver_options);
    }

    let output_type = if args.base64 {
        OutputType::Base64
    } else {
        OutputType::Bytes
    };

    let options = MarkdownPatchOptions::new(data)
        .with_patches(markdown_patches)
        .with_image_resolver_options(resolver_options)
        .with_delimiters(args.start, args.end)
        .with_keep_original_styles(args.keep_styles)
        .with_recursive(args.recursive)
        .with_output_type(output_type)
        .with_shared_image_cache(true);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Patching {} placeholders...",
        options.markdown_patches.len()
    ));

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(patch_document_with_markdown(options));
    pb.finish_and_clear();

    match result? {
        PatchOutput::Bytes(bytes) => fs::write(&args.output, bytes)?,
        PatchOutput::Base64(text) => fs::write(&args.output, text)?,
    }

    println!("{} {}", "Saved to".green(), args.output.display());
    Ok(())
}

/// Download remote images over HTTP.
fn with_http_fetch(options: ImageResolverOptions) -> ImageResolverOptions {
    let client = reqwest::Client::new();
    options.with_fetch_fn(move |url: String| {
        let client = client.clone();
        async move {
            log::debug!("GET {}", url);
            let response = client.get(&url).send().await?.error_for_status()?;
            Ok::<_, BoxError>(response.bytes().await?.to_vec())
        }
    })
}

/// Split `NAME=SOURCE` into the placeholder name and its Markdown.
///
/// A source starting with `@` is the Markdown itself; anything else is a
/// file to read.
fn parse_patch_arg(arg: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let (name, source) = arg
        .split_once('=')
        .ok_or_else(|| format!("Invalid patch '{}': expected NAME=SOURCE", arg))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid patch '{}': empty placeholder name", arg).into());
    }

    let markdown = match source.strip_prefix('@') {
        Some(inline) => inline.to_string(),
        None => fs::read_to_string(source)
            .map_err(|e| format!("Cannot read Markdown file '{}': {}", source, e))?,
    };

    Ok((name.to_string(), markdown))
}

fn cmd_inspect(input: &Path, compact: bool) -> Result<(), Box<dyn std::error::Error>> {
    let markdown = fs::read_to_string(input)?;
    let tree = parse_markdown(&markdown);

    // Images are not read; every reference gets the default size
    let images: ResolvedImages = tree
        .image_urls()
        .into_iter()
        .map(|url| {
            let image = ImageData::new(Vec::new(), DEFAULT_IMAGE_WIDTH, DEFAULT_IMAGE_HEIGHT);
            (url.to_string(), Arc::new(image))
        })
        .collect();

    let patch = project_resolved(&tree, &images);
    let json = if compact {
        serde_json::to_string(&patch)?
    } else {
        serde_json::to_string_pretty(&patch)?
    };
    println!("{}", json);

    eprintln!(
        "{} {} paragraphs, {} images",
        "Projected".green(),
        patch.children.len(),
        patch.image_count()
    );
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "mdpatch".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Markdown to DOCX placeholder patching tool");
    println!();
    println!("License: MIT");
}
