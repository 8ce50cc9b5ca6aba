//! Command-line front end: mustachize image files on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use mustachizer::{Config, DecalSelector, MediaFormat, Mustachizer, SizePreset};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MUSTACHE THE WORLD!! Mustachize everything... or almost",
    after_help = "Supported media formats: PNG, JPEG, GIF"
)]
struct Args {
    /// Path(s) to the file(s)
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Mustache type, or "random"
    #[arg(short = 't', long = "type", default_value = "random")]
    mustache: String,

    /// Mustache size (realist, big, massive)
    #[arg(short, long, default_value = "realist")]
    size: String,

    /// Output directory
    #[arg(short, long, default_value = "./output/")]
    output: PathBuf,

    /// List all the mustache types
    #[arg(short, long)]
    list: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Path to the face detection model, overriding the configuration
    #[arg(long)]
    model: Option<PathBuf>,

    /// Draw face boxes and mustache outlines, and log at debug level
    #[arg(long)]
    debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { args.log.as_str() };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(level));

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(model) = &args.model {
        config.detector_model = model.clone();
    }
    config.debug |= args.debug;
    config.validate()?;

    if args.list {
        print_mustache_list(&config);
        return Ok(());
    }
    if args.files.is_empty() {
        warn!("No files given, nothing to mustachize");
        return Ok(());
    }

    let mut mustachizer = Mustachizer::from_config(&config).context("failed to initialize")?;
    let selector = parse_selector(&args.mustache, &config);
    let size = SizePreset::from_name(&args.size);

    let mut failures = 0;
    for file in &args.files {
        info!("Active media: {}", file.display());
        if let Err(e) = process_file(&mut mustachizer, file, &args.output, &selector, size) {
            error!("{}: {e:#}", file.display());
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) failed", args.files.len());
    }
    Ok(())
}

fn print_mustache_list(config: &Config) {
    println!("Available mustaches are:");
    for spec in config.decal_specs() {
        println!(" - {}", spec.name);
    }
}

/// Unknown names warn here and fall back to random.
fn parse_selector(name: &str, config: &Config) -> DecalSelector {
    let selector = DecalSelector::from_name(name);
    if let DecalSelector::Named(name) = &selector {
        let known = config
            .decal_specs()
            .iter()
            .any(|spec| spec.name.eq_ignore_ascii_case(name));
        if !known {
            warn!("Unknown mustache {name:?}, choosing randomly");
            return DecalSelector::Random;
        }
    }
    selector
}

/// Input format from the file extension, if on the allow-list.
fn supported_format(path: &Path) -> Option<MediaFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(MediaFormat::from_extension)
}

/// `<dir>/<stem>_mustachized.<ext>`, keeping the input extension.
fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{stem}_mustachized.{extension}"))
}

fn process_file(
    mustachizer: &mut Mustachizer,
    file: &Path,
    output_dir: &Path,
    selector: &DecalSelector,
    size: SizePreset,
) -> Result<PathBuf> {
    if !file.is_file() {
        anyhow::bail!("not a file, mustachization is ignored");
    }
    if supported_format(file).is_none() {
        anyhow::bail!("media not supported, only supporting PNG, JPEG, GIF");
    }

    let input = std::fs::read(file).context("failed to read input")?;
    let result = mustachizer.apply(&input, selector, size)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_path(file, output_dir);
    std::fs::write(&path, &result.data)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(
        "Mustachization done: {} ({} with {})",
        path.display(),
        result.format,
        result.decal_names().join(", ")
    );
    Ok(path)
}
