use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use collage_core::prelude::*;
use collage_core::{SOLID_PALETTE, layout_to_json};
use globset::{Glob, GlobSetBuilder};
use image::{DynamicImage, ImageReader};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "collage",
    about = "Lay out photos into collage templates and export them",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in templates
    Templates(TemplatesArgs),
    /// Print the frames of a template for a given image count and canvas (JSON)
    Layout(LayoutArgs),
    /// Render a collage from image files and write collage.<ext>
    Render(RenderArgs),
}

#[derive(Parser, Debug, Clone)]
struct TemplatesArgs {
    /// Print as JSON instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser, Debug, Clone)]
struct LayoutArgs {
    /// Template id or name
    #[arg(short, long, default_value = "2")]
    template: String,
    /// Number of images
    #[arg(short = 'n', long, default_value_t = 4)]
    count: usize,
    /// Canvas width in points
    #[arg(long, default_value_t = 1080.0)]
    width: f64,
    /// Canvas height in points
    #[arg(long, default_value_t = 1080.0)]
    height: f64,
    /// Circle radius multiplier
    #[arg(long, default_value_t = 1.0)]
    radius_scale: f64,
    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct RenderArgs {
    // Input/Output
    /// Input image file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory (collage.<ext> is written here)
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file path (present fields override CLI options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Template id or name
    #[arg(short, long, default_value = "2", help_heading = "Layout")]
    template: String,
    /// Canvas width in points
    #[arg(long, default_value_t = 1080.0, help_heading = "Layout")]
    width: f64,
    /// Canvas height in points
    #[arg(long, default_value_t = 1080.0, help_heading = "Layout")]
    height: f64,
    /// Circle radius multiplier
    #[arg(long, default_value_t = 1.0, help_heading = "Layout")]
    radius_scale: f64,
    /// Shuffle image order with this seed
    #[arg(long, help_heading = "Layout")]
    shuffle_seed: Option<u64>,

    // Decoration
    /// Background: white|black|blue|pink|yellow|gray, #rrggbb, or gradient:<0-3>
    #[arg(long, default_value = "gray", help_heading = "Decoration")]
    background: String,
    /// Text overlay as "text@x,y" (repeatable); position defaults to 100,100
    #[arg(long, help_heading = "Decoration")]
    text: Vec<String>,
    /// Treat the premium entitlement as purchased (no watermark)
    #[arg(long, default_value_t = false, help_heading = "Decoration")]
    purchased: bool,

    // Export
    /// Resolution: low (720) | medium (1080) | high (2160)
    #[arg(long, default_value = "high", help_heading = "Export")]
    resolution: String,
    /// Format: jpeg | png | heic (written as jpeg)
    #[arg(long, default_value = "jpeg", help_heading = "Export")]
    format: String,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: load images and describe the scene but do not render
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Templates(args) => run_templates(args),
        Commands::Layout(args) => run_layout(args),
        Commands::Render(args) => run_render(args, cli.progress && !cli.quiet),
    }
}

fn run_templates(args: &TemplatesArgs) -> anyhow::Result<()> {
    let catalog = TemplateCatalog::builtin()?;
    if args.json {
        let list = serde_json::to_string_pretty(catalog.templates())?;
        println!("{list}");
        return Ok(());
    }
    println!("{:>5}  {:<18}  kind", "id", "name");
    for t in catalog.iter() {
        let kind = match t.kind {
            TemplateType::Grid { rows, columns } => format!("grid {rows}x{columns}"),
            TemplateType::Circle => "circle".into(),
            TemplateType::Mosaic => format!("mosaic ({} cells)", t.layout.len()),
            TemplateType::Freeform => "freeform".into(),
            TemplateType::Shape { shape } => format!("shape {}", shape.name().to_lowercase()),
        };
        println!("{:>5}  {:<18}  {}", t.id, t.name, kind);
    }
    Ok(())
}

fn run_layout(args: &LayoutArgs) -> anyhow::Result<()> {
    let catalog = TemplateCatalog::builtin()?;
    let template = resolve_template(&catalog, &args.template)?;
    let cfg = CollageConfig::builder()
        .with_canvas(args.width, args.height)
        .radius_scale(args.radius_scale)
        .build();
    cfg.validate()?;
    let canvas = cfg.canvas_size();
    let frames = compute_layout(template, &cfg.layout_params(), args.count, canvas);
    let json = serde_json::to_string_pretty(&layout_to_json(template, canvas, &frames))?;
    match &args.out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), frames = frames.len(), "layout written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_render(cli: &RenderArgs, show_progress: bool) -> anyhow::Result<()> {
    let mut plan = RenderPlan {
        template: cli.template.clone(),
        shuffle_seed: cli.shuffle_seed,
        purchased: cli.purchased,
    };
    let mut cfg = CollageConfig::builder()
        .with_canvas(cli.width, cli.height)
        .radius_scale(cli.radius_scale)
        .background(parse_background(&cli.background)?)
        .resolution(parse_resolution(&cli.resolution)?)
        .format(parse_format(&cli.format)?)
        .build();

    if let Some(path) = &cli.config {
        let file = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        y.apply(&mut cfg, &mut plan)?;
    }
    cfg.validate()?;

    if cli.print_config {
        let s = match cli.print_config_format.as_str() {
            "yaml" => serde_yaml::to_string(&cfg)?,
            _ => serde_json::to_string_pretty(&cfg)?,
        };
        println!("{s}");
        return Ok(());
    }

    let catalog = Arc::new(TemplateCatalog::builtin()?);
    let template_id = resolve_template(&catalog, &plan.template)?.id;

    let mut paths = gather_paths(&cli.input, &cli.include, &cli.exclude)?;
    paths.sort();
    if paths.is_empty() {
        anyhow::bail!("no images found under {}", cli.input.display());
    }
    let images = load_images_with_progress(&paths, show_progress)?;
    info!(count = images.len(), "images loaded");

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create out_dir {}", cli.out_dir.display()))?;
    let settings = cfg.export;
    let mut session = EditingSession::new(
        catalog,
        Arc::new(StaticEntitlement(plan.purchased)),
        Arc::new(RasterRenderer::new()),
        Box::new(DirectorySink::new(&cli.out_dir)),
        cfg,
    )?;
    session.set_images(images);
    session.select_template(template_id)?;
    if let Some(seed) = plan.shuffle_seed {
        session.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    for entry in &cli.text {
        let (text, position) = parse_text(entry)?;
        let id = session.add_text();
        session.tap_text(id);
        session.edit_text(text);
        session.submit_text();
        session.drag_text(id, position);
    }

    if cli.dry_run {
        let scene = session.scene();
        info!(
            template = session.template().name.as_str(),
            items = scene.items.len(),
            bounds = ?session.bounding_rect(),
            "dry run"
        );
        return Ok(());
    }

    let t0 = Instant::now();
    match session.request_export(settings) {
        ExportDispatch::Started(_) => {}
        other => anyhow::bail!("export did not start: {other:?}"),
    }
    let outcomes = session.wait_idle(Duration::from_secs(600));
    if outcomes.is_empty() {
        anyhow::bail!("export timed out");
    }
    for outcome in outcomes {
        match outcome {
            ExportOutcome::Saved {
                file_name,
                watermarked,
                ..
            } => {
                let path = cli.out_dir.join(&file_name);
                info!(
                    path = %path.display(),
                    watermarked,
                    side = settings.resolution.side(),
                    elapsed = %fmt_dur(t0.elapsed()),
                    "collage exported"
                );
            }
            ExportOutcome::Failed { error, .. } => {
                return Err(error).context("export failed");
            }
        }
    }
    Ok(())
}

/// Non-config choices a YAML file may also override.
#[derive(Debug, Clone)]
struct RenderPlan {
    template: String,
    shuffle_seed: Option<u64>,
    purchased: bool,
}

fn resolve_template<'a>(catalog: &'a TemplateCatalog, key: &str) -> anyhow::Result<&'a Template> {
    let found = match key.parse::<u32>() {
        Ok(id) => catalog.get(id),
        Err(_) => catalog.find_by_name(key),
    };
    found.with_context(|| format!("unknown template '{key}' (see `collage templates`)"))
}

fn parse_resolution(s: &str) -> anyhow::Result<ResolutionTier> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown resolution: {}", s))
}

fn parse_format(s: &str) -> anyhow::Result<ExportFormat> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown export format: {}", s))
}

fn parse_background(s: &str) -> anyhow::Result<Background> {
    let lower = s.trim().to_ascii_lowercase();
    if let Some(id) = lower.strip_prefix("gradient:") {
        let id: u8 = id
            .parse()
            .with_context(|| format!("bad gradient id in '{s}'"))?;
        if id >= collage_core::GRADIENT_COUNT {
            anyhow::bail!("gradient id must be below {}", collage_core::GRADIENT_COUNT);
        }
        return Ok(Background::Gradient { id });
    }
    if let Some(hex) = lower.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            anyhow::bail!("expected #rrggbb, got '{}'", s);
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let color = Color([channel(0)?, channel(2)?, channel(4)?, 255]);
        return Ok(Background::Solid { color });
    }
    let names = ["white", "black", "blue", "pink", "yellow", "gray"];
    match names.iter().position(|n| *n == lower || (lower == "grey" && *n == "gray")) {
        Some(i) => Ok(Background::Solid {
            color: SOLID_PALETTE[i],
        }),
        None => anyhow::bail!("unknown background: {}", s),
    }
}

/// Parses `text@x,y`. Without `@`, the overlay keeps the default position.
fn parse_text(arg: &str) -> anyhow::Result<(String, Point)> {
    let Some((text, pos)) = arg.rsplit_once('@') else {
        return Ok((arg.to_string(), collage_core::DEFAULT_OVERLAY_POSITION));
    };
    let (x, y) = pos
        .split_once(',')
        .with_context(|| format!("expected text@x,y, got '{arg}'"))?;
    let x: f64 = x.trim().parse().with_context(|| format!("bad x in '{arg}'"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("bad y in '{arg}'"))?;
    Ok((text.to_string(), Point::new(x, y)))
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn gather_paths(
    path: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_image(path) {
            list.push(path.to_path_buf());
        }
    } else {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) && is_image(p) {
                list.push(p.to_path_buf());
            }
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<globset::GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob '{pat}'"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(
    p: &Path,
    include: Option<&globset::GlobSet>,
    exclude: Option<&globset::GlobSet>,
) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "gif" | "webp")
    )
}

fn load_images_with_progress(
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<SourceImage>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        match load_image(p) {
            Ok(img) => {
                let key = p.to_string_lossy().replace('\\', "/");
                list.push(SourceImage::new(key, img));
            }
            Err(e) => {
                error!(?p, error = %e, "skip image");
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    if list.len() < paths.len() {
        warn!(skipped = paths.len() - list.len(), "some images could not be decoded");
    }
    Ok(list)
}

fn load_image(p: &Path) -> anyhow::Result<DynamicImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    template: Option<String>,
    canvas_width: Option<f64>,
    canvas_height: Option<f64>,
    radius_scale: Option<f64>,
    overscan: Option<f64>,
    freeform_cell: Option<f64>,
    background: Option<String>,
    resolution: Option<String>,
    format: Option<String>,
    watermark_text: Option<String>,
    shuffle_seed: Option<u64>,
    purchased: Option<bool>,
}

impl YamlConfig {
    fn apply(self, cfg: &mut CollageConfig, plan: &mut RenderPlan) -> anyhow::Result<()> {
        if let Some(v) = self.template {
            plan.template = v;
        }
        if let Some(v) = self.shuffle_seed {
            plan.shuffle_seed = Some(v);
        }
        if let Some(v) = self.purchased {
            plan.purchased = v;
        }
        if let Some(v) = self.canvas_width {
            cfg.canvas_width = v;
        }
        if let Some(v) = self.canvas_height {
            cfg.canvas_height = v;
        }
        if let Some(v) = self.radius_scale {
            cfg.radius_scale = v;
        }
        if let Some(v) = self.overscan {
            cfg.overscan = v;
        }
        if let Some(v) = self.freeform_cell {
            cfg.freeform_cell = v;
        }
        if let Some(v) = self.background {
            cfg.background = parse_background(&v)?;
        }
        if let Some(v) = self.resolution {
            cfg.export.resolution = parse_resolution(&v)?;
        }
        if let Some(v) = self.format {
            cfg.export.format = parse_format(&v)?;
        }
        if let Some(v) = self.watermark_text {
            cfg.watermark_text = v;
        }
        Ok(())
    }
}
