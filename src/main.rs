use clap::{Parser, Subcommand};
use disc_intake::cache::TransformCache;
use disc_intake::config::{self, IntakeConfig};
use disc_intake::imaging::Rotation;
use disc_intake::preview::{EditSession, PreviewRenderer};
use disc_intake::upload::{HttpObjectStore, LocalObjectStore, ObjectStore};
use disc_intake::{IntakePipeline, ItemId, SelectedFile, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Shared flags for commands that transform images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the transform cache and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "disc-intake")]
#[command(about = "Frame, resize and upload listing photos")]
#[command(long_about = "\
Frame, resize and upload listing photos

Every image is cropped to 4:3, capped at the configured edge length,
re-encoded as JPEG and stored under a dated, owner-scoped key:

  {user_id}/{yyyy}/{mm}/{dd}/{millis}-{random}[-a{attempt}][-signed].jpg

With no [storage] endpoint configured, objects are written below --out-dir.
Otherwise they go to the hosted object store, authenticated with the key in
DISC_INTAKE_API_KEY.

Run 'disc-intake gen-config' to generate a documented intake.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "intake.toml", global = true)]
    config: PathBuf,

    /// Root directory for the local object store
    #[arg(long, default_value = "uploads", global = true)]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform and upload images (directories are walked)
    Upload {
        /// Image files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// API key for the hosted object store
        #[arg(long, env = "DISC_INTAKE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Print the stored {url, key} records as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Render the live preview of a framing to a PNG
    Preview {
        file: PathBuf,

        /// Clockwise rotation in degrees (0, 90, 180, 270)
        #[arg(long, default_value_t = 0)]
        rotate: i32,

        #[arg(long, default_value_t = 1.0)]
        zoom: f64,

        #[arg(long, default_value_t = 0.5)]
        pan_x: f64,

        #[arg(long, default_value_t = 0.5)]
        pan_y: f64,

        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },
    /// Validate the configuration file
    Check,
    /// Print a stock intake.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Upload {
            paths,
            api_key,
            json,
            cache,
        } => {
            let config = config::load_config(&cli.config)?;
            let store = open_store(&config, &cli.out_dir, api_key.as_deref())?;
            let files = read_selection(&paths).await?;
            if files.is_empty() {
                println!("No files found");
                return Ok(());
            }

            let cache = if cache.no_cache {
                TransformCache::disabled()
            } else {
                TransformCache::new()
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for announcement in rx {
                    println!("{}", output::format_announcement(&announcement));
                }
            });

            let pipeline = IntakePipeline::builder(config, store)
                .cache(Arc::new(cache))
                .announcements(tx)
                .build()?;
            pipeline.add_files(files).await?;

            let items = pipeline.snapshot();
            let stored = pipeline.stored_objects();
            let stats = pipeline.cache().stats();
            // Closes the announcement channel
            drop(pipeline);
            printer.join().map_err(|_| "announcement printer panicked")?;

            output::print_items(&items);
            println!("Cache: {}", stats);
            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            }
        }
        Command::Preview {
            file,
            rotate,
            zoom,
            pan_x,
            pan_y,
            out,
        } => {
            let config = config::load_config(&cli.config)?;
            let rotation = Rotation::from_degrees(rotate)
                .ok_or_else(|| format!("rotation must be a multiple of 90, got {}", rotate))?;
            let bytes = std::fs::read(&file)?;
            let surface = (config.preview.width, config.preview.height);
            let renderer = PreviewRenderer::new(&bytes, surface)?;

            let mut session = EditSession::open(ItemId(0), renderer);
            for _ in 0..rotation.degrees() / 90 {
                session.rotate_cw();
            }
            session.set_zoom(zoom);
            session.set_pan(pan_x, pan_y);
            session.frame().save(&out)?;

            let (w, h) = session.renderer().source_dimensions();
            println!(
                "{} ({}x{}) -> {} ({}x{})",
                file.display(),
                w,
                h,
                out.display(),
                session.frame().width(),
                session.frame().height()
            );
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            println!("==> {} is valid", cli.config.display());
            println!(
                "    {} items max, {} MB per file, {}px edge, quality {}",
                config.max_items,
                config.max_file_mb,
                config.max_edge_px,
                config.quality().value()
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Hosted storage when an endpoint is configured, the local store otherwise.
fn open_store(
    config: &IntakeConfig,
    out_dir: &Path,
    api_key: Option<&str>,
) -> Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    if config.storage.endpoint.is_empty() {
        return Ok(Arc::new(LocalObjectStore::new(out_dir.join(&config.bucket))));
    }
    let api_key = api_key.ok_or("DISC_INTAKE_API_KEY is required for hosted storage")?;
    Ok(Arc::new(HttpObjectStore::new(
        &config.storage.endpoint,
        &config.bucket,
        api_key,
    )))
}

/// Expand directories (sorted, recursive) and read every file.
async fn read_selection(paths: &[PathBuf]) -> std::io::Result<Vec<SelectedFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries: Vec<PathBuf> = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            for entry in entries {
                files.push(SelectedFile::read(&entry).await?);
            }
        } else {
            files.push(SelectedFile::read(path).await?);
        }
    }
    Ok(files)
}
