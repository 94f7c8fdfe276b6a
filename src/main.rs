use clap::{Parser, Subcommand};
use photo_variants::backfill::{self, BackfillOptions, MetadataStore, STORE_FILENAME};
use photo_variants::pipeline::{GatedOutcome, Pipeline};
use photo_variants::storage::FileSystemStorage;
use photo_variants::{config, naming, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "photo-variants")]
#[command(about = "Validate images and generate responsive JPEG/AVIF variants")]
#[command(long_about = "\
Validate images and generate responsive JPEG/AVIF variants

Every source image becomes a normalized JPEG plus four variants, written next
to it, and a metadata record describing them:

  gallery/7/
  ├── pic.jpg              # normalized original (replaces pic.png)
  ├── pic__thumb.jpg       # 160x160 center crop
  ├── pic__thumb.avif
  ├── pic__medium.jpg      # fits 600x900
  ├── pic__large.jpg       # fits 1200x1600
  └── pic__xlarge.jpg      # fits 1600x2000

Metadata records are kept in a JSON store (default <root>/.photo-variants.json)
keyed by entity id, the image's directory plus stem. Images are reprocessed
only when their content, the pipeline version or the encoding settings change.

Run 'photo-variants gen-config' to generate a documented photo-variants.toml.")]
#[command(version)]
struct Cli {
    /// Pipeline config file (optional; stock defaults when absent)
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a single image and print its metadata
    Process {
        /// Image file to process
        file: PathBuf,
        /// Media root the store and keys are relative to (default: the file's directory)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Reprocess even if the stored metadata is current
        #[arg(long)]
        force: bool,
    },
    /// Regenerate variants and metadata for every image under a media root
    Backfill {
        /// Media root to scan
        #[arg(long)]
        root: PathBuf,
        /// Metadata store file (default: <root>/.photo-variants.json)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Reprocess every image
        #[arg(long)]
        force: bool,
        /// Reprocess images whose content or pipeline version changed
        #[arg(long, conflicts_with = "force")]
        reprocess_changed: bool,
        /// Process at most this many images
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print a stock photo-variants.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Process { file, root, force } => {
            let pipeline_config = config::load_config(&cli.config)?;
            let root = match root {
                Some(root) => root,
                None => file.parent().unwrap_or(Path::new(".")).to_path_buf(),
            };
            let storage = FileSystemStorage::new(&root);
            let key = storage
                .key_for(&file)
                .or_else(|| file.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .ok_or_else(|| format!("{} is not under {}", file.display(), root.display()))?;

            let store_path = root.join(STORE_FILENAME);
            let mut store = MetadataStore::load(&store_path);
            let id = naming::AssetKey::parse(&key).id();
            let existing = store.get(&id).and_then(|e| e.image_meta.clone());

            let pipeline = Pipeline::new(pipeline_config);
            match pipeline.process_gated(&storage, &key, existing.as_ref(), force)? {
                GatedOutcome::Unchanged => {
                    println!("{} → unchanged", file.display());
                }
                GatedOutcome::Processed { outcome, .. } => {
                    let asset = outcome.asset_key(&key);
                    output::print_process_output(&file, &outcome)?;
                    store.entries.insert(
                        id,
                        backfill::StoreEntry {
                            asset,
                            image_meta: Some(outcome),
                        },
                    );
                    store.save(&store_path)?;
                }
            }
        }
        Command::Backfill {
            root,
            store,
            force,
            reprocess_changed,
            limit,
        } => {
            let pipeline_config = config::load_config(&cli.config)?;
            init_thread_pool(&pipeline_config.processing);
            let store_path = store.unwrap_or_else(|| root.join(STORE_FILENAME));
            let mut metadata_store = MetadataStore::load(&store_path);

            let keys = backfill::discover_assets(&root)?;
            let added = metadata_store.register(&keys);
            println!(
                "==> {} images under {} ({} new)",
                keys.len(),
                root.display(),
                added
            );

            let storage = FileSystemStorage::new(&root);
            let pipeline = Pipeline::new(pipeline_config);
            let options = BackfillOptions {
                force,
                reprocess_if_changed: reprocess_changed,
                limit,
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_backfill_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let stats = backfill::run(&pipeline, &storage, &mut metadata_store, &options, Some(tx));
            printer
                .join()
                .map_err(|_| "output thread panicked")?;
            metadata_store.save(&store_path)?;
            output::print_backfill_summary(&stats, &store_path);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
