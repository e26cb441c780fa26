//! Songmap CLI
//!
//! Command-line interface for training song maps and querying recommendations.

use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use log::error;
use songmap::{
    Config, GridSnapshot, GridType, InMemoryCatalog, RecordId, Result, SearchConfig, SongMap,
    SongmapError,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "songmap")]
#[command(version)]
#[command(about = "Self-organizing song map recommender", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a map from a JSON catalog and save a snapshot
    Train {
        /// Catalog file (JSON array of records)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output snapshot file
        #[arg(short, long)]
        output: PathBuf,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Grid width
        #[arg(long)]
        width: Option<usize>,

        /// Grid height
        #[arg(long)]
        height: Option<usize>,

        /// Number of training iterations
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Use hexagonal neighbourhoods
        #[arg(long)]
        hexagonal: bool,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Recommend records similar to a catalog record
    Recommend {
        /// Catalog file the snapshot was trained on
        #[arg(short, long)]
        catalog: PathBuf,

        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Record id
        id: String,

        /// Number of results
        #[arg(short = 'k', long, default_value = "10")]
        count: usize,

        /// Last ring to scan (default: larger grid side)
        #[arg(long)]
        max_rings: Option<usize>,
    },

    /// Show snapshot statistics
    Info {
        /// Snapshot file to inspect
        snapshot: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match cli.command {
        Commands::Train {
            catalog,
            output,
            config,
            width,
            height,
            iterations,
            hexagonal,
            seed,
        } => {
            let overrides = TrainOverrides {
                width,
                height,
                iterations,
                hexagonal,
                seed,
            };
            train_map(catalog, output, config, overrides)
        }

        Commands::Recommend {
            catalog,
            snapshot,
            id,
            count,
            max_rings,
        } => recommend(catalog, snapshot, id, count, max_rings),

        Commands::Info { snapshot } => show_info(snapshot),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Command-line values that take precedence over the config file.
struct TrainOverrides {
    width: Option<usize>,
    height: Option<usize>,
    iterations: Option<usize>,
    hexagonal: bool,
    seed: Option<u64>,
}

impl TrainOverrides {
    fn apply(self, config: &mut Config) {
        let training = &mut config.training;
        if let Some(width) = self.width {
            training.grid_width = width;
        }
        if let Some(height) = self.height {
            training.grid_height = height;
        }
        if let Some(iterations) = self.iterations {
            training.iter_max = iterations;
        }
        if self.hexagonal {
            training.grid_type = GridType::Hexagonal;
        }
        if self.seed.is_some() {
            training.seed = self.seed;
        }
    }
}

fn train_map(
    catalog_path: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
    overrides: TrainOverrides,
) -> Result<()> {
    let start_time = Instant::now();

    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    overrides.apply(&mut config);

    println!("Songmap");
    println!("   Training map from: {}", catalog_path.display());
    println!();

    let catalog = InMemoryCatalog::from_json_file(&catalog_path)?;
    println!("✓ Loaded {} records", catalog.len());

    let bar_style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
        .map_err(|e| SongmapError::Config(e.to_string()))?
        .progress_chars("█▓▒░  ");

    let pb = ProgressBar::new(config.training.iter_max as u64);
    pb.set_style(bar_style);
    pb.set_message(format!(
        "Training {}x{} {:?} map...",
        config.training.grid_width, config.training.grid_height, config.training.grid_type
    ));

    let (map, outcome) = SongMap::build_with_progress(&catalog, &config, |i, _, rate, size| {
        pb.set_position(i as u64);
        if i % 100 == 0 {
            pb.set_message(format!("lr={:.4} neighbourhood={}", rate, size));
        }
    })?;
    pb.finish_and_clear();

    match outcome.error() {
        Some(err) => println!(
            "! Training degraded after {} iterations: {}",
            outcome.completed_iterations(),
            err
        ),
        None => println!("✓ Trained for {} iterations", outcome.completed_iterations()),
    }

    println!(
        "✓ Assigned {} records to {} of {} cells",
        map.assignment().record_count(),
        map.assignment().occupied_cells(),
        map.grid().len()
    );

    map.save(&output)?;
    println!("✓ Saved snapshot to {}", output.display());

    println!();
    println!("Training complete in {}", HumanDuration(start_time.elapsed()));
    Ok(())
}

fn recommend(
    catalog_path: PathBuf,
    snapshot_path: PathBuf,
    id: String,
    count: usize,
    max_rings: Option<usize>,
) -> Result<()> {
    let catalog = InMemoryCatalog::from_json_file(&catalog_path)?;
    let search = SearchConfig {
        max_rings,
        ..Default::default()
    };
    let map = SongMap::load(&snapshot_path, &catalog, search)?;

    let rec = map.recommend_n(&RecordId::from(id), count)?;
    let anchor_cell = map
        .assignment()
        .locate(&rec.anchor.id)
        .and_then(|i| map.grid().unit(i))
        .map(|u| u.coordinates().to_string())
        .unwrap_or_default();

    println!(
        "{} [{}] at {}",
        rec.anchor.id, rec.anchor.category, anchor_cell
    );
    if let Some(title) = rec.anchor.metadata.get("title") {
        println!("  {}", title);
    }
    println!();

    if rec.recommendations.is_empty() {
        println!("No recommendations within {} rings", rec.rings_scanned);
        return Ok(());
    }

    for (rank, record) in rec.recommendations.iter().enumerate() {
        let label = record
            .metadata
            .get("title")
            .map(String::as_str)
            .unwrap_or("");
        println!(
            "{:3}. {} [{}] {}",
            rank + 1,
            record.id,
            record.category,
            label
        );
    }

    println!();
    println!("Scanned {} rings", rec.rings_scanned);
    if rec.used_fallback {
        println!("No record of the same category nearby; showing cell mates");
    }
    Ok(())
}

fn show_info(snapshot_path: PathBuf) -> Result<()> {
    let snapshot = GridSnapshot::read(&snapshot_path)?;
    let header = snapshot.header()?;

    println!("Snapshot: {:?}", snapshot_path);
    println!("  Format version: {}", header.version);
    println!(
        "  Grid: {}x{} ({:?})",
        header.width, header.height, header.grid_type
    );
    println!("  Iterations: {}", snapshot.schedule.iter_max);
    println!(
        "  Occupied cells: {} of {}",
        snapshot.occupied_cells(),
        snapshot.units.len()
    );
    println!("  Assigned records: {}", header.member_count);
    println!("  Attributes:");
    for (i, domain) in snapshot.domains.iter().enumerate() {
        println!(
            "    {:2}: [{}, {}) {:?}",
            i, domain.min, domain.max, domain.kind
        );
    }

    Ok(())
}
