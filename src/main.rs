use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use stepsync::analyzer::features::EnergyTempoAnalyzer;
use stepsync::analyzer::intensity::Thresholds;
use stepsync::catalog::CsvIntensityCatalog;
use stepsync::choreography::{self, ChoreographyOptions};
use stepsync::clips::{JsonClipStore, MotionClipStore, layout, load_random_clip, metadata};
use stepsync::config::AppConfig;
use stepsync::scoring::{self, FinalScore};

#[derive(Parser)]
#[command(name = "stepsync", version, about = "Music-driven dance choreography and pose scoring")]
struct Cli {
    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-segment loudness, tempo and intensity for a song
    Analyze {
        /// Audio file
        audio: PathBuf,

        /// Only analyze the first N seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Build a choreography for a song from the motion clip library
    Choreograph {
        /// Audio file
        audio: PathBuf,

        /// Motion clip directory (overrides config clips_dir)
        #[arg(long)]
        clips: Option<PathBuf>,

        /// Intensity catalog CSV (overrides config catalog_path)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Low intensity threshold
        #[arg(long)]
        low: Option<f64>,

        /// High intensity threshold
        #[arg(long)]
        high: Option<f64>,

        /// Output frames per second
        #[arg(long)]
        frame_rate: Option<f64>,

        /// Seconds added to every frame time
        #[arg(long)]
        frame_delay: Option<f64>,

        /// Only choreograph the first N seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Random seed for reproducible clip selection
        #[arg(long)]
        seed: Option<u64>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Write frames here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a recorded performance against a reference pose sequence
    Score {
        /// Performer poses (JSON list of poses)
        user: PathBuf,

        /// Reference poses (JSON list of poses). Without it a random clip
        /// from the clip library is used.
        reference: Option<PathBuf>,

        /// Motion clip directory for a random reference (overrides config clips_dir)
        #[arg(long)]
        clips: Option<PathBuf>,

        /// Restrict the random reference to a dance style code, e.g. gBR
        #[arg(long)]
        style: Option<String>,

        /// Random seed for the reference pick
        #[arg(long)]
        seed: Option<u64>,

        /// Capture rate of the performer poses
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the motion clip library
    Clips {
        /// Motion clip directory (overrides config clips_dir)
        #[arg(long)]
        clips: Option<PathBuf>,

        /// Only clips of this dance style code, e.g. gBR
        #[arg(long)]
        style: Option<String>,

        /// Only clips of this difficulty code, e.g. d04
        #[arg(long)]
        difficulty: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Analyze { audio, duration, jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let mut options = config
                .sequencer
                .analyze_options(workers)
                .context("Invalid sequencer config")?;
            options.song_duration = duration;
            options.show_progress = true;

            let segments = stepsync::analyzer::analyze_file(&audio, &EnergyTempoAnalyzer, &options)
                .with_context(|| format!("Failed to analyze {}", audio.display()))?;

            if segments.is_empty() {
                println!("No audio to analyze.");
                return Ok(());
            }

            println!(
                "{:>7} {:>7} {:>8} {:>7} {:>6}  {}",
                "Start", "End", "Amp", "BPM", "Score", "Intensity"
            );
            println!("{}", "-".repeat(50));
            for s in &segments {
                println!(
                    "{:>7.1} {:>7.1} {:>8.4} {:>6.1}{} {:>6.3}  {}",
                    s.start_time,
                    s.end_time,
                    s.amplitude,
                    s.bpm,
                    if s.bpm_defaulted { "*" } else { " " },
                    s.combined_score,
                    s.intensity
                );
            }
            if segments.iter().any(|s| s.bpm_defaulted) {
                println!();
                println!("* tempo not measurable, default used");
            }
        }

        Commands::Choreograph {
            audio,
            clips,
            catalog,
            low,
            high,
            frame_rate,
            frame_delay,
            duration,
            seed,
            jobs,
            output,
        } => {
            let clips_dir = resolve_clips_dir(clips, &config)?;
            let catalog_path = catalog.or(config.catalog_path.clone()).ok_or_else(|| {
                anyhow::anyhow!(
                    "No intensity catalog. Pass --catalog or set catalog_path in config."
                )
            })?;

            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let mut analyze = config
                .sequencer
                .analyze_options(workers)
                .context("Invalid sequencer config")?;
            analyze.song_duration = duration;
            analyze.show_progress = true;
            analyze.thresholds = Thresholds::new(
                low.unwrap_or(analyze.thresholds.low()),
                high.unwrap_or(analyze.thresholds.high()),
            )
            .context("Invalid thresholds")?;

            let mut sequencer = config.sequencer.sequencer_settings();
            if let Some(fr) = frame_rate {
                sequencer.frame_rate = fr;
            }
            if let Some(delay) = frame_delay {
                sequencer.frame_delay = delay;
            }

            let store = JsonClipStore::open(&clips_dir).context("Failed to open clip directory")?;
            let catalog = CsvIntensityCatalog::new(catalog_path);
            let rng = seeded_rng(seed.or(config.seed));

            let options = ChoreographyOptions { analyze, sequencer };
            let result = choreography::choreograph_file(
                &audio,
                &EnergyTempoAnalyzer,
                &store,
                &catalog,
                &options,
                rng,
            )
            .with_context(|| format!("Choreography failed for {}", audio.display()))?;

            let json = stepsync::export::to_json(&result.frames)
                .context("Failed to serialize frames")?;
            let summary = stepsync::export::summarize(&result);
            let summary_line = format!(
                "Choreography complete: {} frames, {:.1}s, {} unique clips ({} low / {} medium / {} high segments)",
                summary.total_frames,
                summary.duration_secs,
                summary.unique_clips,
                summary.segments_by_intensity[0],
                summary.segments_by_intensity[1],
                summary.segments_by_intensity[2],
            );

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{}", summary_line);
                    println!("Wrote {}", path.display());
                }
                None => {
                    println!("{}", json);
                    eprintln!("{}", summary_line);
                }
            }
        }

        Commands::Score {
            user,
            reference,
            clips,
            style,
            seed,
            fps,
            json,
        } => {
            if !(fps > 0.0) {
                anyhow::bail!("--fps must be positive, got {}", fps);
            }
            let settings = config.scorer.scorer_settings().context("Invalid scorer config")?;
            let zero_is_missing = config.scorer.zero_is_missing;

            let user_poses = read_poses(&user, zero_is_missing)?;
            let reference_poses = match reference {
                Some(path) => read_poses(&path, zero_is_missing)?,
                None => {
                    let clips_dir = resolve_clips_dir(clips, &config)?;
                    let store = JsonClipStore::open(&clips_dir)
                        .context("Failed to open clip directory")?;
                    let mut rng = seeded_rng(seed.or(config.seed));
                    let picked = load_random_clip(&store, style.as_deref(), &mut rng)
                        .context("Failed to load reference clip")?;
                    let Some((id, frames)) = picked else {
                        anyhow::bail!("No reference clip matches in {}", clips_dir.display());
                    };
                    eprintln!("Reference clip: {}", id);
                    frames
                }
            };
            let timestamps: Vec<f64> = (0..user_poses.len()).map(|i| i as f64 / fps).collect();

            let result = scoring::score_performance(
                reference_poses,
                &user_poses,
                Some(timestamps.as_slice()),
                settings,
            );

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialize score")?
                );
            } else {
                print_final_score(&result);
            }
        }

        Commands::Clips {
            clips,
            style,
            difficulty,
        } => {
            let clips_dir = resolve_clips_dir(clips, &config)?;
            let store = JsonClipStore::open(&clips_dir).context("Failed to open clip directory")?;
            let mut ids = store.list_clips();
            if let Some(style) = &style {
                ids = metadata::clips_by_style(&ids, style).into_iter().cloned().collect();
            }
            if let Some(difficulty) = &difficulty {
                ids = metadata::clips_by_difficulty(&ids, difficulty)
                    .into_iter()
                    .cloned()
                    .collect();
            }
            let summary = metadata::summarize(&ids);

            println!("Clip library: {}", clips_dir.display());
            println!("Total clips: {}", summary.total_clips);

            println!();
            println!("{:<8} {:<16} {:>6}", "Style", "Name", "Clips");
            for (code, count) in &summary.styles {
                let name = metadata::expand_style_code(code).unwrap_or("-");
                println!("{:<8} {:<16} {:>6}", code, name, count);
            }

            println!();
            println!("{:<8} {:<16} {:>6}", "Motion", "Name", "Clips");
            for (code, count) in &summary.motion_types {
                let name = metadata::expand_motion_code(code).unwrap_or("-");
                println!("{:<8} {:<16} {:>6}", code, name, count);
            }

            println!();
            println!("{:<8} {:>6}", "Level", "Clips");
            for (difficulty, count) in &summary.difficulties {
                println!("{:<8} {:>6}", difficulty, count);
            }

            if !summary.sample_ids.is_empty() {
                println!();
                println!("Sample clips:");
                for id in &summary.sample_ids {
                    println!("  {}", id);
                }
            }
        }
    }

    Ok(())
}

fn resolve_clips_dir(cli_value: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    cli_value.or(config.clips_dir.clone()).ok_or_else(|| {
        anyhow::anyhow!("No clip directory. Pass --clips or set clips_dir in config.")
    })
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn read_poses(path: &Path, zero_is_missing: bool) -> Result<Vec<stepsync::pose::PoseFrame>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let poses = layout::parse_pose_sequence(&text, zero_is_missing)
        .with_context(|| format!("Failed to parse poses in {}", path.display()))?;
    log::info!("Loaded {} poses from {}", poses.len(), path.display());
    Ok(poses)
}

fn print_final_score(result: &FinalScore) {
    println!("Poses scored:      {:>6}", result.total_poses);
    println!("Overall:           {:>6.1}", result.overall_score);
    println!("  Spatial:         {:>6.1}", result.spatial_score);
    println!("  Timing:          {:>6.1}", result.timing_score);
    println!("  Rhythm:          {:>6.1}", result.rhythm_score);
    println!("Alignment quality: {:>6.1}", result.alignment_quality);
    println!();
    println!("{}", result.feedback);
}
