//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Terrain engine command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "tellus", about = "Adaptive spherical terrain engine")]
pub struct CliArgs {
    /// Formation radius in meters.
    #[arg(long)]
    pub radius: Option<f64>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use the flat sphere instead of the cratered height field.
    #[arg(long)]
    pub flat: bool,

    /// Number of craters to attempt.
    #[arg(long)]
    pub craters: Option<usize>,

    /// Target quaterna count.
    #[arg(long)]
    pub target: Option<usize>,

    /// Quaterna capacity.
    #[arg(long)]
    pub max_quaterna: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to the config file (overrides the default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of ticks the demo runs.
    #[arg(long)]
    pub ticks: Option<u64>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(radius) = args.radius {
            self.formation.radius = radius;
        }
        if let Some(seed) = args.seed {
            self.formation.seed = seed;
        }
        if args.flat {
            self.formation.cratered = false;
        }
        if let Some(craters) = args.craters {
            self.formation.crater_count = craters;
        }
        if let Some(target) = args.target {
            self.lod.target_quaterna = target;
        }
        if let Some(max) = args.max_quaterna {
            self.lod.max_quaterna = max;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
