//! Demo binary: builds a formation, orbits a camera over it, and runs the
//! tick loop against a concurrent physics reader.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI
//! flags. Run with `cargo run -p tellus-demo` for the defaults, or e.g.
//! `cargo run -p tellus-demo -- --flat --target 256 --ticks 600`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use glam::DVec3;
use tellus_config::{CliArgs, Config, ConfigError};
use tellus_lod::{LodTuning, Polyhedron};
use tellus_math::CameraRay;
use tellus_mesh::{TerrainMesh, default_worker_count, extract_mesh_parallel};
use tellus_terrain::{CrateredField, FlatField, FormationDef, HeightField};
use tracing::info;

fn tuning_from(config: &Config) -> LodTuning {
    LodTuning {
        ray_position_epsilon: config.lod.ray_position_epsilon,
        ray_direction_epsilon: config.lod.ray_direction_epsilon,
        churn_intensity_threshold: config.lod.churn_intensity_threshold,
        max_churn_passes: config.lod.max_churn_passes,
        min_child_edge: config.lod.min_child_edge,
    }
}

/// Eye position for an orbit slightly above the surface, dipping in and out.
fn orbit_ray(def: &FormationDef, tick: u64) -> CameraRay {
    let angle = tick as f64 * 0.005;
    let altitude = 1.2 + 0.5 * (tick as f64 * 0.001).sin();
    let position = DVec3::new(angle.cos(), 0.3 * angle.sin(), angle.sin()).normalize()
        * (def.radius * altitude);
    // Look at the formation center.
    CameraRay::new(position, -position)
}

fn main() -> Result<(), ConfigError> {
    let args = CliArgs::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?;
    config.apply_cli_overrides(&args);

    tellus_log::init_logging(None, cfg!(debug_assertions), Some(&config));

    let def = FormationDef::new(
        config.formation.name.clone(),
        config.formation.radius,
        config.formation.seed,
    );
    let field: Arc<dyn HeightField> = if config.formation.cratered {
        Arc::new(CrateredField::new(
            def.radius,
            def.seed,
            config.formation.crater_count,
        ))
    } else {
        Arc::new(FlatField::new(def.radius))
    };
    info!(
        name = %def.name,
        radius = def.radius,
        seed = def.seed,
        cratered = config.formation.cratered,
        "formation ready"
    );

    let mut poly = Polyhedron::new(
        def,
        field,
        config.lod.max_quaterna,
        config.lod.target_quaterna,
        tuning_from(&config),
    );

    // Physics stand-in: a reader thread probing the surface below the camera
    // while the tick loop mutates the tree.
    let reader = poly.reader();
    let radius = poly.def().radius;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_probe = Arc::clone(&stop);
    let probe_thread = std::thread::Builder::new()
        .name("physics-probe".into())
        .spawn(move || {
            let mut probes = 0u64;
            let mut hits = 0u64;
            while !stop_probe.load(Ordering::Relaxed) {
                let origin = DVec3::new(0.0, 0.0, radius * 2.0);
                if reader.probe(origin, -DVec3::Z).is_some() {
                    hits += 1;
                }
                probes += 1;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            (probes, hits)
        })
        .expect("failed to spawn the physics probe thread");

    let ticks = args.ticks.unwrap_or(400);
    let base_target = config.lod.target_quaterna;
    for tick in 0..ticks {
        // Stand-in for the external frame-time regulator: raise the budget
        // mid-run, pull it back for the final stretch.
        if tick == ticks / 3 {
            poly.set_target_quaterna(base_target.saturating_mul(2));
        } else if tick == ticks * 2 / 3 {
            poly.set_target_quaterna(base_target / 2);
        }

        let def_ray = orbit_ray(poly.def(), tick);
        let stats = poly.tick(def_ray);

        if tick % 50 == 0 {
            let buffer = poly.buffer();
            info!(
                tick,
                used_quaterna = buffer.used_quaterna_count(),
                used_nodes = buffer.used_node_count(),
                target = buffer.target_quaterna_count(),
                min_score = buffer.min_used_parent_score().unwrap_or(0.0),
                rescored = stats.rescored,
                expansions = stats.expansions,
                "tick"
            );
        }
    }

    stop.store(true, Ordering::Relaxed);
    let (probes, hits) = probe_thread.join().expect("physics probe thread panicked");
    info!(probes, hits, "physics probe thread finished");

    let mut mesh = TerrainMesh::new();
    extract_mesh_parallel(&poly.buffer().read(), &mut mesh, default_worker_count());
    info!(
        triangles = mesh.triangle_count(),
        bytes = mesh.as_bytes().len(),
        "extracted final mesh"
    );

    Ok(())
}
