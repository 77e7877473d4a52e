//! Example: the full pipeline from synthetic scenes to exported labels.
//!
//! This example demonstrates the complete training-and-evaluation workflow:
//! 1. Synthesize labeled indoor-style scenes and store them
//! 2. Precompute a write-once training chunk cache
//! 3. Replay the cache through a prefetched endless stream
//! 4. Sample evaluation chunks write-through and fake model predictions
//! 5. Aggregate predictions back into whole scenes and export them
//!
//! # Usage
//!
//! ```bash
//! cargo run -p chunk_demos --bin end_to_end [output_dir]
//! ```
//!
//! Output files are saved to `demos/output/` unless overridden. The
//! directory is cleared first, since caches and exports are write-once.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use chunk_core::{LabelRemap, Point3, Scene, CLASS_NAMES};
use chunk_io::{ChunkCache, SceneStore, SplitManifest};
use chunk_pipeline::{
    aggregate::{ChunkPrediction, PredictionAggregator},
    config::{AggregatorConfig, PrecomputeConfig, SamplerConfig, StreamConfig},
    export::export_predictions,
    precompute::precompute_train,
    sampler::ChunkSampler,
    stream::{CyclicStream, EvalStream, Prefetcher},
};

/// Default output directory for generated files.
const OUTPUT_DIR: &str = "demos/output";

/// Builds a wavy labeled room: floor, walls near the border, furniture
/// blobs in between.
fn synthesize_scene(name: &str, nx: usize, ny: usize, seed: u64) -> Scene {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut points = Vec::new();
    let mut colors = Vec::new();
    let mut normals = Vec::new();
    let mut labels = Vec::new();

    for y in 0..ny {
        for x in 0..nx {
            let fx = x as f32 * 0.08 + rng.gen_range(-0.01..0.01);
            let fy = y as f32 * 0.08 + rng.gen_range(-0.01..0.01);
            let fz = 0.05 * (fx * 3.0).sin() * (fy * 2.0).cos() + rng.gen_range(0.0..0.02);
            points.push(Point3::new(fx, fy, fz));
            normals.push(Point3::new(0.0, 0.0, 1.0));

            let border = x < 2 || y < 2 || x >= nx - 2 || y >= ny - 2;
            let label = if border {
                1 // wall
            } else if (x / 6 + y / 6) % 3 == 0 {
                3 // chair
            } else {
                2 // floor
            };
            labels.push(label);
            let shade = (label * 60) as u8;
            colors.push([shade, 255 - shade, 128]);
        }
    }

    Scene::with_labels(name, points, colors, normals, labels)
}

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let output_dir = if args.len() >= 2 {
        args[1].clone()
    } else {
        OUTPUT_DIR.to_string()
    };

    // Caches and exports are write-once, so start from a clean directory.
    fs::remove_dir_all(&output_dir).ok();
    if let Err(e) = fs::create_dir_all(&output_dir) {
        eprintln!("Error creating output directory: {}", e);
        std::process::exit(1);
    }

    println!("═══════════════════════════════════════════════════════════════");
    println!("          Point Cloud Chunk Pipeline End-to-End");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    // =========================================================================
    // Step 1: Synthesize scenes and fill the store
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 1: Synthesizing Scenes                                 │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let store = match SceneStore::create(format!("{}/scenes", output_dir)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error creating scene store: {}", e);
            std::process::exit(1);
        }
    };

    let layouts = [
        ("office_00", 80, 60, 1u64),
        ("office_01", 70, 70, 2),
        ("lounge_00", 60, 50, 3),
    ];
    for (name, nx, ny, seed) in layouts {
        let scene = synthesize_scene(name, nx, ny, seed);
        println!("  {:<12} {} points", name, scene.len());
        if let Err(e) = store.save(&scene) {
            eprintln!("Error saving scene {}: {}", name, e);
            std::process::exit(1);
        }
    }

    let manifest = SplitManifest {
        train: vec!["office_00".to_string(), "office_01".to_string()],
        val: vec!["lounge_00".to_string()],
        test: vec![],
    };
    if let Err(e) = store.save_manifest(&manifest) {
        eprintln!("Error saving manifest: {}", e);
        std::process::exit(1);
    }
    println!("  Splits:      {} train / {} val", manifest.train.len(), manifest.val.len());
    println!();

    // =========================================================================
    // Step 2: Precompute the training cache
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 2: Precomputing Training Chunks                        │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let sampler = match ChunkSampler::new(SamplerConfig::new().with_chunk_size(1024)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error building sampler: {}", e);
            std::process::exit(1);
        }
    };
    let train_cache = match ChunkCache::create(format!("{}/cache/train", output_dir)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating train cache: {}", e);
            std::process::exit(1);
        }
    };

    let config = PrecomputeConfig::new(2, 64).with_base_seed(42);
    let start = Instant::now();
    let written = match precompute_train(&store, &manifest.train, &sampler, &train_cache, &config)
    {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error precomputing train cache: {}", e);
            std::process::exit(1);
        }
    };
    let precompute_time = start.elapsed();

    println!("  Chunks:          {}", written);
    println!("  Chunk size:      {} points", sampler.config().chunk_size);
    println!("  Precompute time: {:.3}s", precompute_time.as_secs_f64());
    println!(
        "  Throughput:      {:.1} chunks/sec",
        written as f64 / precompute_time.as_secs_f64()
    );
    println!();

    // =========================================================================
    // Step 3: Replay the cache like a training loop
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 3: Cyclic Replay Through Prefetcher                    │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let stream = match CyclicStream::open(train_cache) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening cyclic stream: {}", e);
            std::process::exit(1);
        }
    };
    let cycle = stream.cycle_len();
    let depth = StreamConfig::default().prefetch_depth;
    let prefetcher = match Prefetcher::spawn(stream, depth) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error spawning prefetcher: {}", e);
            std::process::exit(1);
        }
    };

    let steps = cycle * 2 + cycle / 2;
    let start = Instant::now();
    let mut weight_sum = 0.0f64;
    for chunk in prefetcher.take(steps) {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error streaming chunk: {}", e);
                std::process::exit(1);
            }
        };
        // A real consumer would run forward/backward here.
        weight_sum += chunk.sample_weight.iter().map(|&w| w as f64).sum::<f64>();
    }
    let replay_time = start.elapsed();

    println!("  Cycle length:    {} chunks", cycle);
    println!("  Steps consumed:  {} (2.5 cycles)", steps);
    println!("  Valid weight:    {:.0}", weight_sum);
    println!("  Replay time:     {:.3}s", replay_time.as_secs_f64());
    println!();

    // =========================================================================
    // Step 4: Evaluate the val split write-through
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 4: Write-Through Evaluation Chunks                     │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let eval_cache = match ChunkCache::create(format!("{}/cache/val", output_dir)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating eval cache: {}", e);
            std::process::exit(1);
        }
    };
    let eval_stream = match EvalStream::open(
        store.clone(),
        sampler.clone(),
        eval_cache.clone(),
        manifest.val.clone(),
        7,
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening eval stream: {}", e);
            std::process::exit(1);
        }
    };

    // Stand in for the model: predict each chunk's own labels.
    let predictions = eval_stream.map(|sc| {
        let sc = sc?;
        let predicted = sc.chunk.labels.clone().unwrap_or_default();
        ChunkPrediction::from_provenance(&sc.provenance, predicted)
    });

    // =========================================================================
    // Step 5: Aggregate and export
    // =========================================================================
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│ Step 5: Aggregating and Exporting Predictions               │");
    println!("└─────────────────────────────────────────────────────────────┘");

    let agg_config = AggregatorConfig::new().with_remap(LabelRemap::nyu40());
    let mut aggregator = PredictionAggregator::new(agg_config);
    let export_dir = format!("{}/predictions", output_dir);

    let start = Instant::now();
    let exported = match export_predictions(predictions, &mut aggregator, Path::new(&export_dir)) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error exporting predictions: {}", e);
            std::process::exit(1);
        }
    };
    let eval_time = start.elapsed();

    let cached = match eval_cache.keys() {
        Ok(keys) => keys.len(),
        Err(e) => {
            eprintln!("Error listing eval cache: {}", e);
            std::process::exit(1);
        }
    };

    println!("  Scenes exported: {}", exported);
    println!("  Chunks cached:   {}", cached);
    println!("  Eval time:       {:.3}s", eval_time.as_secs_f64());
    println!();

    // Per-class breakdown of the first exported scene.
    let first = &manifest.val[0];
    let path = format!("{}/{}.txt", export_dir, first);
    if let Ok(text) = fs::read_to_string(&path) {
        let mut counts = [0usize; 41];
        for line in text.lines() {
            if let Ok(id) = line.parse::<usize>() {
                if id < counts.len() {
                    counts[id] += 1;
                }
            }
        }
        println!("  Label breakdown for {}:", first);
        let remap = LabelRemap::nyu40();
        for (class, name) in CLASS_NAMES.iter().enumerate().skip(1) {
            let benchmark_id = remap.apply(class as i32) as usize;
            if counts[benchmark_id] > 0 {
                println!(
                    "    {:<16} id {:<3} {:>6} points",
                    name, benchmark_id, counts[benchmark_id]
                );
            }
        }
        println!();
    }

    // =========================================================================
    // Summary
    // =========================================================================
    println!("═══════════════════════════════════════════════════════════════");
    println!("                        SUMMARY");
    println!("═══════════════════════════════════════════════════════════════");
    let total_time = precompute_time + replay_time + eval_time;
    println!("  Total time:      {:.3}s", total_time.as_secs_f64());
    println!();
    println!("  Breakdown:");
    println!(
        "    Precompute:    {:.3}s ({:.1}%)",
        precompute_time.as_secs_f64(),
        (precompute_time.as_secs_f64() / total_time.as_secs_f64()) * 100.0
    );
    println!(
        "    Replay:        {:.3}s ({:.1}%)",
        replay_time.as_secs_f64(),
        (replay_time.as_secs_f64() / total_time.as_secs_f64()) * 100.0
    );
    println!(
        "    Eval + export: {:.3}s ({:.1}%)",
        eval_time.as_secs_f64(),
        (eval_time.as_secs_f64() / total_time.as_secs_f64()) * 100.0
    );
    println!();
    println!("  Output:          {}/", output_dir);
    println!("═══════════════════════════════════════════════════════════════");
}
