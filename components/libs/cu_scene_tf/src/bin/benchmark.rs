use clap::Parser;
use cu_scene_tf::{CuDuration, SceneTfConfig, SceneTransforms, Transform, TransformTree};
use cu_tf_payloads::{Quaternion, Vector3};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Transform tree lookup benchmark", long_about = None)]
struct Args {
    /// Length of the frame chain
    #[arg(short = 'f', long, default_value_t = 100)]
    num_frames: usize,

    /// Samples recorded per frame
    #[arg(short, long, default_value_t = 100)]
    samples: u64,

    /// Number of lookups to time
    #[arg(short, long, default_value_t = 10_000)]
    lookups: usize,

    /// Per-frame history bound
    #[arg(short = 'c', long, default_value_t = 10_000)]
    max_capacity: usize,

    #[arg(short, long)]
    verbose: bool,
}

const STEP_NANOS: u64 = 1_000_000;

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Could not set up logging: {e}");
    }

    let num_frames = args.num_frames.max(1);
    let samples = args.samples.max(1);
    let leaf = format!("frame{num_frames}");

    // base -> frame1 -> frame2 -> ... -> frameN, each one meter further along x
    info!("Setting up {num_frames} frames in a chain with {samples} samples each");
    let mut tree = TransformTree::with_capacity(args.max_capacity);
    let start = Instant::now();
    for i in 0..num_frames {
        let parent = if i == 0 {
            "base".to_string()
        } else {
            format!("frame{i}")
        };
        let child = format!("frame{}", i + 1);
        for s in 0..samples {
            let wobble = (s as f64 * 0.01).sin() * 0.1;
            let transform = Transform::from_arrays([1.0, wobble, 0.0], [0.0, 0.0, 0.0, 1.0]);
            tree.add_transform(&child, &parent, CuDuration(s * STEP_NANOS), transform);
        }
    }
    let inserts = num_frames as u64 * samples;
    let elapsed = start.elapsed();
    info!(
        "Inserted {inserts} samples in {elapsed:?} ({:.2} ns/insert)",
        elapsed.as_nanos() as f64 / inserts as f64
    );

    let span = samples * STEP_NANOS;
    let start = Instant::now();
    let mut failures = 0usize;
    for i in 0..args.lookups {
        // off-sample times so every lookup interpolates
        let time = CuDuration((i as u64 * 7_919_993 + STEP_NANOS / 2) % span);
        if tree.apply(&leaf, "base", time).is_err() {
            failures += 1;
        }
    }
    let elapsed = start.elapsed();
    info!(
        "{} lookups across {num_frames} frames in {elapsed:?} ({:.2} ns/lookup, {failures} failed)",
        args.lookups,
        elapsed.as_nanos() as f64 / args.lookups.max(1) as f64
    );

    match tree.apply(&leaf, "base", CuDuration(0)) {
        Ok(tf) => info!("{leaf} in base at t=0: {:?}", tf.translation()),
        Err(e) => info!("Lookup failed: {e}"),
    }

    // same load through the host facade, ingesting wire shaped samples
    let config = SceneTfConfig {
        max_capacity: args.max_capacity,
        ..Default::default()
    };
    let mut scene = SceneTransforms::new(config);
    let start = Instant::now();
    for i in 0..num_frames {
        let parent = if i == 0 {
            "base".to_string()
        } else {
            format!("frame{i}")
        };
        let child = format!("frame{}", i + 1);
        for s in 0..samples {
            scene.add_transform(
                &parent,
                &child,
                CuDuration(s * STEP_NANOS),
                Vector3::new(1.0, 0.0, 0.0),
                Quaternion::identity(),
                None,
            );
        }
    }
    scene.set_current_time(CuDuration(span));
    let render = scene.update_frames().map(str::to_string);
    info!(
        "Facade ingestion took {:?}, render frame {:?}, fixed frame {:?}",
        start.elapsed(),
        render,
        scene.fixed_frame_id()
    );
}
