use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mlua::Lua;

mod capture;
mod restore;
mod scene;
mod state;
mod timers;

use capture::TimerSnapshot;
use restore::{restore_scene, RestoreContext};
use scene::Room;
use state::{Camera, EngineConfig};
use timers::TimerRegistry;

/// Host harness that rebuilds a live scene from a manifest and replays a
/// snapshot onto it.
#[derive(Parser, Debug)]
#[command(
    about = "Applies a save-state snapshot onto a freshly constructed scene",
    version
)]
struct Args {
    /// Path to the JSON scene manifest describing the live room
    #[arg(long, default_value = "demos/atrium.json")]
    scene: PathBuf,

    /// Path to the snapshot file to restore (or peek at)
    #[arg(long)]
    snapshot: PathBuf,

    /// Read only the snapshot header and print its preview text
    #[arg(long)]
    peek: bool,

    /// Write a demo snapshot captured from the freshly loaded scene, then exit
    #[arg(long)]
    capture_demo: bool,

    /// Path to write the restore report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Print restored camera and control state after the summary
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.peek {
        let preview = vista_formats::peek_preview(&args.snapshot)
            .with_context(|| format!("peeking snapshot {}", args.snapshot.display()))?;
        println!("Preview: {preview}");
        return Ok(());
    }

    let mut room = Room::from_manifest_file(&args.scene)?;

    if args.capture_demo {
        return capture_demo_snapshot(&args, &room);
    }

    let lua = Lua::new();
    let mut timers = TimerRegistry::new();
    let mut camera = Camera::default();
    let mut config = EngineConfig::default();

    let report = restore_scene(
        &args.snapshot,
        RestoreContext {
            lua: &lua,
            room: &mut room,
            timers: &mut timers,
            camera: &mut camera,
            config: &mut config,
        },
    )
    .with_context(|| format!("restoring snapshot {}", args.snapshot.display()))?;

    for warning in &report.warnings {
        eprintln!("[vista_engine] warning: {warning}");
    }

    println!(
        "Restored room '{}' from snapshot version {} ({})",
        report.room, report.version, report.preview
    );
    println!(
        "Script statements: {} executed, {} failed",
        report.statements_executed, report.statement_failures
    );
    println!(
        "Timers: {} restored, {} skipped",
        report.timers_restored, report.timers_skipped
    );

    if args.verbose {
        println!(
            "Camera: {}h / {}v | control mode: {:?}",
            camera.horizontal_angle, camera.vertical_angle, config.control_mode
        );
        for node in &room.nodes {
            let enabled = node.spots.iter().filter(|spot| spot.enabled).count();
            println!(
                "  node '{}': {}/{} spots enabled",
                node.name,
                enabled,
                node.spot_count()
            );
        }
    }

    if let Some(path) = args.report_json.as_ref() {
        let json =
            serde_json::to_string_pretty(&report).context("serializing restore report to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing restore report to {}", path.display()))?;
        println!("Saved restore report to {}", path.display());
    }

    Ok(())
}

/// Writes a small, well-formed snapshot of the just-loaded scene so the
/// restore path can be exercised without a real play session.
fn capture_demo_snapshot(args: &Args, room: &Room) -> Result<()> {
    let statements = vec![
        "journal = journal or {}".to_string(),
        "journal.visits = 3".to_string(),
    ];
    let timers = vec![TimerSnapshot {
        trigger: 10.0,
        time_left: 4.0,
        loopable: false,
        callback: b"journal.visits = journal.visits + 1".to_vec(),
    }];
    let camera = Camera::default();
    let config = EngineConfig::default();

    let file = fs::File::create(&args.snapshot)
        .with_context(|| format!("creating snapshot {}", args.snapshot.display()))?;
    capture::write_snapshot(
        file,
        &format!("Demo save in '{}'", room.name),
        &statements,
        room,
        &timers,
        &camera,
        &config,
    )
    .with_context(|| format!("capturing demo snapshot to {}", args.snapshot.display()))?;
    println!("Captured demo snapshot to {}", args.snapshot.display());
    Ok(())
}
