use std::io::Write;

use anyhow::{Context, Result};
use vista_formats::{write_header, SaveHeader, SnapshotWriter, FORMAT_VERSION};

use crate::scene::Room;
use crate::state::{Camera, EngineConfig};

/// Saved form of a live timer. Callbacks travel as Lua source chunks; the
/// restorer loads whatever bytes are stored here without interpreting them.
#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    pub trigger: f64,
    pub time_left: f64,
    pub loopable: bool,
    pub callback: Vec<u8>,
}

/// Writes a complete snapshot of the given live state in the fixed section
/// order the restorer expects: header, script data, spot toggles, audio
/// toggles, timers, camera, control mode.
pub fn write_snapshot<W: Write>(
    out: W,
    preview: &str,
    statements: &[String],
    room: &Room,
    timers: &[TimerSnapshot],
    camera: &Camera,
    config: &EngineConfig,
) -> Result<()> {
    let mut writer = SnapshotWriter::new(out);

    let header = SaveHeader {
        version: FORMAT_VERSION.to_string(),
        preview: preview.to_string(),
        room: room.name.clone(),
    };
    write_header(&mut writer, &header).context("writing snapshot header")?;

    let statement_count =
        u32::try_from(statements.len()).context("too many script statements for snapshot")?;
    writer
        .write_u32(statement_count)
        .context("writing script statement count")?;
    for statement in statements {
        writer
            .write_string16(statement)
            .context("writing script statement")?;
    }

    let node_count = u16::try_from(room.nodes.len()).context("too many nodes for snapshot")?;
    writer.write_u16(node_count).context("writing node count")?;
    for node in &room.nodes {
        let spot_count = u16::try_from(node.spots.len())
            .with_context(|| format!("too many spots in node '{}'", node.name))?;
        writer.write_u16(spot_count).context("writing spot count")?;
        for spot in &node.spots {
            writer
                .write_u8(spot.enabled as u8)
                .context("writing spot flag")?;
        }
    }

    let audio_count = u16::try_from(room.audio.len()).context("too many audio channels")?;
    writer.write_u16(audio_count).context("writing audio count")?;
    for channel in &room.audio {
        writer
            .write_u8(channel.state.as_code())
            .context("writing audio state")?;
    }

    let timer_count = u16::try_from(timers.len()).context("too many timers for snapshot")?;
    writer.write_u16(timer_count).context("writing timer count")?;
    for timer in timers {
        writer
            .write_u8(timer.loopable as u8)
            .context("writing loopable flag")?;
        writer
            .write_string8(&timer.trigger.to_string())
            .context("writing trigger time")?;
        writer
            .write_string8(&timer.time_left.to_string())
            .context("writing time left")?;
        writer
            .write_blob16(&timer.callback)
            .context("writing timer callback")?;
    }

    writer
        .write_u16(camera.horizontal_angle)
        .context("writing horizontal camera angle")?;
    writer
        .write_u16(camera.vertical_angle)
        .context("writing vertical camera angle")?;

    writer
        .write_u8(config.control_mode.as_code())
        .context("writing control mode")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    use crate::restore::{RestoreContext, SnapshotRestorer};
    use crate::scene::{grid_room, AudioState};
    use crate::state::ControlMode;
    use crate::timers::TimerRegistry;

    #[test]
    fn captured_snapshot_restores_onto_identical_scene() {
        let mut source_room = grid_room(2, 2, 2);
        source_room.nodes[0].spots[1].disable();
        source_room.nodes[1].spots[0].disable();
        source_room.audio[0].play();
        source_room.audio[1].pause();
        let mut camera = Camera::default();
        camera.set_angle_horizontal(180);
        camera.set_angle_vertical(30);
        let config = EngineConfig {
            control_mode: ControlMode::Free,
        };
        let statements = vec!["journal = { entries = 7 }".to_string()];
        let timers = vec![TimerSnapshot {
            trigger: 12.0,
            time_left: 9.0,
            loopable: false,
            callback: b"journal.entries = journal.entries + 1".to_vec(),
        }];

        let mut bytes = Vec::new();
        write_snapshot(
            &mut bytes,
            "Atrium, day 3",
            &statements,
            &source_room,
            &timers,
            &camera,
            &config,
        )
        .unwrap();

        // A freshly constructed scene with the same structure.
        let lua = Lua::new();
        let mut live_room = grid_room(2, 2, 2);
        live_room.name = source_room.name.clone();
        let mut live_timers = TimerRegistry::new();
        let mut live_camera = Camera::default();
        let mut live_config = EngineConfig::default();

        let restorer = SnapshotRestorer::new(std::io::Cursor::new(bytes));
        let report = restorer
            .run(RestoreContext {
                lua: &lua,
                room: &mut live_room,
                timers: &mut live_timers,
                camera: &mut live_camera,
                config: &mut live_config,
            })
            .unwrap();

        assert_eq!(report.preview, "Atrium, day 3");
        assert_eq!(report.room, "test_room");
        assert!(report.warnings.is_empty());
        assert_eq!(report.statements_executed, 1);
        assert_eq!(report.statement_failures, 0);
        assert_eq!(report.timers_restored, 1);

        assert!(live_room.nodes[0].spots[0].enabled);
        assert!(!live_room.nodes[0].spots[1].enabled);
        assert!(!live_room.nodes[1].spots[0].enabled);
        assert_eq!(live_room.audio[0].state, AudioState::Playing);
        assert_eq!(live_room.audio[1].state, AudioState::Paused);
        assert_eq!(live_camera.horizontal_angle, 180);
        assert_eq!(live_camera.vertical_angle, 30);
        assert_eq!(live_config.control_mode, ControlMode::Free);

        let entries: i64 = lua
            .load("return journal.entries")
            .eval()
            .unwrap();
        assert_eq!(entries, 7);
        let elapsed = live_timers.now() - live_timers.timers()[0].last_time;
        assert!((elapsed - 3.0).abs() < 0.5);
    }

    #[test]
    fn captured_snapshot_survives_drift_onto_smaller_scene() {
        let source_room = grid_room(4, 3, 3);
        let mut bytes = Vec::new();
        write_snapshot(
            &mut bytes,
            "drifted",
            &[],
            &source_room,
            &[],
            &Camera::default(),
            &EngineConfig::default(),
        )
        .unwrap();

        let lua = Lua::new();
        let mut live_room = grid_room(2, 1, 1);
        let mut live_timers = TimerRegistry::new();
        let mut live_camera = Camera::default();
        let mut live_config = EngineConfig::default();

        let restorer = SnapshotRestorer::new(std::io::Cursor::new(bytes));
        let report = restorer
            .run(RestoreContext {
                lua: &lua,
                room: &mut live_room,
                timers: &mut live_timers,
                camera: &mut live_camera,
                config: &mut live_config,
            })
            .unwrap();

        // Every section after the drifted ones still decoded correctly.
        assert_eq!(report.timers_restored, 0);
        // Node, two spot, and audio count mismatches.
        assert_eq!(report.warnings.len(), 4);
    }
}
