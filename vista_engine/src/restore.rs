use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use mlua::Lua;
use serde::Serialize;
use vista_formats::{read_header, SaveHeader, SnapshotReader};

use crate::scene::{AudioState, Node, Room, SceneCursor};
use crate::state::{Camera, ControlMode, EngineConfig};
use crate::timers::TimerRegistry;

/// Live collaborators a restore mutates. All of them are owned by the host
/// and constructed before restore begins; threading them through explicitly
/// keeps the restorer free of ambient globals.
pub struct RestoreContext<'a> {
    pub lua: &'a Lua,
    pub room: &'a mut Room,
    pub timers: &'a mut TimerRegistry,
    pub camera: &'a mut Camera,
    pub config: &'a mut EngineConfig,
}

/// Summary of a completed restore, including every recoverable condition the
/// reconciler logged along the way.
#[derive(Debug, Serialize)]
pub struct RestoreReport {
    pub version: String,
    pub preview: String,
    pub room: String,
    pub statements_executed: u32,
    pub statement_failures: u32,
    pub timers_restored: usize,
    pub timers_skipped: usize,
    pub warnings: Vec<String>,
}

/// Applies a snapshot stream onto a freshly constructed live scene.
///
/// The stream is positional: sections must be read in the order they were
/// written, and the saved counts always govern how many bytes each section
/// consumes. Live counts only govern how many of those records are applied;
/// the surplus is drained so the stream stays aligned through structural
/// drift. Running out of bytes is the one fatal condition.
pub struct SnapshotRestorer<R> {
    reader: SnapshotReader<R>,
    header: Option<SaveHeader>,
    events: Vec<String>,
    statements_executed: u32,
    statement_failures: u32,
    timers_restored: usize,
    timers_skipped: usize,
}

/// Opens a snapshot file and drives the full restore sequence against the
/// given collaborators. The file handle is dropped on every exit path,
/// success or failure.
pub fn restore_scene<P: AsRef<Path>>(path: P, ctx: RestoreContext<'_>) -> Result<RestoreReport> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("opening snapshot {}", path.as_ref().display()))?;
    let restorer = SnapshotRestorer::new(BufReader::new(file));
    restorer.run(ctx)
}

impl<R: Read> SnapshotRestorer<R> {
    pub fn new(source: R) -> Self {
        SnapshotRestorer {
            reader: SnapshotReader::new(source),
            header: None,
            events: Vec::new(),
            statements_executed: 0,
            statement_failures: 0,
            timers_restored: 0,
            timers_skipped: 0,
        }
    }

    /// Runs every section in stream order and consumes the restorer.
    pub fn run(mut self, ctx: RestoreContext<'_>) -> Result<RestoreReport> {
        self.read_header()?;
        self.read_script_data(ctx.lua)?;
        self.toggle_spots(ctx.room)?;
        self.toggle_audio(ctx.room)?;
        self.read_timers(ctx.lua, ctx.timers)?;
        self.adjust_camera(ctx.camera)?;
        self.read_control_mode(ctx.config)?;
        Ok(self.into_report())
    }

    pub fn read_header(&mut self) -> Result<&SaveHeader> {
        let header = read_header(&mut self.reader).context("reading snapshot header")?;
        Ok(self.header.insert(header))
    }

    /// Replays the saved script statements against the live Lua environment.
    /// A statement may fail when it targets a table the current scene no
    /// longer defines; that is drift, not corruption, so the replay logs the
    /// failure and keeps going.
    pub fn read_script_data(&mut self, lua: &Lua) -> Result<()> {
        let count = self
            .reader
            .read_u32()
            .context("reading script statement count")?;
        for index in 0..count {
            let statement = self
                .reader
                .read_string16()
                .with_context(|| format!("reading script statement {index}"))?;
            if let Err(err) = lua.load(&statement).set_name("snapshot statement").exec() {
                self.log_event(format!("script statement {index} failed: {err}"));
                self.statement_failures += 1;
            }
        }
        self.statements_executed = count;
        Ok(())
    }

    /// Reapplies saved spot activation flags to the live room, node by node.
    /// The Nth saved node record maps onto the Nth live node; whichever side
    /// has fewer entries decides how much is applied, and the saved surplus
    /// is drained byte-for-byte.
    pub fn toggle_spots(&mut self, room: &mut Room) -> Result<()> {
        let saved_nodes = self.reader.read_u16().context("reading saved node count")? as usize;
        let live_nodes = room.node_count();
        if saved_nodes != live_nodes {
            self.log_event(format!(
                "node count mismatch in room '{}': snapshot has {saved_nodes}, live room has {live_nodes}",
                room.name
            ));
        }

        let mut cursor = SceneCursor::begin(saved_nodes.min(live_nodes));
        while let Some(node_index) = cursor.current() {
            let node = room
                .node_mut(node_index)
                .context("live node disappeared mid-walk")?;
            let saved_spots = self
                .reader
                .read_u16()
                .with_context(|| format!("reading spot count for node {node_index}"))?
                as usize;
            let live_spots = node.spot_count();
            if saved_spots != live_spots {
                self.log_event(format!(
                    "spot count mismatch in node '{}': snapshot has {saved_spots}, live node has {live_spots}",
                    node.name
                ));
            }

            let mut spots = SceneCursor::begin(saved_spots.min(live_spots));
            while let Some(spot_index) = spots.current() {
                let flag = self
                    .reader
                    .read_u8()
                    .with_context(|| format!("reading spot flag {spot_index} of node {node_index}"))?;
                let spot = &mut node.spots[spot_index];
                if flag != 0 {
                    spot.enable();
                } else {
                    spot.disable();
                }
                spots.advance();
            }
            // Saved spots past the live node's end carry no counterpart.
            self.reader
                .skip(saved_spots.saturating_sub(live_spots) as u64)
                .context("draining surplus spot records")?;
            cursor.advance();
        }

        // Entire saved nodes past the live room's end.
        for _ in live_nodes..saved_nodes {
            let saved_spots = self
                .reader
                .read_u16()
                .context("reading spot count of surplus node record")? as u64;
            self.reader
                .skip(saved_spots)
                .context("draining surplus node record")?;
        }
        Ok(())
    }

    /// Reapplies saved playback states to the room's audio handles in list
    /// order, draining any saved surplus.
    pub fn toggle_audio(&mut self, room: &mut Room) -> Result<()> {
        let saved_count = self
            .reader
            .read_u16()
            .context("reading saved audio count")? as usize;
        let live_count = room.audio.len();
        if saved_count != live_count {
            self.log_event(format!(
                "audio count mismatch in room '{}': snapshot has {saved_count}, live room has {live_count}",
                room.name
            ));
        }

        for index in 0..saved_count.min(live_count) {
            let code = self
                .reader
                .read_u8()
                .with_context(|| format!("reading audio state {index}"))?;
            let channel = &mut room.audio[index];
            match AudioState::from_code(code) {
                Some(AudioState::Initial) => {}
                Some(AudioState::Playing) => {
                    if !channel.is_playing() {
                        channel.play();
                    }
                }
                Some(AudioState::Paused) => channel.pause(),
                Some(AudioState::Stopped) => channel.stop(),
                None => {
                    self.log_event(format!(
                        "unknown audio state code {code} for channel '{}'",
                        channel.name
                    ));
                }
            }
        }
        self.reader
            .skip(saved_count.saturating_sub(live_count) as u64)
            .context("draining surplus audio records")?;
        Ok(())
    }

    /// Rebuilds saved timers in the live registry. A timer whose time fields
    /// fail to parse is skipped with its remaining bytes drained, so one
    /// malformed entry never desynchronizes the entries after it.
    pub fn read_timers(&mut self, lua: &Lua, registry: &mut TimerRegistry) -> Result<()> {
        let count = self.reader.read_u16().context("reading timer count")?;
        for index in 0..count {
            let loopable = self
                .reader
                .read_u8()
                .with_context(|| format!("reading loopable flag of timer {index}"))?
                != 0;

            let trigger_text = self
                .reader
                .read_string8()
                .with_context(|| format!("reading trigger time of timer {index}"))?;
            let trigger: f64 = match trigger_text.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    self.log_event(format!(
                        "malformed timer {index}: could not parse trigger time '{trigger_text}'"
                    ));
                    self.timers_skipped += 1;
                    let remaining = self.reader.read_u8()? as u64;
                    self.reader.skip(remaining)?;
                    let callback = self.reader.read_u16()? as u64;
                    self.reader.skip(callback)?;
                    continue;
                }
            };

            let time_left_text = self
                .reader
                .read_string8()
                .with_context(|| format!("reading time left of timer {index}"))?;
            let time_left: f64 = match time_left_text.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    self.log_event(format!(
                        "malformed timer {index}: could not parse time left '{time_left_text}'"
                    ));
                    self.timers_skipped += 1;
                    let callback = self.reader.read_u16()? as u64;
                    self.reader.skip(callback)?;
                    continue;
                }
            };

            // The chunk bytes come off the stream before loading, so a load
            // failure still leaves the stream at a section boundary.
            let chunk = self
                .reader
                .read_blob16()
                .with_context(|| format!("reading callback of timer {index}"))?;
            let function = match lua.load(&chunk).set_name("timer callback").into_function() {
                Ok(function) => function,
                Err(err) => {
                    self.log_event(format!("timer {index} callback failed to load: {err}"));
                    self.timers_skipped += 1;
                    continue;
                }
            };
            let callback = lua
                .create_registry_value(function)
                .context("retaining timer callback")?;

            let duration = trigger - time_left;
            let timer = registry.create(trigger, loopable, callback);
            // The saved timer had already run for `duration` seconds.
            timer.last_time -= duration;
            self.timers_restored += 1;
        }
        Ok(())
    }

    pub fn adjust_camera(&mut self, camera: &mut Camera) -> Result<()> {
        let horizontal = self
            .reader
            .read_u16()
            .context("reading horizontal camera angle")?;
        camera.set_angle_horizontal(horizontal);
        let vertical = self
            .reader
            .read_u16()
            .context("reading vertical camera angle")?;
        camera.set_angle_vertical(vertical);
        Ok(())
    }

    pub fn read_control_mode(&mut self, config: &mut EngineConfig) -> Result<()> {
        let code = self.reader.read_u8().context("reading control mode")?;
        match ControlMode::from_code(code) {
            Some(mode) => config.control_mode = mode,
            None => self.log_event(format!("unknown control mode code {code}")),
        }
        Ok(())
    }

    /// Resolves a saved node index against the live room by cursor walk.
    #[allow(dead_code)]
    pub fn read_node<'r>(&mut self, room: &'r Room) -> Result<Option<&'r Node>> {
        let index = self.reader.read_u16().context("reading node index")? as usize;
        if !room.has_nodes() {
            return Ok(None);
        }
        let mut cursor = SceneCursor::begin(room.node_count());
        for _ in 0..index {
            if !cursor.advance() {
                break;
            }
        }
        Ok(cursor.current().and_then(|position| room.node(position)))
    }

    #[allow(dead_code)]
    pub fn header(&self) -> Option<&SaveHeader> {
        self.header.as_ref()
    }

    #[allow(dead_code)]
    pub fn events(&self) -> &[String] {
        &self.events
    }

    fn log_event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    fn into_report(self) -> RestoreReport {
        let header = self.header.unwrap_or(SaveHeader {
            version: String::new(),
            preview: String::new(),
            room: String::new(),
        });
        RestoreReport {
            version: header.version,
            preview: header.preview,
            room: header.room,
            statements_executed: self.statements_executed,
            statement_failures: self.statement_failures,
            timers_restored: self.timers_restored,
            timers_skipped: self.timers_skipped,
            warnings: self.events,
        }
    }
}
