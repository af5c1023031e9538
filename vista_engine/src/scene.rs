use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// A toggleable hotspot attached to a node. Restore flips `enabled` without
/// consulting the spot's own activation rules, matching save semantics.
#[derive(Debug, Clone)]
pub struct Spot {
    pub name: String,
    pub enabled: bool,
}

impl Spot {
    pub fn new(name: impl Into<String>) -> Self {
        Spot {
            name: name.into(),
            enabled: true,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

/// A panorama node holding an ordered list of spots.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub spots: Vec<Spot>,
}

impl Node {
    #[allow(dead_code)]
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            spots: Vec::new(),
        }
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }
}

/// Playback state codes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

impl AudioState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AudioState::Initial),
            1 => Some(AudioState::Playing),
            2 => Some(AudioState::Paused),
            3 => Some(AudioState::Stopped),
            _ => None,
        }
    }

    pub fn as_code(self) -> u8 {
        match self {
            AudioState::Initial => 0,
            AudioState::Playing => 1,
            AudioState::Paused => 2,
            AudioState::Stopped => 3,
        }
    }
}

/// An already-loaded audio handle owned by the room. The restorer only ever
/// drives the playback state; loading and mixing live elsewhere.
#[derive(Debug, Clone)]
pub struct AudioChannel {
    pub name: String,
    pub state: AudioState,
}

impl AudioChannel {
    pub fn new(name: impl Into<String>) -> Self {
        AudioChannel {
            name: name.into(),
            state: AudioState::Initial,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == AudioState::Playing
    }

    pub fn play(&mut self) {
        self.state = AudioState::Playing;
    }

    pub fn pause(&mut self) {
        self.state = AudioState::Paused;
    }

    pub fn stop(&mut self) {
        self.state = AudioState::Stopped;
    }
}

/// The live room a snapshot is applied to. Constructed by the scene loader
/// before restore begins; the restorer never adds or removes entries here.
#[derive(Debug, Clone)]
pub struct Room {
    pub name: String,
    pub nodes: Vec<Node>,
    pub audio: Vec<AudioChannel>,
}

impl Room {
    #[allow(dead_code)]
    pub fn new(name: impl Into<String>) -> Self {
        Room {
            name: name.into(),
            nodes: Vec::new(),
            audio: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn from_manifest_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading scene manifest {}", path.as_ref().display()))?;
        let manifest: RoomManifest = serde_json::from_str(&text)
            .with_context(|| format!("parsing scene manifest {}", path.as_ref().display()))?;
        Ok(Room::from_manifest(manifest))
    }

    pub fn from_manifest(manifest: RoomManifest) -> Self {
        let nodes = manifest
            .nodes
            .into_iter()
            .map(|node| Node {
                name: node.name,
                spots: node.spots.into_iter().map(Spot::new).collect(),
            })
            .collect();
        let audio = manifest.audio.into_iter().map(AudioChannel::new).collect();
        Room {
            name: manifest.name,
            nodes,
            audio,
        }
    }
}

/// JSON description of the live scene the host constructs before restoring.
/// Stands in for the scene-definition scripts a full engine would execute.
#[derive(Debug, Deserialize)]
pub struct RoomManifest {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeManifest>,
    #[serde(default)]
    pub audio: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeManifest {
    pub name: String,
    #[serde(default)]
    pub spots: Vec<String>,
}

/// Forward-only cursor over an owned ordered sequence. Reconciliation walks
/// live nodes and spots through this instead of a shared live iterator, so
/// the walk cannot alias scene mutation happening elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct SceneCursor {
    position: usize,
    len: usize,
}

impl SceneCursor {
    pub fn begin(len: usize) -> Self {
        SceneCursor { position: 0, len }
    }

    /// Index of the current element, or `None` once the cursor is exhausted.
    pub fn current(&self) -> Option<usize> {
        (self.position < self.len).then_some(self.position)
    }

    /// Steps forward; returns false once the cursor has moved past the end.
    pub fn advance(&mut self) -> bool {
        if self.position < self.len {
            self.position += 1;
        }
        self.position < self.len
    }
}

#[cfg(test)]
pub(crate) fn grid_room(nodes: usize, spots_per_node: usize, audio: usize) -> Room {
    let mut room = Room::new("test_room");
    for n in 0..nodes {
        let mut node = Node::new(format!("node{n}"));
        for s in 0..spots_per_node {
            node.spots.push(Spot::new(format!("spot{n}_{s}")));
        }
        room.nodes.push(node);
    }
    for a in 0..audio {
        room.audio.push(AudioChannel::new(format!("audio{a}")));
    }
    room
}
