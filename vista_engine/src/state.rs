use serde::Serialize;

/// Input handling modes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlMode {
    Drag,
    Fixed,
    Free,
}

impl ControlMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ControlMode::Drag),
            1 => Some(ControlMode::Fixed),
            2 => Some(ControlMode::Free),
            _ => None,
        }
    }

    pub fn as_code(self) -> u8 {
        match self {
            ControlMode::Drag => 0,
            ControlMode::Fixed => 1,
            ControlMode::Free => 2,
        }
    }
}

/// Host configuration the restorer is allowed to touch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineConfig {
    pub control_mode: ControlMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            control_mode: ControlMode::Fixed,
        }
    }
}

/// Panorama camera orientation, whole degrees on both axes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Camera {
    pub horizontal_angle: u16,
    pub vertical_angle: u16,
}

impl Camera {
    pub fn set_angle_horizontal(&mut self, degrees: u16) {
        self.horizontal_angle = degrees;
    }

    pub fn set_angle_vertical(&mut self, degrees: u16) {
        self.vertical_angle = degrees;
    }
}
