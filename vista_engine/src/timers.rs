use std::time::Instant;

use mlua::RegistryKey;

/// A scheduled callback owned by the host's update loop. `last_time` is the
/// registry-clock instant the timer last fired (or was created); the update
/// loop fires it again once `now() - last_time >= trigger`.
#[derive(Debug)]
pub struct Timer {
    pub trigger: f64,
    pub loopable: bool,
    pub callback: RegistryKey,
    pub last_time: f64,
}

/// Flat collection of live timers with its own monotonic clock. Restore
/// pushes entries here and rewinds `last_time` so elapsed progress recorded
/// in a snapshot survives into the new session.
#[derive(Debug)]
pub struct TimerRegistry {
    epoch: Instant,
    timers: Vec<Timer>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        TimerRegistry {
            epoch: Instant::now(),
            timers: Vec::new(),
        }
    }

    /// Seconds since the registry was created.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Registers a timer that starts counting from this instant and returns
    /// it for post-registration adjustment.
    pub fn create(&mut self, trigger: f64, loopable: bool, callback: RegistryKey) -> &mut Timer {
        let last_time = self.now();
        self.timers.push(Timer {
            trigger,
            loopable,
            callback,
            last_time,
        });
        self.timers.last_mut().unwrap()
    }

    #[allow(dead_code)]
    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        TimerRegistry::new()
    }
}
