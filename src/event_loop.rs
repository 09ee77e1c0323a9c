use log::{info, trace, warn};
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::config::{AppConfig, LineBinding, LineId};
use crate::error::AppError;
use crate::gpio::{EdgeReading, GpioBackend, LineManager};
use crate::signal::Shutdown;
use crate::time::Timespec;

/// Last value seen on a switch line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedState {
    Unknown,
    /// The line read `'0'`.
    Pressed,
    Released,
}

impl ObservedState {
    pub fn from_value(byte: u8) -> Self {
        if byte == b'0' {
            ObservedState::Pressed
        } else {
            ObservedState::Released
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub timeouts: u64,
    pub edges: u64,
    pub transitions: u64,
    pub elapsed: Timespec,
}

struct Watch {
    binding: LineBinding,
    state: ObservedState,
    pressed_at: Option<Timespec>,
}

/// Polls every switch line and mirrors its transitions onto the paired
/// indicator. Repeated reads of an unchanged value cause no output write.
pub struct EdgeLoop {
    watches: Vec<Watch>,
    by_switch: FxHashMap<LineId, usize>,
    timeout_ms: i32,
    shutdown: Shutdown,
}

impl EdgeLoop {
    pub fn new(config: &AppConfig, shutdown: Shutdown) -> Self {
        let watches: Vec<Watch> = config
            .bindings
            .iter()
            .map(|binding| Watch {
                binding: binding.clone(),
                state: ObservedState::Unknown,
                pressed_at: None,
            })
            .collect();
        let by_switch = watches
            .iter()
            .enumerate()
            .map(|(i, w)| (w.binding.switch, i))
            .collect();

        let timeout = Timespec::from(Duration::from_millis(config.poll_timeout_ms));

        Self {
            watches,
            by_switch,
            timeout_ms: timeout.to_millis().clamp(1, i64::from(i32::MAX)) as i32,
            shutdown,
        }
    }

    pub fn timeout_ms(&self) -> i32 {
        self.timeout_ms
    }

    pub fn state(&self, switch: LineId) -> Option<ObservedState> {
        self.by_switch.get(&switch).map(|&i| self.watches[i].state)
    }

    /// Runs until shutdown is requested. The request is checked before every
    /// wait, so it takes effect within one timeout. A failed wait ends the loop.
    pub fn run<B: GpioBackend>(&mut self, lines: &mut LineManager<B>) -> Result<LoopStats, AppError> {
        let started = Timespec::now().ok();
        let mut stats = LoopStats::default();

        info!(
            "watching {} switch lines, poll timeout {} ms",
            self.watches.len(),
            self.timeout_ms
        );

        while !self.shutdown.is_requested() {
            stats.iterations += 1;

            let readings = lines.wait_inputs(self.timeout_ms)?;
            if readings.is_empty() {
                stats.timeouts += 1;
                trace!(".");
                continue;
            }

            for reading in readings {
                stats.edges += 1;
                if self.handle_reading(lines, reading) {
                    stats.transitions += 1;
                }
            }
        }

        stats.elapsed = started.and_then(elapsed_since).unwrap_or_default();
        info!(
            "edge loop stopped after {} ms: {} edges, {} transitions",
            stats.elapsed.to_millis(),
            stats.edges,
            stats.transitions
        );
        Ok(stats)
    }

    /// Applies one reading. Returns `true` when it changed the observed state
    /// and an indicator write was issued.
    pub fn handle_reading<B: GpioBackend>(
        &mut self,
        lines: &LineManager<B>,
        reading: EdgeReading,
    ) -> bool {
        let Some(&i) = self.by_switch.get(&reading.line) else {
            warn!("edge on unbound line {}", reading.line);
            return false;
        };
        let watch = &mut self.watches[i];

        let next = ObservedState::from_value(reading.value);
        if next == watch.state {
            trace!("line {} unchanged ({next:?})", reading.line);
            return false;
        }
        watch.state = next;

        let name = &watch.binding.name;
        match next {
            ObservedState::Pressed => {
                info!("{name}: the button is pressed");
                watch.pressed_at = Timespec::now().ok();
            }
            _ => match watch.pressed_at.take().and_then(elapsed_since) {
                Some(held) => info!(
                    "{name}: the button is not pressed (held {} ms)",
                    held.to_millis()
                ),
                None => info!("{name}: the button is not pressed"),
            },
        }

        // Active-low switch: pressed drives the indicator to 0.
        let level = next != ObservedState::Pressed;
        if let Err(e) = lines.set_output(watch.binding.indicator, level) {
            warn!(
                "{name}: write of {} to line {} failed: {e}",
                u8::from(level),
                watch.binding.indicator
            );
        }
        true
    }
}

fn elapsed_since(start: Timespec) -> Option<Timespec> {
    let now = Timespec::now().ok()?;
    let (elapsed, negative) = now.subtract(&start);
    (!negative).then_some(elapsed)
}
