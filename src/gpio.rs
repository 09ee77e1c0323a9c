use std::fmt;

use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;

use crate::config::{AppConfig, Direction, EdgeDetect, LineId};
use crate::error::AppError;

/// Kernel-facing control surface for individual GPIO lines.
///
/// Every call is a single whole-file operation on the line's attribute files.
/// `Value` is the owned, pollable handle to a line's value file.
pub trait GpioBackend {
    type Value;

    fn export(&self, line: LineId) -> Result<(), AppError>;
    fn unexport(&self, line: LineId) -> Result<(), AppError>;
    fn set_direction(&self, line: LineId, direction: Direction) -> Result<(), AppError>;
    fn set_edge(&self, line: LineId, edge: EdgeDetect) -> Result<(), AppError>;
    fn set_value(&self, line: LineId, value: bool) -> Result<(), AppError>;
    fn get_value(&self, line: LineId) -> Result<bool, AppError>;

    /// Inputs are opened read-only and non-blocking, outputs read/write.
    fn open_value(&self, line: LineId, direction: Direction) -> Result<Self::Value, AppError>;
    fn close_value(&self, line: LineId, value: Self::Value) -> Result<(), AppError>;

    /// Waits up to `timeout_ms` for priority readiness on any of `watched`.
    /// Returns one flag per entry; all `false` means the wait timed out.
    fn wait_edges(&self, watched: &[&Self::Value], timeout_ms: i32) -> Result<Vec<bool>, AppError>;

    /// Rewinds the value file and returns the first byte read from it.
    fn read_edge(&self, line: LineId, value: &mut Self::Value) -> Result<u8, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Export,
    Direction,
    Edge,
    Open,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetupStage::Export => "export",
            SetupStage::Direction => "direction",
            SetupStage::Edge => "edge",
            SetupStage::Open => "open",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Pending,
    Ready,
    Failed(SetupStage),
    Released,
}

#[derive(Debug)]
pub struct SetupFailure {
    pub line: LineId,
    pub stage: SetupStage,
    pub error: AppError,
}

/// A line value read after the kernel reported an edge on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeReading {
    pub line: LineId,
    pub value: u8,
}

pub struct LineHandle<V> {
    id: LineId,
    direction: Direction,
    edge: EdgeDetect,
    status: LineStatus,
    value: Option<V>,
}

impl<V> LineHandle<V> {
    fn new(id: LineId, direction: Direction, edge: EdgeDetect) -> Self {
        Self {
            id,
            direction,
            edge,
            status: LineStatus::Pending,
            value: None,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn edge(&self) -> EdgeDetect {
        self.edge
    }

    pub fn status(&self) -> LineStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == LineStatus::Ready
    }

    pub fn value_file(&self) -> Result<&V, AppError> {
        match (&self.status, &self.value) {
            (LineStatus::Ready, Some(v)) => Ok(v),
            _ => Err(AppError::InvalidState(format!(
                "line {} has no open value file ({:?})",
                self.id, self.status
            ))),
        }
    }
}

/// Owns one [`LineHandle`] per configured line, from export to unexport.
pub struct LineManager<B: GpioBackend> {
    backend: B,
    handles: Vec<LineHandle<B::Value>>,
    index: FxHashMap<LineId, usize>,
    released: bool,
}

impl<B: GpioBackend> LineManager<B> {
    /// Exports and configures every line of `config`, inputs first. A failing
    /// line is recorded and skipped; setup always continues with the next one.
    pub fn setup(config: &AppConfig, backend: B) -> (Self, Vec<SetupFailure>) {
        let mut handles = Vec::with_capacity(config.bindings.len() * 2);
        for binding in &config.bindings {
            handles.push(LineHandle::new(binding.switch, Direction::In, binding.edge));
        }
        for binding in &config.bindings {
            handles.push(LineHandle::new(
                binding.indicator,
                Direction::Out,
                EdgeDetect::None,
            ));
        }

        let index = handles
            .iter()
            .enumerate()
            .map(|(i, h)| (h.id, i))
            .collect();

        let mut manager = Self {
            backend,
            handles,
            index,
            released: false,
        };

        let mut failures = Vec::new();
        for i in 0..manager.handles.len() {
            if let Err(failure) = manager.acquire(i) {
                error!(
                    "setup of line {} failed at {}: {}",
                    failure.line, failure.stage, failure.error
                );
                manager.handles[i].status = LineStatus::Failed(failure.stage);
                failures.push(failure);
            }
        }

        (manager, failures)
    }

    fn acquire(&mut self, i: usize) -> Result<(), SetupFailure> {
        let (id, direction, edge) = {
            let h = &self.handles[i];
            (h.id, h.direction, h.edge)
        };
        let fail = |stage, error| SetupFailure {
            line: id,
            stage,
            error,
        };

        self.backend
            .export(id)
            .map_err(|e| fail(SetupStage::Export, e))?;
        self.backend
            .set_direction(id, direction)
            .map_err(|e| fail(SetupStage::Direction, e))?;
        if direction == Direction::In {
            self.backend
                .set_edge(id, edge)
                .map_err(|e| fail(SetupStage::Edge, e))?;
        }
        let value = self
            .backend
            .open_value(id, direction)
            .map_err(|e| fail(SetupStage::Open, e))?;

        let handle = &mut self.handles[i];
        handle.value = Some(value);
        handle.status = LineStatus::Ready;
        debug!("line {id} ready as {}", direction.as_sysfs());
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn handles(&self) -> &[LineHandle<B::Value>] {
        &self.handles
    }

    pub fn handle(&self, line: LineId) -> Result<&LineHandle<B::Value>, AppError> {
        self.index
            .get(&line)
            .map(|&i| &self.handles[i])
            .ok_or(AppError::NotFoundLine(line))
    }

    pub fn set_output(&self, line: LineId, value: bool) -> Result<(), AppError> {
        let handle = self.handle(line)?;
        if handle.direction != Direction::Out {
            return Err(AppError::InvalidState(format!(
                "line {line} is not an output"
            )));
        }
        if !handle.is_ready() {
            return Err(AppError::InvalidState(format!(
                "line {line} is not configured ({:?})",
                handle.status
            )));
        }
        self.backend.set_value(line, value)
    }

    pub fn get_value(&self, line: LineId) -> Result<bool, AppError> {
        let handle = self.handle(line)?;
        if !handle.is_ready() {
            return Err(AppError::InvalidState(format!(
                "line {line} is not configured ({:?})",
                handle.status
            )));
        }
        self.backend.get_value(line)
    }

    /// Waits for edges on every ready input and reads back the lines that
    /// reported one. An empty result is a timeout. A read failure on one line
    /// is logged and does not hide the others.
    pub fn wait_inputs(&mut self, timeout_ms: i32) -> Result<Vec<EdgeReading>, AppError> {
        let (watched, ready) = {
            let (watched, set): (Vec<usize>, Vec<&B::Value>) = self
                .handles
                .iter()
                .enumerate()
                .filter(|(_, h)| h.direction == Direction::In && h.is_ready())
                .filter_map(|(i, h)| h.value.as_ref().map(|v| (i, v)))
                .unzip();
            let ready = self.backend.wait_edges(&set, timeout_ms)?;
            (watched, ready)
        };

        let mut readings = Vec::new();
        for (&i, fired) in watched.iter().zip(ready) {
            if !fired {
                continue;
            }
            let handle = &mut self.handles[i];
            let Some(value) = handle.value.as_mut() else {
                continue;
            };
            match self.backend.read_edge(handle.id, value) {
                Ok(byte) => readings.push(EdgeReading {
                    line: handle.id,
                    value: byte,
                }),
                Err(e) => warn!("read of line {} after edge failed: {e}", handle.id),
            }
        }

        Ok(readings)
    }

    /// Closes and unexports every configured line exactly once, whatever state
    /// its setup reached. Errors are logged and collected; none stops the rest.
    pub fn teardown(&mut self) -> Vec<AppError> {
        let mut errors = Vec::new();
        if self.released {
            return errors;
        }
        self.released = true;

        for handle in &mut self.handles {
            if let Some(value) = handle.value.take()
                && let Err(e) = self.backend.close_value(handle.id, value)
            {
                warn!("close of line {} failed: {e}", handle.id);
                errors.push(e);
            }
            if let Err(e) = self.backend.unexport(handle.id) {
                warn!("unexport of line {} failed: {e}", handle.id);
                errors.push(e);
            }
            handle.status = LineStatus::Released;
        }

        info!("released {} lines", self.handles.len());
        errors
    }
}

impl<B: GpioBackend> Drop for LineManager<B> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}
