use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{Direction, EdgeDetect, LineId};
use crate::error::AppError;
use crate::gpio::GpioBackend;
use crate::signal::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Export,
    Unexport,
    SetDirection,
    SetEdge,
    SetValue,
    GetValue,
    Open,
    Close,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Export(LineId),
    Unexport(LineId),
    SetDirection(LineId, Direction),
    SetEdge(LineId, EdgeDetect),
    SetValue(LineId, bool),
    Open(LineId),
    Close(LineId),
}

/// Stand-in for an open value file.
#[derive(Debug)]
pub struct MockValue {
    line: LineId,
}

impl MockValue {
    pub fn line(&self) -> LineId {
        self.line
    }
}

#[derive(Default)]
struct MockLine {
    exported: bool,
    direction: Option<Direction>,
    edge: EdgeDetect,
    value: bool,
    pending: VecDeque<u8>,
}

#[derive(Default)]
struct MockState {
    lines: FxHashMap<LineId, MockLine>,
    failures: FxHashSet<(MockOp, LineId)>,
    fail_poll: bool,
    calls: Vec<MockCall>,
    stop_when_idle: Option<Shutdown>,
    idle_delay: Duration,
}

impl MockState {
    fn check(&self, op: MockOp, line: LineId) -> Result<(), AppError> {
        if self.failures.contains(&(op, line)) {
            return Err(AppError::Gpio(format!("injected {op:?} failure on line {line}")));
        }
        Ok(())
    }

    fn exported(&mut self, line: LineId) -> Result<&mut MockLine, AppError> {
        match self.lines.get_mut(&line) {
            Some(l) if l.exported => Ok(l),
            _ => Err(AppError::Gpio(format!("line {line} is not exported"))),
        }
    }
}

/// In-memory backend. Clones share state, so a test can keep one clone while
/// a `LineManager` owns another.
#[derive(Clone, Default)]
pub struct MockGpioBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockGpioBackend {
    pub fn fail_on(&self, op: MockOp, line: LineId) {
        self.state.lock().failures.insert((op, line));
    }

    pub fn fail_poll(&self) {
        self.state.lock().fail_poll = true;
    }

    /// Queues values the line will report, one edge notification per value.
    pub fn push_values(&self, line: LineId, values: &[u8]) {
        let mut state = self.state.lock();
        let entry = state.lines.entry(line).or_default();
        entry.pending.extend(values.iter().copied());
    }

    /// Requests `shutdown` the first time a wait finds nothing queued.
    pub fn stop_when_idle(&self, shutdown: Shutdown) {
        self.state.lock().stop_when_idle = Some(shutdown);
    }

    /// How long an idle wait blocks, capped by the wait timeout.
    pub fn set_idle_delay(&self, delay: Duration) {
        self.state.lock().idle_delay = delay;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_exported(&self, line: LineId) -> bool {
        self.state
            .lock()
            .lines
            .get(&line)
            .map(|l| l.exported)
            .unwrap_or(false)
    }

    pub fn edge(&self, line: LineId) -> Option<EdgeDetect> {
        self.state.lock().lines.get(&line).map(|l| l.edge)
    }

    pub fn value(&self, line: LineId) -> Option<bool> {
        self.state.lock().lines.get(&line).map(|l| l.value)
    }
}

impl GpioBackend for MockGpioBackend {
    type Value = MockValue;

    fn export(&self, line: LineId) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Export(line));
        state.check(MockOp::Export, line)?;

        let entry = state.lines.entry(line).or_default();
        if entry.exported {
            return Err(AppError::Gpio(format!("line {line} already exported")));
        }
        entry.exported = true;
        Ok(())
    }

    fn unexport(&self, line: LineId) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Unexport(line));
        state.check(MockOp::Unexport, line)?;

        let entry = state.exported(line)?;
        entry.exported = false;
        entry.direction = None;
        entry.edge = EdgeDetect::None;
        Ok(())
    }

    fn set_direction(&self, line: LineId, direction: Direction) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::SetDirection(line, direction));
        state.check(MockOp::SetDirection, line)?;

        state.exported(line)?.direction = Some(direction);
        Ok(())
    }

    fn set_edge(&self, line: LineId, edge: EdgeDetect) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::SetEdge(line, edge));
        state.check(MockOp::SetEdge, line)?;

        let entry = state.exported(line)?;
        if entry.direction != Some(Direction::In) {
            return Err(AppError::InvalidState(format!(
                "edge detection requires line {line} to be an input"
            )));
        }
        entry.edge = edge;
        Ok(())
    }

    fn set_value(&self, line: LineId, value: bool) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::SetValue(line, value));
        state.check(MockOp::SetValue, line)?;

        let entry = state.exported(line)?;
        if entry.direction != Some(Direction::Out) {
            return Err(AppError::InvalidState(format!(
                "line {line} must be an output to set its value"
            )));
        }
        entry.value = value;
        Ok(())
    }

    fn get_value(&self, line: LineId) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        state.check(MockOp::GetValue, line)?;
        Ok(state.exported(line)?.value)
    }

    fn open_value(&self, line: LineId, _direction: Direction) -> Result<MockValue, AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Open(line));
        state.check(MockOp::Open, line)?;

        state.exported(line)?;
        Ok(MockValue { line })
    }

    fn close_value(&self, line: LineId, _value: MockValue) -> Result<(), AppError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Close(line));
        state.check(MockOp::Close, line)
    }

    fn wait_edges(&self, watched: &[&MockValue], timeout_ms: i32) -> Result<Vec<bool>, AppError> {
        let idle_delay = {
            let state = self.state.lock();
            if state.fail_poll {
                return Err(AppError::Poll(io::Error::from_raw_os_error(libc::EBADF)));
            }

            let ready: Vec<bool> = watched
                .iter()
                .map(|v| {
                    state
                        .lines
                        .get(&v.line)
                        .map(|l| !l.pending.is_empty())
                        .unwrap_or(false)
                })
                .collect();
            if ready.iter().any(|r| *r) {
                return Ok(ready);
            }

            if let Some(shutdown) = &state.stop_when_idle {
                shutdown.request();
            }
            state
                .idle_delay
                .min(Duration::from_millis(timeout_ms.max(0) as u64))
        };

        if !idle_delay.is_zero() {
            thread::sleep(idle_delay);
        }
        Ok(vec![false; watched.len()])
    }

    fn read_edge(&self, line: LineId, value: &mut MockValue) -> Result<u8, AppError> {
        let mut state = self.state.lock();
        state.check(MockOp::Read, line)?;

        let entry = state.exported(value.line)?;
        let byte = entry
            .pending
            .pop_front()
            .ok_or_else(|| AppError::Gpio(format!("no value queued on line {line}")))?;
        entry.value = byte != b'0';
        Ok(byte)
    }
}
