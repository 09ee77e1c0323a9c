use std::thread;
use std::time::{Duration, Instant};

use anticipation::backend::{MockCall, MockGpioBackend, MockOp};
use anticipation::{
    AppConfig, AppError, EdgeLoop, EdgeReading, LineManager, ObservedState, Shutdown,
};

fn test_config(poll_timeout_ms: u64) -> AppConfig {
    AppConfig {
        poll_timeout_ms,
        ..AppConfig::default()
    }
}

fn writes_to(backend: &MockGpioBackend, line: u32) -> Vec<bool> {
    backend
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::SetValue(l, v) if l == line => Some(v),
            _ => None,
        })
        .collect()
}

/// Runs the loop until the mock has no queued values left.
fn run_until_drained(config: &AppConfig, backend: &MockGpioBackend) -> (EdgeLoop, u64) {
    let shutdown = Shutdown::new();
    backend.stop_when_idle(shutdown.clone());

    let (mut lines, failures) = LineManager::setup(config, backend.clone());
    assert!(failures.is_empty());

    let mut edge_loop = EdgeLoop::new(config, shutdown);
    let stats = edge_loop.run(&mut lines).expect("loop runs");
    assert!(lines.teardown().is_empty());

    (edge_loop, stats.transitions)
}

#[test]
fn repeated_values_do_not_rewrite_the_indicator() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.push_values(48, b"11001");

    let (edge_loop, transitions) = run_until_drained(&config, &backend);

    // The first read leaves Unknown; after that only the two value changes write.
    let writes = writes_to(&backend, 44);
    assert_eq!(writes, vec![true, false, true]);
    assert_eq!(transitions, 3);
    assert_eq!(writes.windows(2).filter(|w| w[0] != w[1]).count(), 2);
    assert_eq!(edge_loop.state(48), Some(ObservedState::Released));
    assert!(writes_to(&backend, 26).is_empty());
}

#[test]
fn first_pressed_read_is_a_transition() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.push_values(48, b"0");

    let (edge_loop, transitions) = run_until_drained(&config, &backend);

    assert_eq!(transitions, 1);
    assert_eq!(writes_to(&backend, 44), vec![false]);
    assert_eq!(edge_loop.state(48), Some(ObservedState::Pressed));
    assert_eq!(edge_loop.state(49), Some(ObservedState::Unknown));
}

#[test]
fn switches_drive_their_own_indicators() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.push_values(48, b"0");
    backend.push_values(49, b"100");

    let (_, transitions) = run_until_drained(&config, &backend);

    assert_eq!(transitions, 3);
    assert_eq!(writes_to(&backend, 44), vec![false]);
    assert_eq!(writes_to(&backend, 26), vec![true, false]);
}

#[test]
fn failed_output_write_still_changes_state() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.fail_on(MockOp::SetValue, 44);
    backend.push_values(48, b"00");

    let (edge_loop, transitions) = run_until_drained(&config, &backend);

    assert_eq!(transitions, 1);
    assert_eq!(edge_loop.state(48), Some(ObservedState::Pressed));
    assert_eq!(backend.value(44), Some(false));
}

#[test]
fn input_without_value_file_is_not_polled() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.fail_on(MockOp::Open, 48);
    backend.push_values(48, b"0");

    let shutdown = Shutdown::new();
    backend.stop_when_idle(shutdown.clone());
    let (mut lines, failures) = LineManager::setup(&config, backend.clone());
    assert_eq!(failures.len(), 1);

    let mut edge_loop = EdgeLoop::new(&config, shutdown);
    let stats = edge_loop.run(&mut lines).unwrap();

    assert_eq!(stats.edges, 0);
    assert_eq!(stats.timeouts, 1);
    assert!(writes_to(&backend, 44).is_empty());
}

#[test]
fn read_failure_on_one_line_keeps_the_others() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.fail_on(MockOp::Read, 48);
    backend.push_values(48, b"0");
    backend.push_values(49, b"0");

    let (mut lines, _) = LineManager::setup(&config, backend.clone());
    let readings = lines.wait_inputs(10).unwrap();

    assert_eq!(
        readings,
        vec![EdgeReading {
            line: 49,
            value: b'0'
        }]
    );
}

#[test]
fn poll_failure_ends_the_loop_and_teardown_still_runs() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.fail_poll();

    let (mut lines, _) = LineManager::setup(&config, backend.clone());
    let mut edge_loop = EdgeLoop::new(&config, Shutdown::new());

    let result = edge_loop.run(&mut lines);
    assert!(matches!(result, Err(AppError::Poll(_))));

    assert!(lines.teardown().is_empty());
    for line in [48, 49, 44, 26] {
        assert!(!backend.is_exported(line));
    }
}

#[test]
fn requested_shutdown_skips_the_wait() {
    let config = test_config(10);
    let backend = MockGpioBackend::default();
    backend.push_values(48, b"0");

    let shutdown = Shutdown::new();
    shutdown.request();
    let (mut lines, _) = LineManager::setup(&config, backend.clone());
    let stats = EdgeLoop::new(&config, shutdown).run(&mut lines).unwrap();

    assert_eq!(stats.iterations, 0);
    assert!(writes_to(&backend, 44).is_empty());
}

#[test]
fn shutdown_is_observed_within_one_timeout() {
    let config = test_config(200);
    let backend = MockGpioBackend::default();
    backend.set_idle_delay(Duration::from_millis(200));

    let shutdown = Shutdown::new();
    let (mut lines, _) = LineManager::setup(&config, backend.clone());
    let mut edge_loop = EdgeLoop::new(&config, shutdown.clone());
    assert_eq!(edge_loop.timeout_ms(), 200);

    let signaller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        shutdown.request();
    });

    let started = Instant::now();
    let stats = edge_loop.run(&mut lines).unwrap();
    let elapsed = started.elapsed();
    signaller.join().unwrap();

    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(50 + 200 + 500), "{elapsed:?}");
    assert!(stats.iterations <= 2);
    assert!(stats.elapsed.to_millis() >= 50);

    assert!(lines.teardown().is_empty());
    for line in [48, 49, 44, 26] {
        assert!(!backend.is_exported(line));
    }
}
