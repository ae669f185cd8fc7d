//! Background thread that polls a [`LifecycleService`] on a fixed interval.
//!
//! The driver owns one worker thread. It polls immediately on start, then
//! every `interval`, or early when [`PollDriver::request_refresh`] is called.
//! Results arrive on a channel so the consumer never blocks on enumeration.

use crate::lifecycle::{LifecycleService, PollError};
use crate::logging::{event_names, Stage};
use crate::source::ProcessSource;
use quell_common::Process;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time between polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// One delivered poll outcome.
#[derive(Debug, Clone)]
pub enum PollUpdate {
    /// A fresh snapshot, in enumeration order.
    Snapshot { tick: u64, processes: Vec<Process> },
    /// Enumeration failed; the previous snapshot is still the latest.
    Failed { tick: u64, message: String },
}

impl PollUpdate {
    pub fn tick(&self) -> u64 {
        match self {
            PollUpdate::Snapshot { tick, .. } | PollUpdate::Failed { tick, .. } => *tick,
        }
    }
}

enum Command {
    Refresh,
    Stop,
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct PollDriver {
    commands: Sender<Command>,
    updates: Receiver<PollUpdate>,
    worker: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PollDriver {
    /// Start polling `service` every `interval`.
    pub fn spawn<S: ProcessSource>(
        service: Arc<LifecycleService<S>>,
        interval: Duration,
    ) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (update_tx, update_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("quell-poll".to_string())
            .spawn(move || run_loop(&service, interval, &cmd_rx, &update_tx))?;

        Ok(PollDriver {
            commands: cmd_tx,
            updates: update_rx,
            worker: Some(worker),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll now instead of waiting for the next tick.
    pub fn request_refresh(&self) {
        let _ = self.commands.send(Command::Refresh);
    }

    /// Block until the next update, or `None` once the loop has stopped.
    pub fn recv(&self) -> Option<PollUpdate> {
        self.updates.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<PollUpdate> {
        self.updates.recv_timeout(timeout).ok()
    }

    /// Drain whatever is already queued.
    pub fn try_iter(&self) -> impl Iterator<Item = PollUpdate> + '_ {
        self.updates.try_iter()
    }

    /// Stop the loop and wait for the worker to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(target: event_names::DRIVER_STOPPED, "poll thread panicked");
            }
        }
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<S: ProcessSource>(
    service: &LifecycleService<S>,
    interval: Duration,
    commands: &Receiver<Command>,
    updates: &Sender<PollUpdate>,
) {
    let span = tracing::debug_span!("driver", stage = %Stage::Driver);
    let _guard = span.enter();
    info!(
        target: event_names::DRIVER_STARTED,
        interval_ms = interval.as_millis() as u64,
        "poll driver started"
    );

    let mut tick: u64 = 0;
    loop {
        tick += 1;
        let update = match service.poll() {
            Ok(processes) => Some(PollUpdate::Snapshot { tick, processes }),
            Err(PollError::Superseded { seq, latest }) => {
                debug!(seq, latest, "skipping superseded poll");
                None
            }
            Err(err @ PollError::Enumeration(_)) => Some(PollUpdate::Failed {
                tick,
                message: err.to_string(),
            }),
        };
        if let Some(update) = update {
            if updates.send(update).is_err() {
                break;
            }
        }

        match commands.recv_timeout(interval) {
            Ok(Command::Refresh) | Err(RecvTimeoutError::Timeout) => continue,
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(target: event_names::DRIVER_STOPPED, ticks = tick, "poll driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{MockProcessBuilder, MockSource};

    fn service(source: &MockSource) -> Arc<LifecycleService<MockSource>> {
        Arc::new(LifecycleService::new(source.clone()))
    }

    #[test]
    fn test_polls_immediately() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).build()]);
        let driver = PollDriver::spawn(service(&source), Duration::from_secs(60)).unwrap();

        match driver.recv_timeout(Duration::from_secs(5)) {
            Some(PollUpdate::Snapshot { tick, processes }) => {
                assert_eq!(tick, 1);
                assert_eq!(processes.len(), 1);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        driver.stop();
    }

    #[test]
    fn test_refresh_triggers_early_poll() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).build()]);
        let driver = PollDriver::spawn(service(&source), Duration::from_secs(60)).unwrap();
        assert!(driver.recv_timeout(Duration::from_secs(5)).is_some());

        source.insert(MockProcessBuilder::new(11).build());
        driver.request_refresh();
        match driver.recv_timeout(Duration::from_secs(5)) {
            Some(PollUpdate::Snapshot { tick, processes }) => {
                assert_eq!(tick, 2);
                assert_eq!(processes.len(), 2);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_enumeration_failure_reported() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).build()]);
        source.set_fail_list_pids(true);
        let driver = PollDriver::spawn(service(&source), Duration::from_secs(60)).unwrap();

        match driver.recv_timeout(Duration::from_secs(5)) {
            Some(PollUpdate::Failed { tick, message }) => {
                assert_eq!(tick, 1);
                assert!(message.contains("enumeration"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_ticks() {
        let source = MockSource::with_processes([MockProcessBuilder::new(10).build()]);
        let driver = PollDriver::spawn(service(&source), Duration::from_millis(20)).unwrap();
        let first = driver.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = driver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(second.tick() > first.tick());
    }
}
