//! Periodic arming of the detect-next-frame flag.
//!
//! The trigger thread only sets a flag; the frame path decides when that
//! flag turns into an actual pass. Cadence and execution stay decoupled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{never, select, tick, Receiver, Sender};

enum TriggerCommand {
    Arm(Duration),
    Disarm,
    Shutdown,
}

/// Timer thread that periodically sets a shared flag while armed.
pub struct PeriodicTrigger {
    control: Sender<TriggerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTrigger {
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        let (control, commands) = crossbeam_channel::unbounded();
        let handle = std::thread::spawn(move || trigger_loop(commands, flag));
        Self {
            control,
            handle: Some(handle),
        }
    }

    /// Starts (or restarts) ticking at the given period. The first firing
    /// happens one full period after arming.
    pub fn arm(&self, period: Duration) {
        let _ = self.control.send(TriggerCommand::Arm(period));
    }

    /// Stops ticking. Does not clear a flag that was already set.
    pub fn disarm(&self) {
        let _ = self.control.send(TriggerCommand::Disarm);
    }
}

impl Drop for PeriodicTrigger {
    fn drop(&mut self) {
        let _ = self.control.send(TriggerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn trigger_loop(commands: Receiver<TriggerCommand>, flag: Arc<AtomicBool>) {
    let mut ticker = never();
    loop {
        select! {
            recv(commands) -> command => match command {
                Ok(TriggerCommand::Arm(period)) => ticker = tick(period),
                Ok(TriggerCommand::Disarm) => ticker = never(),
                Ok(TriggerCommand::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => flag.store(true, Ordering::SeqCst),
        }
    }
}
