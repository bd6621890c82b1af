use crate::events::Event;
use crate::machine::PlaybackStateMachine;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

/// Creates the queue every event producer sends into.
pub fn channel() -> (Sender<Event>, Receiver<Event>) {
    crossbeam_channel::unbounded()
}

/// Feeds queued events to the state machine, one at a time, in arrival order.
pub struct EventLoop {
    machine: PlaybackStateMachine,
    events: Receiver<Event>,
}

impl EventLoop {
    pub fn new(machine: PlaybackStateMachine, events: Receiver<Event>) -> Self {
        Self { machine, events }
    }

    /// Runs until [`Event::Shutdown`] is handled or every sender is dropped.
    /// Returns the number of events handled.
    pub fn run(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let received = match self.machine.next_deadline() {
                Some(deadline) => match self.events.recv_deadline(deadline) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.events.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            let now = Instant::now();
            if let Some(event) = received {
                let shutdown = matches!(event, Event::Shutdown);
                self.machine.handle(event, now);
                handled += 1;
                if shutdown {
                    break;
                }
            }
            self.machine.poll_timers(now);
        }
        log::debug!("Event loop stopped after {} events", handled);
        handled
    }

    pub fn machine(&self) -> &PlaybackStateMachine {
        &self.machine
    }

    pub fn into_machine(self) -> PlaybackStateMachine {
        self.machine
    }
}
