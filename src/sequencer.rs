//! The ordering gate.
//!
//! Workers finish batches in any order, but some commits must happen in
//! stream order. A [`Sequencer`] holds the next expected ticket (the base
//! index of the next batch); [`Sequencer::enter`] sleeps until the caller's
//! ticket comes up and returns a [`Turn`]. Finishing the turn moves the gate
//! to the next ticket and wakes every waiter.
//!
//! A turn dropped without [`Turn::finish`] (an early return or a panic while
//! committing) aborts the gate, as does [`Sequencer::abort`]. Every current
//! and future waiter then gets [`SharkError::SequencerAborted`] instead of
//! sleeping forever.

use parking_lot::{Condvar, Mutex};

use crate::{Result, SharkError};

#[derive(Debug)]
struct GateState {
    next: u64,
    aborted: bool,
}

/// Condition-variable gate admitting tickets in increasing order.
///
/// # Examples
///
/// ```rust
/// use shark::Sequencer;
///
/// # fn main() -> shark::Result<()> {
/// let gate = Sequencer::new();
/// let order = parking_lot::Mutex::new(Vec::new());
///
/// std::thread::scope(|scope| {
///     // batches of two records, handed out as tickets 0, 2, 4
///     for ticket in [4u64, 0, 2] {
///         let (gate, order) = (&gate, &order);
///         scope.spawn(move || -> shark::Result<()> {
///             let turn = gate.enter(ticket)?;
///             order.lock().push(ticket);
///             turn.finish(ticket + 2);
///             Ok(())
///         });
///     }
/// });
/// assert_eq!(order.into_inner(), vec![0, 2, 4]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Sequencer {
    state: Mutex<GateState>,
    turn_over: Condvar,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            state: Mutex::new(GateState {
                next: first,
                aborted: false,
            }),
            turn_over: Condvar::new(),
        }
    }

    /// Block until `ticket` is the next expected one.
    pub fn enter(&self, ticket: u64) -> Result<Turn<'_>> {
        let mut state = self.state.lock();
        while !state.aborted && state.next != ticket {
            self.turn_over.wait(&mut state);
        }
        if state.aborted {
            return Err(SharkError::SequencerAborted);
        }
        Ok(Turn {
            gate: self,
            ticket,
            finished: false,
        })
    }

    /// Release every waiter with an error.
    pub fn abort(&self) {
        self.state.lock().aborted = true;
        self.turn_over.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// The ticket currently admitted.
    pub fn next_ticket(&self) -> u64 {
        self.state.lock().next
    }

    fn advance(&self, next: u64) {
        self.state.lock().next = next;
        self.turn_over.notify_all();
    }
}

/// Exclusive right to commit, held by exactly one ticket at a time.
#[must_use = "dropping a turn without finishing it aborts the gate"]
#[derive(Debug)]
pub struct Turn<'a> {
    gate: &'a Sequencer,
    ticket: u64,
    finished: bool,
}

impl Turn<'_> {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Hand the gate to `next`, normally the ticket plus the batch length.
    pub fn finish(mut self, next: u64) {
        debug_assert!(next > self.ticket);
        self.finished = true;
        self.gate.advance(next);
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.gate.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[test]
    fn test_randomized_delays_commit_in_order() {
        for round in 0..5u64 {
            let gate = Sequencer::new();
            let tickets = AtomicU64::new(0);
            let committed = Mutex::new(Vec::new());
            let total = 60;

            std::thread::scope(|scope| {
                for tid in 0..4u64 {
                    let (gate, tickets, committed) = (&gate, &tickets, &committed);
                    scope.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(round * 31 + tid);
                        loop {
                            let len = rng.random_range(1..4u64);
                            let base = tickets.fetch_add(len, Ordering::SeqCst);
                            if base >= total {
                                break;
                            }
                            std::thread::sleep(Duration::from_micros(rng.random_range(0..300)));
                            let turn = gate.enter(base).unwrap();
                            committed.lock().push(base);
                            turn.finish(base + len);
                        }
                    });
                }
            });

            let committed = committed.into_inner();
            let mut sorted = committed.clone();
            sorted.sort_unstable();
            assert_eq!(committed, sorted, "round {round}");
        }
    }

    #[test]
    fn test_dropped_turn_aborts_waiters() {
        let gate = Sequencer::new();
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| gate.enter(5).map(|turn| turn.finish(6)));
            let turn = gate.enter(0).unwrap();
            std::thread::sleep(Duration::from_millis(10));
            drop(turn);
            assert!(matches!(
                waiter.join().unwrap(),
                Err(SharkError::SequencerAborted)
            ));
        });
        assert!(gate.is_aborted());
        assert!(gate.enter(0).is_err());
    }

    #[test]
    fn test_explicit_abort() {
        let gate = Sequencer::starting_at(10);
        assert_eq!(gate.next_ticket(), 10);
        gate.abort();
        assert!(matches!(gate.enter(10), Err(SharkError::SequencerAborted)));
    }

    #[test]
    fn test_finish_advances() {
        let gate = Sequencer::new();
        gate.enter(0).unwrap().finish(3);
        assert_eq!(gate.next_ticket(), 3);
        let turn = gate.enter(3).unwrap();
        assert_eq!(turn.ticket(), 3);
        turn.finish(4);
        assert!(!gate.is_aborted());
    }
}
