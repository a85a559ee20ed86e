use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{Command, QueuedCommand};
use crate::error::CommandError;

const RATE_WINDOW: Duration = Duration::from_millis(1000);

/// Bounded per-player FIFO with a sliding-window rate limit (C3, §4.2).
pub struct PlayerQueue {
    player_id: Uuid,
    max_size: usize,
    max_per_second: u32,
    entries: VecDeque<QueuedCommand>,
    rate_window: VecDeque<Instant>,
}

impl PlayerQueue {
    pub fn new(player_id: Uuid, max_size: usize, max_per_second: u32) -> Self {
        PlayerQueue {
            player_id,
            max_size,
            max_per_second,
            entries: VecDeque::with_capacity(max_size),
            rate_window: VecDeque::new(),
        }
    }

    /// Enqueue policy (§4.2): if the sliding window is already at the rate
    /// limit, reject without touching the queue. Otherwise, if the queue is
    /// full, evict the oldest entry before pushing — capacity never causes a
    /// rejection.
    pub fn enqueue(&mut self, command: Command, now: Instant) -> Result<(), CommandError> {
        self.evict_expired(now);
        if self.rate_window.len() as u32 >= self.max_per_second {
            return Err(CommandError::RateLimited);
        }
        self.rate_window.push_back(now);

        if self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back(QueuedCommand {
            player_id: self.player_id,
            command,
            enqueued_at: now,
        });
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<QueuedCommand> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&QueuedCommand> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.rate_window.clear();
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.rate_window.front() {
            if now.duration_since(front) >= RATE_WINDOW {
                self.rate_window.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn cmd() -> Command {
        Command::Coast
    }

    #[test]
    fn evicts_oldest_when_full_rather_than_rejecting() {
        let mut q = PlayerQueue::new(Uuid::new_v4(), 10, 1000);
        let base = Instant::now();
        for i in 0..10u64 {
            q.enqueue(cmd(), base + Duration::from_millis(i)).unwrap();
        }
        assert_eq!(q.len(), 10);
        q.enqueue(cmd(), base + Duration::from_millis(10)).unwrap();
        assert_eq!(q.len(), 10, "the 11th enqueue must evict, not reject");
    }

    #[test]
    fn rate_limits_within_one_second_window() {
        let mut q = PlayerQueue::new(Uuid::new_v4(), 10, 5);
        let base = Instant::now();
        for i in 0..5u64 {
            assert!(q.enqueue(cmd(), base + Duration::from_millis(i * 10)).is_ok());
        }
        let sixth = q.enqueue(cmd(), base + Duration::from_millis(400));
        assert_eq!(sixth.unwrap_err(), CommandError::RateLimited);
        assert_eq!(q.len(), 5, "a rejected enqueue must not modify the queue");
    }

    #[test]
    fn rate_window_slides() {
        let mut q = PlayerQueue::new(Uuid::new_v4(), 10, 5);
        let base = Instant::now();
        for i in 0..5u64 {
            q.enqueue(cmd(), base + Duration::from_millis(i)).unwrap();
        }
        assert!(q
            .enqueue(cmd(), base + Duration::from_millis(1100))
            .is_ok());
    }

    #[test]
    fn clear_resets_both_queue_and_window() {
        let mut q = PlayerQueue::new(Uuid::new_v4(), 10, 5);
        let base = Instant::now();
        q.enqueue(cmd(), base).unwrap();
        q.clear();
        assert!(q.is_empty());
        for i in 0..5u64 {
            assert!(q.enqueue(cmd(), base + Duration::from_millis(i)).is_ok());
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = PlayerQueue::new(Uuid::new_v4(), 10, 5);
        let base = Instant::now();
        q.enqueue(Command::Accelerate { intensity: 1.0 }, base).unwrap();
        q.enqueue(Command::Brake { intensity: 1.0 }, base + Duration::from_millis(1))
            .unwrap();
        assert_eq!(q.dequeue().unwrap().command, Command::Accelerate { intensity: 1.0 });
        assert_eq!(q.dequeue().unwrap().command, Command::Brake { intensity: 1.0 });
    }

    proptest::proptest! {
        #[test]
        fn queue_length_never_exceeds_max_size(enqueues in 0usize..50, max_size in 1usize..10) {
            let mut q = PlayerQueue::new(Uuid::new_v4(), max_size, 10_000);
            let base = Instant::now();
            for i in 0..enqueues {
                q.enqueue(cmd(), base + Duration::from_micros(i as u64)).unwrap();
                prop_assert!(q.len() <= max_size);
            }
        }

        #[test]
        fn rate_window_never_admits_more_than_max_per_second_within_one_window(max_per_second in 1u32..20) {
            let mut q = PlayerQueue::new(Uuid::new_v4(), 1000, max_per_second);
            let base = Instant::now();
            let mut admitted = 0u32;
            for i in 0..(max_per_second * 3) {
                if q.enqueue(cmd(), base + Duration::from_millis(i as u64)).is_ok() {
                    admitted += 1;
                }
            }
            prop_assert!(admitted <= max_per_second);
        }
    }
}
