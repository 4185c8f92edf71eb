//! Start and end timestamps for moderation trace events.

use chrono::Utc;

use crate::queue::TimerWindow;

/// Wall-clock stopwatch for a traced call.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: chrono::DateTime<Utc>,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Utc::now() }
    }

    pub fn stop(self) -> TimerWindow {
        TimerWindow {
            start: self.start,
            end: Utc::now(),
        }
    }

    /// Run `f` and return its result with the window it took.
    pub fn measure<T>(f: impl FnOnce() -> T) -> (T, TimerWindow) {
        let timer = Self::start();
        let out = f();
        (out, timer.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_ordered() {
        let (value, window) = Timer::measure(|| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            7
        });
        assert_eq!(value, 7);
        assert!(window.end >= window.start);
        assert!(window.elapsed_ms() >= 5);
    }
}
