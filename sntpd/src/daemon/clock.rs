use std::time::{Duration, Instant};

use sntp_proto::{LocalClock, MillisInstant};

/// Millisecond counter measured from the moment the clock was created.
///
/// Like a hardware tick counter it wraps around after about 49.7 days; the
/// client only ever looks at differences between readings.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicMillis {
    start: Instant,
}

impl MonotonicMillis {
    const RELAX_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new() -> Self {
        MonotonicMillis {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicMillis {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalClock for MonotonicMillis {
    fn now(&self) -> MillisInstant {
        // truncation implements the wraparound
        MillisInstant::from_millis(self.start.elapsed().as_millis() as u32)
    }

    fn relax(&self) {
        std::thread::sleep(Self::RELAX_INTERVAL);
    }
}
