use crate::time_types::MillisInstant;

/// Interface to the free-running local millisecond counter.
///
/// The counter is only used to measure elapsed time, it does not need to
/// have any relation to wall-clock time. It must never run backwards, but it
/// is allowed to wrap around at 32 bits.
pub trait LocalClock {
    fn now(&self) -> MillisInstant;

    /// Give other work a chance to run while waiting for a response.
    ///
    /// Called between polls of the transport. Implementations on a hosted
    /// system typically sleep for a short while.
    fn relax(&self) {
        std::thread::yield_now();
    }
}

impl<C: LocalClock + ?Sized> LocalClock for &C {
    fn now(&self) -> MillisInstant {
        (**self).now()
    }

    fn relax(&self) {
        (**self).relax()
    }
}
