//! Second execution unit control
//!
//! The platform has no preemptive kill for the second core. A worker stops
//! either cooperatively or by a hard reset from the supervising core, so the
//! whole interface is "reset it" and "start it at this entry point".

/// Entry point for the worker unit; never returns
pub type WorkerEntry = fn() -> !;

/// Control over the second execution unit
pub trait WorkerUnit {
    /// Hard-reset the unit, abandoning whatever it was executing
    ///
    /// Must return only once the unit is held in reset or back in its
    /// boot state.
    fn reset(&mut self);

    /// Start `entry` on the unit from a fresh reset
    fn start(&mut self, entry: WorkerEntry);
}
