//! Core1 task entries
//!
//! Each entry picks up its loans, runs one core operation and then marks
//! the task complete and parks. Core1 never logs and never takes a critical
//! section: core0 may reset it at any instant, and the RP2040 spinlock
//! behind `critical_section` would stay claimed if it died holding it.
//! Everything worth printing goes through the event queue.

use core::hint::spin_loop;

use embassy_time::Delay;
use tracewire_core::glitch::{GlitchDetector, Polarity};
use tracewire_core::{CaptureEngine, CharSource, HandoffSink, ImportSession};
use tracewire_hal_rp2040::{release_bus, EmbassyClock};

use crate::channels::{CharConsumer, WorkerEvent, BUFFER, KIT, STORE, TASK};

/// Idle loop core1 sits in between tasks
pub fn park() -> ! {
    loop {
        spin_loop();
    }
}

fn finish() -> ! {
    TASK.complete();
    park()
}

/// Time high pulses on the clock line
pub fn glitch_main() -> ! {
    // SAFETY: core0 lent the kit for this task and does not touch it until
    // core1 has been reset.
    let Some(kit) = (unsafe { KIT.get_mut() }) else {
        finish()
    };

    let bus = kit.bus;
    let mut detector = GlitchDetector::new(
        bus.clock_line(),
        EmbassyClock,
        Polarity::High,
        kit.glitch,
    );
    let mut stop = &TASK;
    detector.run(&mut stop, |event| kit.report(WorkerEvent::Glitch(event)));
    finish()
}

/// Capture, hand to core0 for storing, replay; repeat
pub fn capture_replay_main() -> ! {
    // SAFETY: as in `glitch_main`; the buffer is also lent.
    let (Some(kit), Some(buffer)) = (unsafe { KIT.get_mut() }, unsafe { BUFFER.get_mut() }) else {
        finish()
    };

    let mut engine = CaptureEngine::new(kit.bus, &mut kit.lines, Delay, kit.capture);
    let mut sink = HandoffSink::new(&TASK);
    let mut stop = &TASK;
    let events = &mut kit.events;
    let result = engine.run(buffer, &mut sink, &mut stop, |report| {
        let _ = events.enqueue(WorkerEvent::Cycle(report));
    });
    drop(engine);

    release_bus(&mut kit.lines);
    kit.report(WorkerEvent::Finished(result));
    finish()
}

/// Replay whatever core0 loaded into the buffer
pub fn replay_buffer_main() -> ! {
    // SAFETY: as in `capture_replay_main`.
    let (Some(kit), Some(buffer)) = (unsafe { KIT.get_mut() }, unsafe { BUFFER.get_mut() }) else {
        finish()
    };

    let mut engine = CaptureEngine::new(kit.bus, &mut kit.lines, Delay, kit.capture);
    let mut stop = &TASK;
    let result = engine.replay(buffer, &mut stop).map(|()| 1);
    drop(engine);

    release_bus(&mut kit.lines);
    kit.report(WorkerEvent::Finished(result));
    finish()
}

/// Load and replay every stored capture in slot order
///
/// Only flash reads happen here; reads go through XIP and are legal from
/// core1.
pub fn replay_stored_main() -> ! {
    // SAFETY: as in `capture_replay_main`; the store is lent as well.
    let (Some(kit), Some(buffer), Some(store)) = (
        unsafe { KIT.get_mut() },
        unsafe { BUFFER.get_mut() },
        unsafe { STORE.get_mut() },
    ) else {
        finish()
    };

    let mut engine = CaptureEngine::new(kit.bus, &mut kit.lines, Delay, kit.capture);
    let mut stop = &TASK;
    let events = &mut kit.events;
    let result = engine.replay_stored(store, buffer, &mut stop, |slot| {
        let _ = events.enqueue(WorkerEvent::Replaying(slot));
    });
    drop(engine);

    release_bus(&mut kit.lines);
    kit.report(WorkerEvent::Finished(result));
    finish()
}

/// Characters forwarded by core0, until the task is stopped
struct QueuedChars<'a> {
    chars: &'a mut CharConsumer,
}

impl CharSource for QueuedChars<'_> {
    fn next_char(&mut self) -> Option<u8> {
        loop {
            if let Some(c) = self.chars.dequeue() {
                return Some(c);
            }
            if TASK.is_stopped() {
                return None;
            }
            spin_loop();
        }
    }
}

/// Parse pasted hex text into captures, one slot per `;`
pub fn import_main() -> ! {
    // SAFETY: as in `capture_replay_main`.
    let (Some(kit), Some(buffer)) = (unsafe { KIT.get_mut() }, unsafe { BUFFER.get_mut() }) else {
        finish()
    };

    let mut source = QueuedChars {
        chars: &mut kit.chars,
    };
    let mut sink = HandoffSink::new(&TASK);
    let events = &mut kit.events;
    let end = ImportSession::new().run(&mut source, buffer, &mut sink, kit.import_limit, |report| {
        let _ = events.enqueue(WorkerEvent::Imported(report));
    });

    kit.report(WorkerEvent::ImportEnded(end));
    finish()
}
