//! Cross-core statics
//!
//! Everything core0 and core1 share lives here: the task handle, the loans
//! for the running task and the lock-free queues. Nothing in this module
//! takes a critical section, so core1 may be reset at any point without
//! leaving a lock held.

use heapless::spsc::{Consumer, Producer};
use tracewire_core::{
    CaptureSettings, CycleReport, EngineError, GlitchEvent, GlitchSettings, ImportEnd,
    ImportReport, TaskHandle,
};
use tracewire_hal_rp2040::{BusInputs, ReplayOutputs};

use crate::config::{Buffer, Store, CHAR_QUEUE_LEN, EVENT_QUEUE_LEN};
use crate::handoff::Lent;

/// Stop flag and persist handshake for the running core1 task
pub static TASK: TaskHandle = TaskHandle::new();

/// Hardware and queue ends for the running task
pub static KIT: Lent<WorkerKit> = Lent::new();

/// The live capture buffer
pub static BUFFER: Lent<Buffer> = Lent::new();

/// The capture store, lent only to the replay-all task (reads only)
pub static STORE: Lent<Store> = Lent::new();

/// What a core1 task reports back to core0 for printing
#[derive(Debug, Clone, Copy)]
pub enum WorkerEvent {
    Glitch(GlitchEvent),
    Cycle(CycleReport),
    /// Replaying the given stored slot
    Replaying(u32),
    Imported(ImportReport),
    ImportEnded(ImportEnd),
    /// An engine task ended; `Ok` carries cycles or captures replayed
    Finished(Result<u32, EngineError>),
}

pub type EventProducer = Producer<'static, WorkerEvent, EVENT_QUEUE_LEN>;
pub type EventConsumer = Consumer<'static, WorkerEvent, EVENT_QUEUE_LEN>;
pub type CharProducer = Producer<'static, u8, CHAR_QUEUE_LEN>;
pub type CharConsumer = Consumer<'static, u8, CHAR_QUEUE_LEN>;

/// Core1's half of the world
pub struct WorkerKit {
    /// Shared with core0, which times the opposite glitch polarity
    pub bus: &'static BusInputs,
    pub lines: ReplayOutputs,
    pub events: EventProducer,
    pub chars: CharConsumer,
    pub capture: CaptureSettings,
    pub glitch: GlitchSettings,
    /// Import stops by itself after this many captures
    pub import_limit: u32,
}

impl WorkerKit {
    /// Queue an event; a full queue drops it
    pub fn report(&mut self, event: WorkerEvent) {
        let _ = self.events.enqueue(event);
    }
}
