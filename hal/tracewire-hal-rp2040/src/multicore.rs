//! Core1 control
//!
//! Reset goes through the power-on state machine: force core1 off, wait
//! for the PSM to confirm, release it so it sits in the boot ROM waiting
//! for a launch. Start launches through `spawn_core1`, which performs the
//! same reset and then the FIFO launch handshake.

use core::ptr::addr_of_mut;

use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::pac;
use embassy_rp::peripherals::CORE1;
use tracewire_hal::{WorkerEntry, WorkerUnit};

/// Core1 stack size in bytes
pub const CORE1_STACK_SIZE: usize = 8192;

static mut CORE1_STACK: Stack<CORE1_STACK_SIZE> = Stack::new();

/// Handle to the second Cortex-M0+ core
pub struct Core1 {
    _core: embassy_rp::Peri<'static, CORE1>,
}

impl Core1 {
    /// Take ownership of core1; it must not have been started elsewhere
    pub fn new(core: embassy_rp::Peri<'static, CORE1>) -> Self {
        Self { _core: core }
    }
}

impl WorkerUnit for Core1 {
    fn reset(&mut self) {
        let psm = pac::PSM;
        psm.frce_off().modify(|w| w.set_proc1(true));
        while !psm.frce_off().read().proc1() {
            cortex_m::asm::nop();
        }
        psm.frce_off().modify(|w| w.set_proc1(false));
    }

    fn start(&mut self, entry: WorkerEntry) {
        // SAFETY: core1 is held by this handle and has just been reset, so
        // nothing else uses the peripheral token or the stack.
        let core = unsafe { CORE1::steal() };
        let stack = unsafe { &mut *addr_of_mut!(CORE1_STACK) };
        spawn_core1(core, stack, move || entry());
    }
}
