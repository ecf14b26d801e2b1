//! Tracewire - Two-Wire Bus Capture & Replay Firmware
//!
//! Main firmware binary for RP2040 boards. Core0 runs the operator console
//! on the embassy executor and owns flash; core1 runs one capture, replay,
//! glitch or import task at a time and is reset between tasks.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::clocks::ClockConfig;
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_rp::watchdog::Watchdog;
use embassy_rp::{bind_interrupts, pac};
use embassy_time::Delay;
use heapless::spsc::Queue;
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

use tracewire_core::{CaptureSettings, GlitchSettings, Orchestrator, PerformanceMode};
use tracewire_hal_rp2040::{replay_outputs, BusInputs, CaptureRegion, Console, Core1};

use crate::channels::{WorkerEvent, WorkerKit, TASK};
use crate::config::*;
use crate::console::App;

mod channels;
mod config;
mod console;
mod handoff;
mod worker;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Zero-initialised statics, placed in .bss rather than built on the stack
static TX_BUF: ConstStaticCell<[u8; CONSOLE_TX_BUF]> = ConstStaticCell::new([0; CONSOLE_TX_BUF]);
static RX_BUF: ConstStaticCell<[u8; CONSOLE_RX_BUF]> = ConstStaticCell::new([0; CONSOLE_RX_BUF]);
static CAPTURE: ConstStaticCell<Buffer> = ConstStaticCell::new(Buffer::new());
static EVENTS: ConstStaticCell<Queue<WorkerEvent, EVENT_QUEUE_LEN>> =
    ConstStaticCell::new(Queue::new());
static CHARS: ConstStaticCell<Queue<u8, CHAR_QUEUE_LEN>> = ConstStaticCell::new(Queue::new());

static BUS: StaticCell<BusInputs> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    // The mode survives the watchdog reboot in a scratch register, so it has
    // to be read before the clocks are configured.
    let scratch = match PERFORMANCE_SCRATCH {
        0 => pac::WATCHDOG.scratch0(),
        1 => pac::WATCHDOG.scratch1(),
        2 => pac::WATCHDOG.scratch2(),
        3 => pac::WATCHDOG.scratch3(),
        4 => pac::WATCHDOG.scratch4(),
        5 => pac::WATCHDOG.scratch5(),
        6 => pac::WATCHDOG.scratch6(),
        7 => pac::WATCHDOG.scratch7(),
        _ => core::panic!("invalid watchdog scratch index"),
    };
    let mode = PerformanceMode::from_scratch(scratch.read());

    let p = embassy_rp::init(rp_config(mode));
    info!(
        "Tracewire firmware starting ({} mode, {} Hz)",
        mode,
        mode.sys_clock_hz()
    );

    // Console on UART0 (GPIO 16 TX, GPIO 17 RX)
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = CONSOLE_BAUD;
    let uart = Uart::new_blocking(p.UART0, p.PIN_16, p.PIN_17, uart_config);
    let uart = uart.into_buffered(Irqs, TX_BUF.take(), RX_BUF.take());
    let (tx, rx) = uart.split();
    let console = Console::new(tx, rx);
    info!("Console UART initialized");

    // Bus taps and replay outputs; pins must match config::BUS_LAYOUT
    let bus: &'static BusInputs = BUS.init(BusInputs::new(
        p.PIN_20.into(),
        p.PIN_21.into(),
        DATA_PIN,
        CLOCK_PIN,
    ));
    let lines = replay_outputs(p.PIN_0.into(), p.PIN_1.into());
    info!(
        "Bus on GPIO {}/{}, replay on GPIO {}/{}",
        DATA_PIN, CLOCK_PIN, REPLAY_DATA_PIN, REPLAY_CLOCK_PIN
    );

    let store = match CaptureRegion::new(p.FLASH) {
        Ok(region) => match Store::new(region) {
            Ok(store) => store,
            Err(e) => defmt::panic!("Capture store unusable: {}", e),
        },
        Err(e) => defmt::panic!("Capture region unusable: {}", e),
    };
    info!(
        "Capture store mounted: {} of {} slots used",
        store.count(),
        store.capacity()
    );

    let (event_tx, event_rx) = EVENTS.take().split();
    let (char_tx, char_rx) = CHARS.take().split();

    let kit = WorkerKit {
        bus,
        lines,
        events: event_tx,
        chars: char_rx,
        capture: CaptureSettings {
            layout: BUS_LAYOUT,
            ..CaptureSettings::default()
        },
        glitch: GlitchSettings::default(),
        import_limit: store.capacity(),
    };

    let mut orchestrator = Orchestrator::new(Core1::new(p.CORE1), Delay, &TASK, worker::park);
    orchestrator.quiesce();
    info!("Core1 parked");

    let app = App {
        console,
        store,
        buffer: CAPTURE.take(),
        orchestrator,
        kit,
        events: event_rx,
        chars: char_tx,
        watchdog: Watchdog::new(p.WATCHDOG),
        mode,
    };
    app.run().await
}

/// Clock tree for the persisted performance mode
///
/// Both modes run the 12 MHz crystal through the system PLL at a 1500 MHz
/// VCO; boost halves the second post divider.
fn rp_config(mode: PerformanceMode) -> embassy_rp::config::Config {
    let mut clocks = ClockConfig::crystal(12_000_000);
    if mode == PerformanceMode::Boost {
        if let Some(pll) = clocks.xosc.as_mut().and_then(|x| x.sys_pll.as_mut()) {
            pll.post_div2 = 1;
        }
    }
    embassy_rp::config::Config::new(clocks)
}
