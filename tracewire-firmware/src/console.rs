//! Operator console and core0 supervision
//!
//! Core0 owns the console, the capture store and the live buffer. Worker
//! tasks run on core1; while one runs, core0 sits in the orchestrator's
//! completion loop where it appends buffers on core1's behalf, prints what
//! core1 reports and watches the keyboard.

use core::cell::RefCell;
use core::fmt::{self, Write};

use defmt::{error, info, warn};
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Delay, Timer};
use tracewire_core::glitch::{GlitchDetector, GlitchEvent, Polarity};
use tracewire_core::{
    Completion, CycleReport, EngineError, ImportEnd, ImportReport, Orchestrator, PerformanceMode,
    PersistOutcome, StopEvery, StoreError, TaskHandle, TriggerLevel,
};
use tracewire_hal::{FlashRegion, SerialPort, WorkerEntry};
use tracewire_hal_rp2040::{Console, Core1, EmbassyClock};
use tracewire_protocol::{
    is_confirmation, write_capture, write_label, write_summary, LineEvent, LineInput, MenuCommand,
};

use crate::channels::{CharProducer, EventConsumer, WorkerEvent, WorkerKit, BUFFER, KIT, STORE};
use crate::config::{
    Buffer, Store, GLITCH_KEY_POLL_EVERY, IMPORT_PROGRESS_EVERY, INDEX_DIGITS, PERFORMANCE_SCRATCH,
};
use crate::worker;

const CTRL_C: u8 = 0x03;

/// Write to the console; a failed write is only logged
macro_rules! say {
    ($out:expr, $($arg:tt)*) => {
        if write!($out, $($arg)*).is_err() {
            warn!("console write failed");
        }
    };
}

pub type Supervisor = Orchestrator<'static, Core1, Delay>;

/// How keys are handled while a core1 task runs
#[derive(Clone, Copy, PartialEq, Eq)]
enum Keys {
    /// Any key stops the task
    StopOnAny,
    /// Keys are import text; Ctrl-C stops
    ForwardImport,
}

pub struct App {
    pub console: Console,
    pub store: Store,
    pub buffer: &'static mut Buffer,
    pub orchestrator: Supervisor,
    pub kit: WorkerKit,
    pub events: EventConsumer,
    pub chars: CharProducer,
    pub watchdog: Watchdog,
    pub mode: PerformanceMode,
}

impl App {
    /// Menu loop; never returns
    pub async fn run(mut self) -> ! {
        self.banner();
        loop {
            self.print_menu();
            let key = self.read_key().await;
            say!(self.console, "{}\r\n", printable(key));

            match MenuCommand::from_key(key) {
                Ok(command) => {
                    info!("Menu: {}", command);
                    say!(
                        self.console,
                        "You selected option {}: {}\r\n",
                        printable(key),
                        command.label()
                    );
                    self.dispatch(command).await;
                }
                Err(e) => {
                    warn!("{}", e);
                    say!(self.console, "Invalid option\r\n");
                }
            }
        }
    }

    async fn dispatch(&mut self, command: MenuCommand) {
        if command.needs_confirmation() && !self.confirm().await {
            return;
        }
        match command {
            MenuCommand::GlitchDetector => self.detect_glitches(),
            MenuCommand::CaptureReplay => self.capture_replay(),
            MenuCommand::EraseCaptures => self.erase_captures(),
            MenuCommand::ReplayAll => self.replay_all(),
            MenuCommand::Export => self.export(),
            MenuCommand::ReplayOne => self.replay_one().await,
            MenuCommand::Import => self.import(),
            MenuCommand::WipeAndReboot => self.wipe_and_reboot(),
            MenuCommand::TogglePerformance => self.toggle_performance().await,
        }
    }

    fn banner(&mut self) {
        let region = self.store.region();
        let (base, len) = (region.base(), region.len());
        say!(
            self.console,
            "\r\n\r\nTracewire v{}\r\n",
            env!("CARGO_PKG_VERSION")
        );
        say!(self.console, "Capture region flash offset: 0x{:08X}\r\n", base);
        say!(self.console, "Capture region size: {} bytes\r\n", len);
        say!(self.console, "Capture size: {} bytes\r\n", Buffer::BYTES);
        say!(
            self.console,
            "Max number of captures: {}\r\n",
            self.store.capacity()
        );
        info!(
            "Capture store at 0x{:08X}: {} of {} slots used",
            base,
            self.store.count(),
            self.store.capacity()
        );
    }

    fn print_menu(&mut self) {
        say!(
            self.console,
            "\r\n---------------------------------------------------------------\r\n"
        );
        say!(
            self.console,
            "Performance mode: {} ({} MHz)\r\n",
            mode_name(self.mode),
            self.mode.sys_clock_hz() / 1_000_000
        );
        if write_summary(&mut self.console, self.store.count()).is_err() {
            warn!("console write failed");
        }
        say!(self.console, "-\r\nOptions:\r\n");
        for command in MenuCommand::ALL {
            say!(
                self.console,
                "{}: {}\r\n",
                command.key() as char,
                command.label()
            );
        }
        say!(self.console, "Select an option: ");
    }

    async fn read_key(&mut self) -> u8 {
        loop {
            match self.console.read_key().await {
                Ok(key) => return key,
                Err(e) => warn!("Console read failed: {}", e),
            }
        }
    }

    async fn confirm(&mut self) -> bool {
        say!(
            self.console,
            "This option can delete flash content, Are you sure? [y/n]: (n)"
        );
        let key = self.read_key().await;
        say!(self.console, "{}\r\n", printable(key));
        is_confirmation(key)
    }

    /// Publish the loans for the next core1 task
    fn lend(&mut self, with_store: bool) {
        KIT.lend(&mut self.kit);
        BUFFER.lend(self.buffer);
        if with_store {
            STORE.lend(&mut self.store);
        }
    }

    /// Run `entry` on core1 until it finishes or the operator stops it
    fn supervise(&mut self, entry: WorkerEntry, keys: Keys, with_store: bool) -> Completion {
        if self.console.drain_input().is_err() {
            warn!("Console drain failed");
        }
        self.lend(with_store);
        info!("Launching core1 task");
        self.orchestrator.launch(entry);

        let Self {
            console,
            store,
            orchestrator,
            events,
            chars,
            ..
        } = self;
        let mut forwarded = 0u32;
        let completion = orchestrator.wait_for_completion(|task| {
            if !with_store {
                service_persist(store, task);
            }
            drain_events(console, events);
            match keys {
                Keys::StopOnAny => matches!(console.try_read_byte(), Ok(Some(_))),
                Keys::ForwardImport => forward_import(console, chars, &mut forwarded),
            }
        });

        drain_events(console, events);
        revoke();
        info!("Core1 task ended: {}", completion);
        completion
    }

    fn detect_glitches(&mut self) {
        let bus = self.kit.bus;
        let settings = self.kit.glitch;
        say!(
            self.console,
            "\r\npress any key to stop glitch detector\r\n"
        );
        say!(
            self.console,
            "Detecting glitch (<{}us) pulses on the clock line...\r\n",
            settings.threshold_us
        );
        if self.console.drain_input().is_err() {
            warn!("Console drain failed");
        }
        self.lend(false);
        self.orchestrator.launch(worker::glitch_main);

        // Core1 times high pulses; core0 times low pulses on the same line
        let mut detector =
            GlitchDetector::new(bus.clock_line(), EmbassyClock, Polarity::Low, settings);
        let console = RefCell::new(&mut self.console);
        let events = &mut self.events;
        // The UART and queue checks stay out of most line samples
        let mut stop = StopEvery::new(GLITCH_KEY_POLL_EVERY, || {
            let mut console = console.borrow_mut();
            drain_events(&mut **console, events);
            matches!(console.try_read_byte(), Ok(Some(_)))
        });
        detector.run(&mut stop, |glitch| {
            let mut console = console.borrow_mut();
            if print_glitch(&mut **console, glitch).is_err() {
                warn!("console write failed");
            }
        });

        self.orchestrator.quiesce();
        drain_events(&mut self.console, &mut self.events);
        revoke();
    }

    fn capture_replay(&mut self) {
        let settings = self.kit.capture;
        if settings.persist && self.store.is_full() {
            warn!("Capture store is full, captures will not be saved");
            say!(
                self.console,
                "Max number of captures reached: {}\r\n",
                self.store.capacity()
            );
        }
        say!(
            self.console,
            "\r\npress any key to stop record and play\r\n"
        );
        say!(
            self.console,
            "Capture window: {} samples ({} bytes), {} before trigger, every {} us\r\n",
            Buffer::WORDS,
            Buffer::BYTES,
            settings.pre_trigger,
            settings.sample_period_us
        );
        say!(
            self.console,
            "waiting for clock pin {} to go {}...\r\n",
            settings.layout.clock_bit,
            match settings.trigger {
                TriggerLevel::High => "high",
                TriggerLevel::Low => "low",
            }
        );
        self.supervise(worker::capture_replay_main, Keys::StopOnAny, false);
    }

    fn erase_captures(&mut self) {
        say!(
            self.console,
            "Deleting all captures... wait and be patient!\r\n"
        );
        match self.store.erase_all() {
            Ok(()) => {
                info!("Capture store erased");
                say!(self.console, "Done!\r\n");
            }
            Err(e) => {
                error!("Capture store erase failed: {}", e);
                say!(self.console, "Erase failed: {:?}\r\n", e);
            }
        }
    }

    fn replay_all(&mut self) {
        let total = self.store.count();
        if write_summary(&mut self.console, total).is_err() {
            warn!("console write failed");
        }
        if total == 0 {
            say!(self.console, "No captures stored in flash\r\n");
            return;
        }
        say!(
            self.console,
            "\r\npress any key to stop play stored\r\n"
        );
        say!(
            self.console,
            "Playing {} captures stored in flash\r\n\r\n",
            total
        );
        self.supervise(worker::replay_stored_main, Keys::StopOnAny, true);
    }

    fn export(&mut self) {
        let total = self.store.count();
        if write_summary(&mut self.console, total).is_err() {
            warn!("console write failed");
            return;
        }
        for index in 0..total {
            if let Ok(Some(_)) = self.console.try_read_byte() {
                say!(self.console, "\r\nExport stopped\r\n");
                return;
            }
            if let Err(e) = self.store.read_slot(index, self.buffer) {
                error!("Reading slot {} failed: {}", index, e);
                say!(self.console, "Reading capture {} failed: {:?}\r\n", index, e);
                return;
            }
            if self.export_slot(index).is_err() {
                warn!("console write failed");
                return;
            }
        }
        say!(self.console, "-\r\n");
    }

    fn export_slot(&mut self, index: u32) -> fmt::Result {
        write_label(&mut self.console, index)?;
        write_capture(
            &mut self.console,
            index,
            Buffer::BYTES,
            self.buffer.bytes(),
        )
    }

    async fn replay_one(&mut self) {
        loop {
            let total = self.store.count();
            if total == 0 {
                say!(self.console, "No captures stored in flash\r\n");
                return;
            }
            say!(self.console, "Press ENTER to return to main menu\r\n");
            say!(
                self.console,
                "Enter the capture index to play (0-{}): ",
                total - 1
            );
            let index = self.read_index().await;
            say!(self.console, "\r\n");

            let Some(index) = index else {
                return;
            };
            if let Err(e) = self.store.read_slot(index, self.buffer) {
                match e {
                    StoreError::IndexOutOfRange => {
                        warn!("Capture index {} out of range", index);
                        say!(self.console, "Invalid capture number\r\n");
                    }
                    _ => {
                        error!("Reading slot {} failed: {}", index, e);
                        say!(self.console, "Reading capture {} failed: {:?}\r\n", index, e);
                    }
                }
                return;
            }

            say!(
                self.console,
                "Playing capture {}, press any key to stop\r\n",
                index
            );
            self.supervise(worker::replay_buffer_main, Keys::StopOnAny, false);
        }
    }

    /// Read a decimal index; `None` for an empty or non-numeric line
    async fn read_index(&mut self) -> Option<u32> {
        let mut line = LineInput::<INDEX_DIGITS>::new();
        loop {
            let key = self.read_key().await;
            match line.feed(key) {
                LineEvent::Echo(c) => say!(self.console, "{}", c as char),
                LineEvent::Erased => say!(self.console, "\x08 \x08"),
                LineEvent::Submit => return line.parse_index(),
                LineEvent::Ignored => {}
            }
        }
    }

    fn import(&mut self) {
        self.erase_captures();
        if self.store.count() != 0 {
            return;
        }

        // Leftovers from a cancelled session
        while self.kit.chars.dequeue().is_some() {}

        let limit = self.store.capacity();
        self.kit.import_limit = limit;
        say!(
            self.console,
            "\r\nInsert (Max {}) captures, (this is slow...). Example:\r\n\
             unsigned char array_9[] = {{ 0x03, 0xEC, 0x33 }};\r\n",
            limit
        );
        say!(
            self.console,
            "End each capture with ';', send '!' to finish, Ctrl-C to cancel\r\n"
        );
        self.supervise(worker::import_main, Keys::ForwardImport, false);
        if write_summary(&mut self.console, self.store.count()).is_err() {
            warn!("console write failed");
        }
    }

    fn wipe_and_reboot(&mut self) -> ! {
        say!(
            self.console,
            "Erasing capture flash, rebooting into the USB boot ROM\r\n"
        );
        if let Err(e) = self.store.erase_all() {
            error!("Capture store erase failed: {}", e);
        }
        info!("Rebooting to USB boot");
        // SAFETY: ROM routine; it resets the chip.
        #[allow(unused_unsafe)]
        unsafe {
            embassy_rp::rom_data::reset_to_usb_boot(0, 0);
        }
        halt()
    }

    async fn toggle_performance(&mut self) {
        let next = self.mode.toggled();
        say!(self.console, "Please wait... and re-connect\r\n");
        info!("Switching to {} mode", mode_name(next));
        self.watchdog
            .set_scratch(PERFORMANCE_SCRATCH, next.to_scratch());
        Timer::after_millis(100).await;
        self.watchdog.trigger_reset();
        halt()
    }
}

fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

fn revoke() {
    KIT.revoke();
    BUFFER.revoke();
    STORE.revoke();
}

fn printable(key: u8) -> char {
    if key.is_ascii_graphic() {
        key as char
    } else {
        ' '
    }
}

fn mode_name(mode: PerformanceMode) -> &'static str {
    match mode {
        PerformanceMode::Standard => "standard",
        PerformanceMode::Boost => "boost",
    }
}

/// Append the live buffer if core1 asked for it
fn service_persist(store: &mut Store, task: &TaskHandle) {
    if !task.persist_pending() {
        return;
    }
    // SAFETY: core1 raised the request and spins until the outcome is
    // published, so it is not writing the buffer.
    let Some(buffer) = (unsafe { BUFFER.get() }) else {
        return;
    };
    match task.service_persist(store, buffer) {
        Some(PersistOutcome::Stored(slot)) => info!("Capture stored in slot {}", slot),
        Some(PersistOutcome::Rejected(StoreError::StoreFull)) => warn!("Capture store is full"),
        Some(PersistOutcome::Rejected(e)) => error!("Capture append failed: {}", e),
        None => {}
    }
}

/// Move waiting console input into the import queue; true on Ctrl-C
fn forward_import(console: &mut Console, chars: &mut CharProducer, forwarded: &mut u32) -> bool {
    while chars.ready() {
        match console.try_read_byte() {
            Ok(Some(CTRL_C)) => return true,
            Ok(Some(c)) => {
                let _ = chars.enqueue(c);
                *forwarded = forwarded.wrapping_add(1);
                if *forwarded % IMPORT_PROGRESS_EVERY == 1 {
                    say!(console, "..{}", printable(c));
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Console read failed: {}", e);
                break;
            }
        }
    }
    false
}

fn drain_events(console: &mut Console, events: &mut EventConsumer) {
    while let Some(event) = events.dequeue() {
        if print_event(console, event).is_err() {
            warn!("console write failed");
        }
    }
}

fn print_event<W: Write>(out: &mut W, event: WorkerEvent) -> fmt::Result {
    match event {
        WorkerEvent::Glitch(glitch) => print_glitch(out, glitch),
        WorkerEvent::Cycle(CycleReport { cycle, persisted }) => match persisted {
            None => write!(out, "cycle {}: replayed\r\n", cycle),
            Some(Ok(slot)) => write!(out, "\r\ncycle {}: captured saved to slot {}\r\n", cycle, slot),
            Some(Err(StoreError::StoreFull)) => write!(
                out,
                "\r\ncycle {}: captured not saved, store full\r\n",
                cycle
            ),
            Some(Err(e)) => write!(out, "\r\ncycle {}: captured not saved: {:?}\r\n", cycle, e),
        },
        WorkerEvent::Replaying(slot) => write!(out, "Playing {}\r\n", slot),
        WorkerEvent::Imported(ImportReport { capture, stored }) => {
            write!(out, "\r\n\r\nTotal imported: {} bytes\r\n", capture.bytes)?;
            if capture.dropped > 0 {
                write!(
                    out,
                    "{} bytes past the end of the capture window were dropped\r\n",
                    capture.dropped
                )?;
            }
            match stored {
                Ok(slot) => write!(out, "captured saved to flash (slot {})\r\n", slot),
                Err(e) => write!(out, "captured not saved: {:?}\r\n", e),
            }
        }
        WorkerEvent::ImportEnded(end) => match end {
            ImportEnd::Aborted => write!(out, "\r\nImport finished\r\n"),
            ImportEnd::Filled => write!(out, "\r\nAll slots filled, import finished\r\n"),
            ImportEnd::Cancelled => write!(out, "\r\nImport cancelled\r\n"),
        },
        WorkerEvent::Finished(result) => match result {
            Ok(_) => write!(out, "\r\nDone!\r\n"),
            Err(EngineError::Stopped) => write!(out, "\r\nStopped\r\n"),
            Err(EngineError::Store(e)) => write!(out, "\r\nReading capture failed: {:?}\r\n", e),
        },
    }
}

fn print_glitch<W: Write>(out: &mut W, glitch: GlitchEvent) -> fmt::Result {
    let (unit, kind) = match glitch.polarity {
        Polarity::High => ("CORE1", "positive"),
        Polarity::Low => ("CORE0", "negative"),
    };
    write!(
        out,
        "[{}] glitch {} pulse detected: {} us (or less)\r\n",
        unit, kind, glitch.duration_us
    )
}
