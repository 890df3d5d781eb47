//! Device lifecycle: attach, I/O, detach.
//!
//! A [`ControllerHandle`] owns one controller from attach to detach. The
//! interrupt handler shares the register window and receive queue through
//! an `Arc`, so it never borrows from the handle itself.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::future::Future;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use muon_core::id::{DeviceId, IrqLine};
use muon_core::sync::SpinLock;

use crate::config::UartConfig;
use crate::error::DriverError;
use crate::host::{IrqDispatch, MmioMapper};
use crate::line::{baud_divisor, disable_interrupts, effective_baud, program_line};
use crate::mmio::RegisterWindow;
use crate::regs::{Lsr, WINDOW_BYTES, reg};
use crate::rx::{ReadOne, RxEvent, RxQueue, RxStats};
use crate::tx;

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(0);

/// Resources found by enumeration for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceResources {
    /// Physical base address of the register window.
    pub base: u64,
    /// Size of the register window in bytes.
    pub size: usize,
    /// Functional clock feeding the baud generator, in Hz.
    pub clock_hz: u32,
    /// Interrupt line the controller raises.
    pub irq: IrqLine,
}

/// State reachable from the interrupt handler.
struct Shared<W> {
    id: DeviceId,
    window: W,
    rx: RxQueue,
    detached: AtomicBool,
}

impl<W: RegisterWindow> Shared<W> {
    /// Moves one byte from RBR into the receive queue.
    ///
    /// Bounded and non-blocking: one register read, one ring push, one wake.
    #[inline]
    fn on_receive_interrupt(&self) -> RxEvent {
        if self.detached.load(Ordering::Acquire) {
            return RxEvent::Ignored;
        }
        let byte = self.window.read(reg::RBR).to_le_bytes()[0];
        self.rx.deliver(byte)
    }

    fn line_status(&self) -> Lsr {
        Lsr::from_bits_truncate(self.window.read(reg::LSR))
    }
}

/// An attached controller.
///
/// Created by [`attach`](Self::attach) and released by
/// [`detach`](Self::detach). All I/O methods take `&self`; the handle can be
/// shared between threads, with concurrent writers serialized internally.
///
/// Calling `detach` is mandatory. Dropping the handle instead masks the
/// controller's interrupts, but the handler stays registered with the
/// dispatcher and keeps the shared device state alive until the host
/// unregisters the line.
pub struct ControllerHandle<W: RegisterWindow + 'static> {
    shared: Arc<Shared<W>>,
    base: u64,
    clock_hz: u32,
    divisor: u16,
    line: IrqLine,
    /// Set while a handler is registered for `line`.
    irq: Option<IrqLine>,
    config: UartConfig,
    tx_lock: SpinLock<()>,
    poll_lock: SpinLock<()>,
    torn_down: bool,
}

impl<W: RegisterWindow + 'static> ControllerHandle<W> {
    /// Maps and programs a controller, then claims its interrupt line.
    ///
    /// Nothing is touched until the configuration and clock have been
    /// validated. If claiming the interrupt fails, the controller's
    /// interrupts are masked again and no handler is left registered.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidConfig`] for an unusable `config`.
    /// - [`DriverError::InvalidClock`] if `clock_hz` gives no valid divisor.
    /// - [`DriverError::RegionUnavailable`] if the window is too small or
    ///   cannot be mapped.
    /// - [`DriverError::IrqUnavailable`] if the interrupt line cannot be claimed.
    pub fn attach<M>(
        mmio: &M,
        irq: &dyn IrqDispatch,
        resources: DeviceResources,
        config: UartConfig,
    ) -> Result<Self, DriverError>
    where
        M: MmioMapper<Window = W> + ?Sized,
    {
        config.validate()?;
        let divisor = baud_divisor(resources.clock_hz)?;
        if resources.size < WINDOW_BYTES {
            return Err(DriverError::RegionUnavailable);
        }

        let window = mmio.map(resources.base, resources.size)?;
        program_line(&window, divisor, config.rx_interrupts);
        log::debug!(
            "uart: {:#x} programmed 8N1, divisor {divisor} ({} baud)",
            resources.base,
            effective_baud(resources.clock_hz, divisor)
        );

        let id = DeviceId::new(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(Shared {
            id,
            window,
            rx: RxQueue::new(config.rx_capacity),
            detached: AtomicBool::new(false),
        });

        let registered = if config.rx_interrupts {
            let handler_state = Arc::clone(&shared);
            let handler = Box::new(move || {
                handler_state.on_receive_interrupt();
            });
            if let Err(e) = irq.register(resources.irq, handler) {
                disable_interrupts(&shared.window);
                shared.detached.store(true, Ordering::Release);
                log::warn!("uart{id}: cannot claim {}: {e}", resources.irq);
                return Err(e);
            }
            Some(resources.irq)
        } else {
            None
        };

        log::info!(
            "uart{id}: attached at {:#x}, {}, {} receive",
            resources.base,
            resources.irq,
            if registered.is_some() { "interrupt" } else { "polled" }
        );

        Ok(Self {
            shared,
            base: resources.base,
            clock_hz: resources.clock_hz,
            divisor,
            line: resources.irq,
            irq: registered,
            config,
            tx_lock: SpinLock::new(()),
            poll_lock: SpinLock::new(()),
            torn_down: false,
        })
    }

    /// Masks the controller's interrupts, releases the interrupt line, and
    /// retires the handle.
    pub fn detach(mut self, irq: &dyn IrqDispatch) {
        disable_interrupts(&self.shared.window);
        if let Some(line) = self.irq.take() {
            irq.unregister(line);
        }
        self.shared.detached.store(true, Ordering::Release);
        self.torn_down = true;
        let stats = self.shared.rx.stats();
        log::info!(
            "uart{}: detached ({} received, {} dropped, {} unread)",
            self.shared.id,
            stats.received,
            stats.dropped,
            stats.buffered
        );
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Process-unique identifier of this device instance.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    /// Physical base address of the register window.
    #[must_use]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Programmed baud divisor.
    #[must_use]
    pub fn divisor(&self) -> u16 {
        self.divisor
    }

    /// Line rate actually produced by the divisor.
    #[must_use]
    pub fn baud_rate(&self) -> u32 {
        effective_baud(self.clock_hz, self.divisor)
    }

    /// Interrupt line from the device resources.
    #[must_use]
    pub fn irq_line(&self) -> IrqLine {
        self.line
    }

    /// Configuration the device was attached with.
    #[must_use]
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Transmit
    // -----------------------------------------------------------------------

    /// Transmits `bytes`, busy-polling the transmitter before each byte.
    ///
    /// Concurrent writers are serialized, so their output never interleaves.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::TransmitFault`] if the transmitter stays busy
    /// for the configured poll budget.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, DriverError> {
        let _tx = self.tx_lock.lock();
        log::trace!("uart{}: write {} bytes", self.shared.id, bytes.len());
        tx::transmit(
            &self.shared.window,
            bytes,
            self.config.newline,
            self.config.tx_poll_limit,
        )
    }

    /// Returns `true` if the transmit holding register is empty.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.shared.line_status().contains(Lsr::THR_EMPTY)
    }

    // -----------------------------------------------------------------------
    // Receive
    // -----------------------------------------------------------------------

    /// Returns a future that resolves to the next received byte.
    ///
    /// Resolves to [`DriverError::Interrupted`] if
    /// [`cancel_readers`](Self::cancel_readers) runs while it is pending.
    pub fn read_one(&self) -> ReadOne<'_> {
        self.shared.rx.read_one()
    }

    /// Waits for at least one byte, then drains up to `buf.len()` bytes.
    pub fn read<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<usize, DriverError>> + 'a {
        self.shared.rx.read(buf)
    }

    /// Takes the next buffered byte without waiting.
    pub fn try_read_one(&self) -> Option<u8> {
        self.shared.rx.try_read_one()
    }

    /// Returns `true` if a received byte is buffered.
    #[must_use]
    pub fn data_available(&self) -> bool {
        self.shared.rx.data_available()
    }

    /// Interrupts every read started before this call.
    ///
    /// Returns the number of suspended readers that were woken.
    pub fn cancel_readers(&self) -> usize {
        let woken = self.shared.rx.cancel_readers();
        log::debug!("uart{}: cancelled {woken} waiting readers", self.shared.id);
        woken
    }

    /// Runs the receive interrupt handler body.
    ///
    /// For hosts that dispatch interrupts themselves instead of through
    /// [`IrqDispatch`].
    pub fn on_receive_interrupt(&self) -> RxEvent {
        self.shared.on_receive_interrupt()
    }

    /// Drains the hardware receive FIFO into the ring by polling LSR.
    ///
    /// Only meaningful for devices attached with interrupt-driven receive
    /// disabled; returns 0 otherwise so it never races the handler.
    pub fn poll_receive(&self) -> usize {
        if self.irq.is_some() {
            return 0;
        }
        let _poll = self.poll_lock.lock();
        let mut moved = 0;
        while self.shared.line_status().contains(Lsr::DATA_READY) {
            match self.shared.on_receive_interrupt() {
                RxEvent::Ignored => break,
                RxEvent::Stored(_) | RxEvent::Dropped(_) => moved += 1,
            }
        }
        moved
    }

    /// Bytes lost because the ring was full.
    #[must_use]
    pub fn dropped_bytes(&self) -> usize {
        self.shared.rx.dropped()
    }

    /// Receive counters.
    #[must_use]
    pub fn rx_stats(&self) -> RxStats {
        self.shared.rx.stats()
    }

    /// Number of readers currently suspended.
    #[must_use]
    pub fn waiting_readers(&self) -> usize {
        self.shared.rx.waiting_readers()
    }
}

#[cfg(feature = "std")]
impl<W: RegisterWindow + 'static> ControllerHandle<W> {
    /// Blocks the calling thread until a byte arrives.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Interrupted`] if cancelled while waiting.
    pub fn read_one_blocking(&self) -> Result<u8, DriverError> {
        muon_core::sync::block_on(self.read_one())
    }

    /// Blocks until a byte arrives or `deadline` passes. `None` waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::TimedOut`] on expiry, without consuming data,
    /// and [`DriverError::Interrupted`] if cancelled while waiting.
    pub fn read_one_until(&self, deadline: Option<std::time::Instant>) -> Result<u8, DriverError> {
        muon_core::sync::block_on_deadline(self.read_one(), deadline)
            .unwrap_or(Err(DriverError::TimedOut))
    }

    /// Blocks for at most `timeout` waiting for a byte.
    ///
    /// # Errors
    ///
    /// See [`read_one_until`](Self::read_one_until).
    pub fn read_one_timeout(&self, timeout: std::time::Duration) -> Result<u8, DriverError> {
        self.read_one_until(std::time::Instant::now().checked_add(timeout))
    }

    /// Blocks until at least one byte arrives, then drains up to `buf.len()`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Interrupted`] if cancelled while waiting.
    pub fn read_blocking(&self, buf: &mut [u8]) -> Result<usize, DriverError> {
        muon_core::sync::block_on(self.read(buf))
    }
}

impl<W: RegisterWindow + 'static> Drop for ControllerHandle<W> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        disable_interrupts(&self.shared.window);
        self.shared.detached.store(true, Ordering::Release);
        if let Some(line) = self.irq {
            log::warn!(
                "uart{}: dropped without detach; handler for {line} left registered",
                self.shared.id
            );
        }
    }
}

impl<W: RegisterWindow + 'static> core::fmt::Write for ControllerHandle<W> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write(s.as_bytes())
            .map(|_| ())
            .map_err(|_| core::fmt::Error)
    }
}
