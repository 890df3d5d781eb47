//! Simulated controller and host platform for tests.
//!
//! [`SimUart`] models the register file closely enough to exercise the
//! driver: DLAB banking at offsets 0 and 1, a receive FIFO behind RBR and
//! LSR.DATA_READY, and a transmitter that can be made slow or stuck. Every
//! access is recorded in order.
//!
//! [`SimPlatform`] implements [`MmioMapper`] and [`IrqDispatch`] on top of a
//! single [`SimUart`] and lets tests raise interrupts by hand.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use muon_core::id::IrqLine;
use muon_core::sync::SpinLock;

use crate::error::DriverError;
use crate::host::{IrqDispatch, IrqHandler, MmioMapper};
use crate::mmio::RegisterWindow;
use crate::regs::{Fcr, Lcr, Lsr, reg};

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAccess {
    /// A read and the value it returned.
    Read {
        /// Register offset.
        offset: usize,
        /// Value returned.
        value: u32,
    },
    /// A write and the value written.
    Write {
        /// Register offset.
        offset: usize,
        /// Value written.
        value: u32,
    },
}

#[derive(Default)]
struct SimState {
    lcr: u32,
    ier: u32,
    dll: u32,
    dlm: u32,
    mdr1: u32,
    rx_fifo: VecDeque<u8>,
    tx: Vec<u8>,
    busy_polls: u32,
    busy_remaining: u32,
    stuck: bool,
    stick_after: Option<usize>,
    lsr_reads: usize,
    log: Vec<SimAccess>,
}

impl SimState {
    fn dlab(&self) -> bool {
        Lcr::from_bits_truncate(self.lcr).contains(Lcr::DLAB)
    }

    fn line_status(&mut self) -> u32 {
        self.lsr_reads += 1;
        let mut lsr = Lsr::empty();
        if !self.rx_fifo.is_empty() {
            lsr |= Lsr::DATA_READY;
        }
        if self.stuck {
            return lsr.bits();
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return lsr.bits();
        }
        (lsr | Lsr::THR_EMPTY | Lsr::TRANSMITTER_EMPTY).bits()
    }

    fn transmit(&mut self, value: u32) {
        self.tx.push(value.to_le_bytes()[0]);
        self.busy_remaining = self.busy_polls;
        if self.stick_after.is_some_and(|n| self.tx.len() >= n) {
            self.stuck = true;
        }
    }
}

/// A simulated OMAP-style 16550 register file.
pub struct SimUart {
    state: SpinLock<SimState>,
}

impl SimUart {
    /// Creates a controller in its reset state with an idle transmitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SpinLock::new(SimState::default()),
        }
    }

    /// Queues `byte` in the receive FIFO and raises LSR.DATA_READY.
    pub fn push_rx(&self, byte: u8) {
        self.state.lock().rx_fifo.push_back(byte);
    }

    /// Makes the transmitter report busy for `polls` LSR reads before each
    /// byte, starting with the next one.
    pub fn set_tx_busy_polls(&self, polls: u32) {
        let mut state = self.state.lock();
        state.busy_polls = polls;
        state.busy_remaining = polls;
    }

    /// Makes the transmitter never (or again) report ready.
    pub fn set_tx_stuck(&self, stuck: bool) {
        self.state.lock().stuck = stuck;
    }

    /// Sticks the transmitter once `bytes` bytes in total have been sent.
    pub fn stick_after(&self, bytes: usize) {
        self.state.lock().stick_after = Some(bytes);
    }

    /// Bytes written to THR so far.
    #[must_use]
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().tx.clone()
    }

    /// Every access made so far, in order.
    #[must_use]
    pub fn accesses(&self) -> Vec<SimAccess> {
        self.state.lock().log.clone()
    }

    /// Number of accesses made so far.
    #[must_use]
    pub fn access_count(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Forgets the recorded accesses.
    pub fn clear_accesses(&self) {
        self.state.lock().log.clear();
    }

    /// Number of LSR reads made so far.
    #[must_use]
    pub fn lsr_reads(&self) -> usize {
        self.state.lock().lsr_reads
    }

    /// The programmed divisor latch.
    #[must_use]
    pub fn divisor(&self) -> u16 {
        let state = self.state.lock();
        u16::from_le_bytes([state.dll.to_le_bytes()[0], state.dlm.to_le_bytes()[0]])
    }

    /// Current IER value.
    #[must_use]
    pub fn ier(&self) -> u32 {
        self.state.lock().ier
    }

    /// Current LCR value.
    #[must_use]
    pub fn lcr(&self) -> u32 {
        self.state.lock().lcr
    }

    /// Current MDR1 value.
    #[must_use]
    pub fn mdr1(&self) -> u32 {
        self.state.lock().mdr1
    }
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterWindow for SimUart {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state.lock();
        let value = match offset {
            reg::RBR if state.dlab() => state.dll,
            reg::RBR => state.rx_fifo.pop_front().map_or(0, u32::from),
            reg::IER if state.dlab() => state.dlm,
            reg::IER => state.ier,
            reg::LCR => state.lcr,
            reg::LSR => state.line_status(),
            reg::MDR1 => state.mdr1,
            _ => 0,
        };
        state.log.push(SimAccess::Read { offset, value });
        value
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state.lock();
        state.log.push(SimAccess::Write { offset, value });
        match offset {
            reg::THR if state.dlab() => state.dll = value,
            reg::THR => state.transmit(value),
            reg::IER if state.dlab() => state.dlm = value,
            reg::IER => state.ier = value,
            reg::FCR if Fcr::from_bits_truncate(value).contains(Fcr::CLEAR_RX) => {
                state.rx_fifo.clear();
            }
            reg::LCR => state.lcr = value,
            reg::MDR1 => state.mdr1 = value,
            _ => {}
        }
    }
}

type SharedHandler = Arc<dyn Fn() + Send + Sync>;

/// A host platform backed by one [`SimUart`].
pub struct SimPlatform {
    uart: Arc<SimUart>,
    handlers: SpinLock<Vec<(IrqLine, SharedHandler)>>,
    mapped: SpinLock<Option<(u64, usize)>>,
    fail_map: AtomicBool,
    fail_irq: AtomicBool,
}

impl SimPlatform {
    /// Creates a platform with a fresh controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            uart: Arc::new(SimUart::new()),
            handlers: SpinLock::new(Vec::new()),
            mapped: SpinLock::new(None),
            fail_map: AtomicBool::new(false),
            fail_irq: AtomicBool::new(false),
        }
    }

    /// The simulated controller.
    #[must_use]
    pub fn uart(&self) -> &Arc<SimUart> {
        &self.uart
    }

    /// Makes subsequent mappings fail.
    pub fn fail_map(&self, fail: bool) {
        self.fail_map.store(fail, Ordering::Relaxed);
    }

    /// Makes subsequent interrupt registrations fail.
    pub fn fail_irq(&self, fail: bool) {
        self.fail_irq.store(fail, Ordering::Relaxed);
    }

    /// The last range mapped, if any.
    #[must_use]
    pub fn mapped(&self) -> Option<(u64, usize)> {
        *self.mapped.lock()
    }

    /// Returns `true` if a handler is installed for `line`.
    #[must_use]
    pub fn has_handler(&self, line: IrqLine) -> bool {
        self.handlers.lock().iter().any(|(l, _)| *l == line)
    }

    /// Number of installed handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Raises `line`. Returns `false` if no handler was installed.
    ///
    /// The handler runs with the dispatch table locked, so it cannot race
    /// [`IrqDispatch::unregister`].
    pub fn fire(&self, line: IrqLine) -> bool {
        let handlers = self.handlers.lock();
        match handlers.iter().find(|(l, _)| *l == line) {
            Some((_, handler)) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Places `byte` in the receive FIFO and raises `line`.
    pub fn receive(&self, line: IrqLine, byte: u8) -> bool {
        self.uart.push_rx(byte);
        self.fire(line)
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MmioMapper for SimPlatform {
    type Window = Arc<SimUart>;

    fn map(&self, base: u64, size: usize) -> Result<Arc<SimUart>, DriverError> {
        if self.fail_map.load(Ordering::Relaxed) {
            return Err(DriverError::RegionUnavailable);
        }
        *self.mapped.lock() = Some((base, size));
        Ok(Arc::clone(&self.uart))
    }
}

impl IrqDispatch for SimPlatform {
    fn register(&self, line: IrqLine, handler: IrqHandler) -> Result<(), DriverError> {
        if self.fail_irq.load(Ordering::Relaxed) {
            return Err(DriverError::IrqUnavailable);
        }
        let mut handlers = self.handlers.lock();
        if handlers.iter().any(|(l, _)| *l == line) {
            return Err(DriverError::IrqUnavailable);
        }
        handlers.push((line, Arc::from(handler)));
        Ok(())
    }

    fn unregister(&self, line: IrqLine) {
        self.handlers.lock().retain(|(l, _)| *l != line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use core::sync::atomic::AtomicUsize;

    #[test]
    fn dlab_banks_low_registers() {
        let sim = SimUart::new();
        sim.write(reg::LCR, Lcr::DLAB.bits());
        sim.write(reg::DLL, 0x1a);
        sim.write(reg::DLM, 0x00);
        sim.write(reg::LCR, Lcr::WORD_LEN_8.bits());
        sim.write(reg::IER, 0x01);
        assert_eq!(sim.divisor(), 0x1a);
        assert_eq!(sim.ier(), 0x01);
        assert!(sim.transmitted().is_empty());
    }

    #[test]
    fn rx_fifo_and_data_ready() {
        let sim = SimUart::new();
        sim.push_rx(b'q');
        assert!(Lsr::from_bits_truncate(sim.read(reg::LSR)).contains(Lsr::DATA_READY));
        assert_eq!(sim.read(reg::RBR), u32::from(b'q'));
        assert!(!Lsr::from_bits_truncate(sim.read(reg::LSR)).contains(Lsr::DATA_READY));
    }

    #[test]
    fn fifo_clear_drops_rx() {
        let sim = SimUart::new();
        sim.push_rx(1);
        sim.write(reg::FCR, Fcr::CLEAR_RX.bits());
        assert_eq!(sim.read(reg::RBR), 0);
    }

    #[test]
    fn platform_dispatch() {
        let platform = SimPlatform::new();
        let line = IrqLine::new(72);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        platform
            .register(
                line,
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(
            platform.register(line, Box::new(|| {})),
            Err(DriverError::IrqUnavailable)
        );
        assert!(platform.fire(line));
        assert!(!platform.fire(IrqLine::new(73)));
        platform.unregister(line);
        assert!(!platform.fire(line));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(platform.handler_count(), 0);
    }
}
