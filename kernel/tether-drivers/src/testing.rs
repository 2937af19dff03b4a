//! Host-side doubles for the platform and the register bus.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether_core::sync::SpinLock;
use tether_driver_api::capability::{
    FwVersion, IrqHandler, IrqRegistrar, IrqReturn, PinAllocator, UartDescriptor,
};
use tether_driver_api::error::{BusError, BusErrorKind, DriverError};
use tether_driver_api::regmap::RegisterPort;
use tether_driver_api::serial::{RxFlag, TtyPort, XmitBuf};

use crate::bus_uart::regs::{RHR, RX_ERRORS, RXLVL};

/// A descriptor for a fully wired, supported UART.
pub fn descriptor() -> UartDescriptor {
    UartDescriptor {
        name: "ttyMCA0",
        node_present: true,
        enabled: true,
        fw_version: FwVersion::new(1, 1),
        gpio_base: 100,
        rts_pin: Some(4),
        cts_pin: Some(5),
        irq: 42,
    }
}

// ---------------------------------------------------------------------------
// Register bus
// ---------------------------------------------------------------------------

/// One recorded bus transaction, failed attempts included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read(u16),
    Write(u16, u8),
    BulkRead(u16, usize),
    BulkWrite(u16, Vec<u8>),
}

#[derive(Default)]
struct RegsInner {
    mem: HashMap<u16, u8>,
    rx_data: VecDeque<u8>,
    rx_errors: VecDeque<u8>,
    written: HashMap<u16, Vec<u8>>,
    failures: HashMap<u16, usize>,
    ops: Vec<Op>,
    delay: Option<Duration>,
}

/// Register file with a transaction log. Clones share the same device.
///
/// `RHR` and `RX_ERRORS` are backed by the queue loaded with
/// [`load_rx`](Self::load_rx); a successful `RHR` read pops it and lowers
/// `RXLVL`.
#[derive(Clone, Default)]
pub struct MockRegs {
    inner: Arc<Mutex<RegsInner>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, addr: u16, value: u8) {
        self.lock().mem.insert(addr, value);
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.lock().mem.get(&addr).copied().unwrap_or(0)
    }

    /// The next `n` transactions touching `addr` fail.
    pub fn fail_next(&self, addr: u16, n: usize) {
        self.lock().failures.insert(addr, n);
    }

    /// Places `data` in the receive FIFO. `errors` is padded with zeros.
    pub fn load_rx(&self, data: &[u8], errors: &[u8]) {
        let mut inner = self.lock();
        inner.rx_data = data.iter().copied().collect();
        inner.rx_errors = (0..data.len())
            .map(|i| errors.get(i).copied().unwrap_or(0))
            .collect();
        inner.mem.insert(RXLVL, u8::try_from(data.len()).unwrap());
    }

    /// Bytes successfully written to `addr`, in order.
    pub fn written_to(&self, addr: u16) -> Vec<u8> {
        self.lock().written.get(&addr).cloned().unwrap_or_default()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    /// Every transaction sleeps for `delay`, outside the mock's own lock.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Highest number of transactions observed in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegsInner> {
        self.inner.lock().unwrap()
    }

    /// Records `op`, simulates bus latency, and applies the injected
    /// failure for `addr` if one is armed.
    fn transact(&self, addr: u16, op: Op) -> Result<(), BusError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = {
            let mut inner = self.lock();
            inner.ops.push(op);
            inner.delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let failed = {
            let mut inner = self.lock();
            match inner.failures.get_mut(&addr) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if failed {
            Err(BusError::new(addr, BusErrorKind::Io))
        } else {
            Ok(())
        }
    }
}

impl RegisterPort for MockRegs {
    fn read(&mut self, addr: u16) -> Result<u8, BusError> {
        self.transact(addr, Op::Read(addr))?;
        Ok(self.get(addr))
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BusError> {
        self.transact(addr, Op::Write(addr, value))?;
        let mut inner = self.lock();
        inner.mem.insert(addr, value);
        inner.written.entry(addr).or_default().push(value);
        Ok(())
    }

    fn bulk_read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), BusError> {
        self.transact(addr, Op::BulkRead(addr, buf.len()))?;
        let mut inner = self.lock();
        match addr {
            RHR => {
                for slot in buf.iter_mut() {
                    *slot = inner.rx_data.pop_front().unwrap_or(0);
                    inner.rx_errors.pop_front();
                }
                let left = u8::try_from(inner.rx_data.len()).unwrap();
                inner.mem.insert(RXLVL, left);
            }
            RX_ERRORS => {
                for (slot, code) in buf.iter_mut().zip(inner.rx_errors.iter()) {
                    *slot = *code;
                }
            }
            _ => buf.fill(inner.mem.get(&addr).copied().unwrap_or(0)),
        }
        Ok(())
    }

    fn bulk_write(&mut self, addr: u16, data: &[u8]) -> Result<(), BusError> {
        self.transact(addr, Op::BulkWrite(addr, data.to_vec()))?;
        self.lock()
            .written
            .entry(addr)
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Line discipline
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TtyInner {
    tx_stopped: bool,
    received: Vec<(u8, RxFlag)>,
    rx_limit: Option<usize>,
    flushes: usize,
    wakeups: usize,
    sysrq: Option<u8>,
}

/// Line discipline that records what the driver hands it.
pub struct MockTty {
    open: bool,
    xmit: SpinLock<XmitBuf>,
    inner: Mutex<TtyInner>,
}

impl MockTty {
    pub fn open() -> Self {
        Self {
            open: true,
            xmit: SpinLock::new(XmitBuf::new()),
            inner: Mutex::new(TtyInner::default()),
        }
    }

    pub fn closed() -> Self {
        Self {
            open: false,
            ..Self::open()
        }
    }

    pub fn queue_tx(&self, data: &[u8]) {
        let mut xmit = self.xmit.lock();
        for &byte in data {
            xmit.push(byte);
        }
    }

    pub fn tx_pending(&self) -> usize {
        self.xmit.lock().len()
    }

    pub fn set_tx_stopped(&self, stopped: bool) {
        self.lock().tx_stopped = stopped;
    }

    pub fn wakeups(&self) -> usize {
        self.lock().wakeups
    }

    pub fn received(&self) -> Vec<(u8, RxFlag)> {
        self.lock().received.clone()
    }

    pub fn received_bytes(&self) -> Vec<u8> {
        self.lock().received.iter().map(|&(ch, _)| ch).collect()
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    /// Accept at most `n` more bytes.
    pub fn limit_rx(&self, n: usize) {
        self.lock().rx_limit = Some(n);
    }

    /// `ch` is swallowed by the sysrq hook.
    pub fn set_sysrq(&self, ch: u8) {
        self.lock().sysrq = Some(ch);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TtyInner> {
        self.inner.lock().unwrap()
    }
}

impl TtyPort for MockTty {
    fn has_consumer(&self) -> bool {
        self.open
    }

    fn tx_stopped(&self) -> bool {
        self.lock().tx_stopped
    }

    fn xmit(&self) -> &SpinLock<XmitBuf> {
        &self.xmit
    }

    fn insert_char(&self, ch: u8, flag: RxFlag) -> bool {
        let mut inner = self.lock();
        if let Some(limit) = inner.rx_limit.as_mut() {
            if *limit == 0 {
                return false;
            }
            *limit -= 1;
        }
        inner.received.push((ch, flag));
        true
    }

    fn flip_buffer_push(&self) {
        self.lock().flushes += 1;
    }

    fn write_wakeup(&self) {
        self.lock().wakeups += 1;
    }

    fn handle_sysrq_char(&self, ch: u8) -> bool {
        self.lock().sysrq == Some(ch)
    }
}

// ---------------------------------------------------------------------------
// Platform services
// ---------------------------------------------------------------------------

/// Interrupt registrar with one line. [`fire`](Self::fire) and
/// [`free_irq`](IrqRegistrar::free_irq) exclude each other, so a freed
/// handler is never running.
#[derive(Default)]
pub struct MockIrq {
    handler: Mutex<Option<IrqHandler>>,
    fail: Mutex<bool>,
}

impl MockIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_registration(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn is_registered(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Runs the installed handler. `None` if nothing is installed.
    pub fn fire(&self) -> Option<IrqReturn> {
        let handler = self.handler.lock().unwrap();
        handler.as_ref().map(|handler| handler())
    }
}

impl IrqRegistrar for MockIrq {
    fn request_threaded_irq(
        &self,
        _irq: u32,
        _name: &'static str,
        handler: IrqHandler,
    ) -> Result<(), DriverError> {
        if *self.fail.lock().unwrap() {
            return Err(DriverError::InitFailed);
        }
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn free_irq(&self, _irq: u32) {
        self.handler.lock().unwrap().take();
    }
}

/// GPIO allocator that records reservations.
#[derive(Default)]
pub struct MockPins {
    denied: Mutex<HashSet<u32>>,
    requested: Mutex<Vec<u32>>,
    freed: Mutex<Vec<u32>>,
}

impl MockPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests for `gpio` fail.
    pub fn deny(&self, gpio: u32) {
        self.denied.lock().unwrap().insert(gpio);
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    pub fn freed(&self) -> Vec<u32> {
        self.freed.lock().unwrap().clone()
    }
}

impl PinAllocator for MockPins {
    fn request_pin(&self, gpio: u32, _label: &'static str) -> Result<(), DriverError> {
        if self.denied.lock().unwrap().contains(&gpio) {
            return Err(DriverError::InitFailed);
        }
        self.requested.lock().unwrap().push(gpio);
        Ok(())
    }

    fn free_pin(&self, gpio: u32) {
        self.freed.lock().unwrap().push(gpio);
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Per-thread capture of everything logged through `tether_core::log`.
pub mod logs {
    use std::cell::RefCell;
    use std::fmt;
    use std::sync::Once;

    use tether_core::log::{self, LogLevel};

    static INSTALL: Once = Once::new();

    std::thread_local! {
        static LINES: RefCell<Vec<(LogLevel, String)>> = const { RefCell::new(Vec::new()) };
    }

    fn record(level: LogLevel, args: fmt::Arguments<'_>) {
        LINES.with(|lines| lines.borrow_mut().push((level, args.to_string())));
    }

    /// Starts capturing on the current thread, discarding earlier lines.
    pub fn capture() {
        INSTALL.call_once(|| {
            // SAFETY: `record` only touches thread-local storage.
            unsafe { log::set_log_fn(record) };
            log::set_max_level(LogLevel::Trace);
        });
        LINES.with(|lines| lines.borrow_mut().clear());
    }

    /// Number of captured lines at exactly `level`.
    pub fn count(level: LogLevel) -> usize {
        LINES.with(|lines| lines.borrow().iter().filter(|(l, _)| *l == level).count())
    }

    /// Drains the captured lines.
    pub fn take() -> Vec<(LogLevel, String)> {
        LINES.with(|lines| core::mem::take(&mut *lines.borrow_mut()))
    }
}
