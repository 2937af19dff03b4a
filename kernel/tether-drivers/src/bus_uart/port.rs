//! Port object: attach, detach, and the line-discipline facing operations.

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use tether_core::sync::{AtomicFlags, Mutex, SpinLock};
use tether_core::work::{Work, WorkQueue};
use tether_core::{dev_dbg, dev_err, dev_info, dev_warn, ktrace};
use tether_driver_api::capability::{
    IrqHandler, IrqRegistrar, IrqReturn, PinAllocator, UartDescriptor,
};
use tether_driver_api::error::{BusError, DriverError};
use tether_driver_api::lifecycle::ManagedDriver;
use tether_driver_api::regmap::RegisterPort;
use tether_driver_api::serial::{Icount, LineConfig, Mctrl, TtyPort};

use super::control::{self, PendingWork};
use super::regs::{BAUD, CFG0, CFG1, CTSPIN, Cfg0, Cfg1, INTCTL, IntCtl, RTSPIN, TXLVL};
use super::termios::{self, AutoFlow, FlowCaps};
use super::tx::{self, TxOutcome};
use super::UartState;
use crate::config::{UART_DEFAULT_BAUD, UART_MIN_FW_VERSION, UART_TX_FIFO_SIZE};

/// Platform services handed to [`BusUart::attach`].
pub struct AttachContext {
    /// GPIO reservation for the RTS/CTS pins.
    pub pins: Arc<dyn PinAllocator>,
    /// Threaded interrupt registration.
    pub irq: Arc<dyn IrqRegistrar>,
    /// Queue the port's work items run on. The platform drains it from a
    /// context that may block.
    pub wq: Arc<WorkQueue>,
}

/// A UART behind a blocking register bus.
///
/// Created by [`attach`](Self::attach), torn down by
/// [`detach`](Self::detach). Every register access happens with `state`
/// locked; the non-blocking entry points ([`start_tx`](Self::start_tx),
/// [`stop_tx`](Self::stop_tx), [`stop_rx`](Self::stop_rx),
/// [`set_mctrl`](Self::set_mctrl)) only set bits and queue work.
pub struct BusUart<R, T: ?Sized> {
    name: &'static str,
    irq_line: u32,
    pub(super) state: Mutex<Option<UartState<R>>>,
    stopped: AtomicBool,
    pending: AtomicFlags<PendingWork>,
    caps: FlowCaps,
    may_wakeup: AtomicBool,
    reserved_pins: SpinLock<Vec<u32>>,
    tx_work: Arc<Work>,
    control_work: Arc<Work>,
    wq: Arc<WorkQueue>,
    irq: Arc<dyn IrqRegistrar>,
    pins: Arc<dyn PinAllocator>,
    pub(super) tty: Arc<T>,
}

impl<R, T> BusUart<R, T>
where
    R: RegisterPort + 'static,
    T: TtyPort + ?Sized + 'static,
{
    // -----------------------------------------------------------------------
    // Attach / detach
    // -----------------------------------------------------------------------

    /// Brings up the port described by `desc`.
    ///
    /// Reserves and programs the RTS/CTS pins (a direction whose pin is
    /// missing or cannot be set up simply has no hardware flow control),
    /// installs the interrupt handler, and enables the UART block.
    ///
    /// # Errors
    ///
    /// - [`DriverError::DeviceNotFound`] if the device node is absent or
    ///   disabled, or the firmware predates UART support.
    /// - The registrar's error if the interrupt cannot be claimed.
    /// - The bus error, converted, if the enable write fails.
    pub fn attach(
        mut regs: R,
        tty: Arc<T>,
        desc: &UartDescriptor,
        ctx: AttachContext,
    ) -> Result<Arc<Self>, DriverError> {
        let name = desc.name;

        if !desc.node_present || !desc.enabled {
            dev_dbg!(name, "no enabled device node");
            return Err(DriverError::DeviceNotFound);
        }
        if desc.fw_version < UART_MIN_FW_VERSION {
            dev_err!(name, "UART is not supported in firmware {}", desc.fw_version);
            return Err(DriverError::DeviceNotFound);
        }

        let mut caps = FlowCaps::empty();
        let mut reserved = Vec::new();
        let lines = [
            (desc.rts_pin, RTSPIN, FlowCaps::RTS, "UART RTS"),
            (desc.cts_pin, CTSPIN, FlowCaps::CTS, "UART CTS"),
        ];
        for (pin, reg, cap, label) in lines {
            let Some(pin) = pin else {
                dev_dbg!(name, "no {} pin provided", label);
                continue;
            };
            let gpio = desc.gpio_base + u32::from(pin);
            if let Err(err) = ctx.pins.request_pin(gpio, label) {
                dev_err!(name, "failed to allocate {} pin: {}", label, err);
                continue;
            }
            reserved.push(gpio);
            match regs.write(reg, pin) {
                Ok(()) => caps |= cap,
                Err(err) => dev_err!(name, "failed to program {} pin: {}", label, err),
            }
        }

        let port = Arc::new_cyclic(|weak: &Weak<Self>| {
            let tx_port = weak.clone();
            let control_port = weak.clone();
            Self {
                name,
                irq_line: desc.irq,
                state: Mutex::named("BusUart.state", Some(UartState::new(name, regs))),
                stopped: AtomicBool::new(false),
                pending: AtomicFlags::new(),
                caps,
                may_wakeup: AtomicBool::new(false),
                reserved_pins: SpinLock::named("BusUart.reserved_pins", reserved),
                tx_work: Work::new("bus_uart.tx", move || {
                    if let Some(port) = tx_port.upgrade() {
                        port.run_tx_work();
                    }
                }),
                control_work: Work::new("bus_uart.control", move || {
                    if let Some(port) = control_port.upgrade() {
                        port.run_control_work();
                    }
                }),
                wq: ctx.wq,
                irq: ctx.irq,
                pins: ctx.pins,
                tty,
            }
        });

        let irq_port = Arc::downgrade(&port);
        let handler: IrqHandler = Arc::new(move || {
            irq_port
                .upgrade()
                .map_or(IrqReturn::None, |port| port.handle_irq())
        });
        if let Err(err) = port.irq.request_threaded_irq(desc.irq, name, handler) {
            dev_err!(name, "failed to register IRQ {}: {}", desc.irq, err);
            port.release_pins();
            return Err(err);
        }

        if let Err(err) = port.with_regs(|st| st.regs.write(CFG0, Cfg0::ENABLE.bits())) {
            dev_err!(name, "failed to enable UART: {}", err);
            port.stopped.store(true, Ordering::Release);
            port.irq.free_irq(desc.irq);
            port.release_pins();
            return Err(err);
        }

        dev_info!(name, "registered (flow control caps {:?})", caps);
        Ok(port)
    }

    /// Tears the port down and hands the register port back.
    ///
    /// Marks the port stopped, removes the interrupt handler, cancels both
    /// work items and waits for any run in progress, then releases the pins.
    /// Returns `None` if the port was already detached.
    ///
    /// Must not be called from one of the port's own work items.
    pub fn detach(&self) -> Option<R> {
        self.stopped.store(true, Ordering::Release);
        self.irq.free_irq(self.irq_line);
        self.wq.cancel_sync(&self.tx_work);
        self.wq.cancel_sync(&self.control_work);
        self.pending.take();
        self.release_pins();

        let st = self.state.lock().take()?;
        dev_info!(self.name, "detached");
        Some(st.regs)
    }

    // -----------------------------------------------------------------------
    // Non-blocking entry points
    // -----------------------------------------------------------------------

    /// Data is waiting in the transmit ring buffer.
    pub fn start_tx(&self) {
        self.schedule_tx();
    }

    /// Stops the transmitter.
    pub fn stop_tx(&self) {
        self.request(PendingWork::STOP_TX);
    }

    /// Stops the receiver.
    pub fn stop_rx(&self) {
        self.request(PendingWork::STOP_RX);
    }

    /// Drives RTS from `mctrl`. Other lines are not controllable.
    pub fn set_mctrl(&self, mctrl: Mctrl) {
        if mctrl.contains(Mctrl::RTS) {
            self.request(PendingWork::SET_RTS);
        } else {
            self.request(PendingWork::CLEAR_RTS);
        }
    }

    /// Modem status. The input lines cannot be read without blocking, and
    /// DCD/DSR are not wired, so DSR and CAR always read as asserted.
    pub fn get_mctrl(&self) -> Mctrl {
        Mctrl::DSR | Mctrl::CAR
    }

    /// Break generation is not supported by the hardware.
    pub fn break_ctl(&self, on: bool) {
        dev_dbg!(self.name, "break_ctl({})", on);
        dev_warn!(self.name, "BREAK condition not supported");
    }

    // -----------------------------------------------------------------------
    // Blocking operations
    // -----------------------------------------------------------------------

    /// Opens the port: enables both directions, resets both FIFOs, and
    /// enables the receive, transmit and line-status interrupts.
    ///
    /// Requests already queued for the control work item stay queued and
    /// are applied when it runs.
    ///
    /// # Errors
    ///
    /// Returns the converted bus error, or [`DriverError::InvalidState`]
    /// after detach.
    pub fn startup(&self) -> Result<(), DriverError> {
        dev_dbg!(self.name, "startup");
        self.with_regs(|st| {
            let name = st.name;
            let enables = (Cfg0::TXEN | Cfg0::RXEN).bits();
            st.regs
                .update_bits(CFG0, enables, enables)
                .inspect_err(|err| dev_err!(name, "failed to write CFG0: {}", err))?;

            let ints = IntCtl::RX_IE
                | IntCtl::TX_IE
                | IntCtl::RLS_IE
                | IntCtl::RX_FIFO_RESET
                | IntCtl::TX_FIFO_RESET;
            st.regs
                .update_bits(INTCTL, ints.bits(), ints.bits())
                .inspect_err(|err| dev_err!(name, "failed to write INTCTL: {}", err))?;

            st.rx_enabled = true;
            st.tx_enabled = true;
            Ok(())
        })
    }

    /// Closes the port: disables both directions and all interrupts, resets
    /// the FIFOs, then cancels both work items and waits for them.
    pub fn shutdown(&self) {
        dev_dbg!(self.name, "shutdown");
        self.with_state(|st| {
            let enables = (Cfg0::TXEN | Cfg0::RXEN).bits();
            if let Err(err) = st.regs.update_bits(CFG0, enables, 0) {
                dev_err!(st.name, "failed to write CFG0: {}", err);
            }
            let resets = IntCtl::RX_FIFO_RESET | IntCtl::TX_FIFO_RESET;
            if let Err(err) = st.regs.write(INTCTL, resets.bits()) {
                dev_err!(st.name, "failed to write INTCTL: {}", err);
            }
            st.rx_enabled = false;
            st.tx_enabled = false;
        });
        self.wq.cancel_sync(&self.tx_work);
        self.wq.cancel_sync(&self.control_work);
    }

    /// Returns `true` if the transmit FIFO is completely empty. A failed
    /// read reports empty.
    pub fn tx_empty(&self) -> bool {
        self.with_state(|st| match st.regs.read(TXLVL) {
            Ok(space) => usize::from(space) == UART_TX_FIFO_SIZE,
            Err(err) => {
                dev_err!(st.name, "failed to read TXLVL: {}", err);
                true
            }
        })
        .unwrap_or(true)
    }

    /// Applies a line configuration and returns the one in effect.
    ///
    /// Unsupported parts are masked (see [`termios::sanitize`]); an
    /// unsupported baud rate selects the default rate with a warning.
    ///
    /// # Errors
    ///
    /// Returns the converted bus error if a register write fails, or
    /// [`DriverError::InvalidState`] after detach.
    pub fn set_termios(&self, requested: &LineConfig) -> Result<LineConfig, DriverError> {
        let cfg = termios::sanitize(requested, self.caps);
        let settings = termios::translate(&cfg, self.caps);

        self.with_regs(|st| {
            let name = st.name;
            if let Some(baud) = settings.fallback_from {
                dev_warn!(
                    name,
                    "baud rate {} not supported, using default {}",
                    baud,
                    UART_DEFAULT_BAUD
                );
            }

            let mut cfg1 = settings.cfg1;
            if st.throttled {
                cfg1 |= Cfg1::THROTTLE;
            }
            st.regs
                .write(CFG1, cfg1.bits())
                .inspect_err(|err| dev_err!(name, "failed to write CFG1: {}", err))?;
            st.regs
                .write(BAUD, settings.baud.raw())
                .inspect_err(|err| dev_err!(name, "failed to write BAUD: {}", err))?;

            st.auto_flow = settings.auto_flow;
            st.line = settings.effective(&cfg);
            Ok(st.line)
        })
    }

    /// Asks the remote end to pause by holding RTS deasserted.
    pub fn throttle(&self) {
        self.set_throttle(true);
    }

    /// Releases a previous [`throttle`](Self::throttle).
    pub fn unthrottle(&self) {
        self.set_throttle(false);
    }

    fn set_throttle(&self, on: bool) {
        dev_dbg!(self.name, "throttle({})", on);
        self.with_state(|st| {
            let value = if on { Cfg1::THROTTLE.bits() } else { 0 };
            match st.regs.update_bits(CFG1, Cfg1::THROTTLE.bits(), value) {
                Ok(()) => st.throttled = on,
                Err(err) => dev_err!(st.name, "failed to write CFG1: {}", err),
            }
        });
    }

    /// Sets whether received data powers the system on.
    ///
    /// # Errors
    ///
    /// Returns the converted bus error, or [`DriverError::InvalidState`]
    /// after detach.
    pub fn set_power_on_rx(&self, enable: bool) -> Result<(), DriverError> {
        self.with_regs(|st| {
            let name = st.name;
            st.power_on_rx = enable;
            let value = if enable { Cfg0::PWR_ON.bits() } else { 0 };
            st.regs
                .update_bits(CFG0, Cfg0::PWR_ON.bits(), value)
                .inspect_err(|err| dev_err!(name, "failed to write CFG0: {}", err))
        })
    }

    /// Returns whether received data powers the system on.
    pub fn power_on_rx(&self) -> bool {
        self.with_state(|st| st.power_on_rx).unwrap_or(false)
    }

    /// Sets whether received data may wake the system from suspend. Takes
    /// effect at the next [`ManagedDriver::suspend`].
    pub fn set_may_wakeup(&self, enable: bool) {
        self.may_wakeup.store(enable, Ordering::Relaxed);
    }

    /// Returns the wake-up setting.
    pub fn may_wakeup(&self) -> bool {
        self.may_wakeup.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Device name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Flow-control directions that have a working pin.
    pub fn flow_caps(&self) -> FlowCaps {
        self.caps
    }

    /// Snapshot of the interrupt counters.
    pub fn icount(&self) -> Icount {
        self.with_state(|st| st.icount).unwrap_or_default()
    }

    /// The line configuration last applied successfully.
    pub fn line_config(&self) -> LineConfig {
        self.with_state(|st| st.line).unwrap_or_default()
    }

    /// Automatic flow control currently programmed.
    pub fn auto_flow(&self) -> AutoFlow {
        self.with_state(|st| st.auto_flow).unwrap_or_default()
    }

    /// Returns `true` while the receiver is enabled.
    pub fn rx_enabled(&self) -> bool {
        self.with_state(|st| st.rx_enabled).unwrap_or(false)
    }

    /// Returns `true` while the transmitter is enabled.
    pub fn tx_enabled(&self) -> bool {
        self.with_state(|st| st.tx_enabled).unwrap_or(false)
    }

    /// Returns `true` once [`detach`](Self::detach) has started.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Runs `f` on the locked state unless the port is stopped.
    fn with_state<U>(&self, f: impl FnOnce(&mut UartState<R>) -> U) -> Option<U> {
        let mut guard = self.state.lock();
        if self.is_stopped() {
            return None;
        }
        guard.as_mut().map(f)
    }

    /// [`with_state`](Self::with_state) for fallible register sequences.
    fn with_regs<U>(
        &self,
        f: impl FnOnce(&mut UartState<R>) -> Result<U, BusError>,
    ) -> Result<U, DriverError> {
        match self.with_state(f) {
            Some(result) => result.map_err(DriverError::from),
            None => Err(DriverError::InvalidState),
        }
    }

    pub(super) fn schedule_tx(&self) {
        if !self.is_stopped() {
            self.wq.queue(&self.tx_work);
        }
    }

    fn request(&self, work: PendingWork) {
        if self.is_stopped() {
            return;
        }
        self.pending.insert(work);
        self.wq.queue(&self.control_work);
    }

    fn run_tx_work(&self) {
        match self.with_state(|st| tx::drain(st, &*self.tty)) {
            Some(TxOutcome::Rearm) => self.schedule_tx(),
            Some(TxOutcome::Sent(n)) => ktrace!("{}: sent {} bytes", self.name, n),
            Some(TxOutcome::Idle) | None => {}
        }
    }

    fn run_control_work(&self) {
        self.with_state(|st| {
            let work = self.pending.take();
            if !work.is_empty() {
                control::apply(st, work);
            }
        });
    }

    fn release_pins(&self) {
        let pins = core::mem::take(&mut *self.reserved_pins.lock());
        for gpio in pins {
            self.pins.free_pin(gpio);
        }
    }
}

impl<R, T> ManagedDriver for BusUart<R, T>
where
    R: RegisterPort + 'static,
    T: TtyPort + ?Sized + 'static,
{
    /// Programs the wake-on-receive bit from [`BusUart::may_wakeup`]. A bus
    /// failure is logged and does not abort the suspend.
    fn suspend(&self) -> Result<(), DriverError> {
        let value = if self.may_wakeup() {
            Cfg0::WAKEUP.bits()
        } else {
            0
        };
        self.with_state(|st| {
            if let Err(err) = st.regs.update_bits(CFG0, Cfg0::WAKEUP.bits(), value) {
                dev_err!(st.name, "failed to write CFG0: {}", err);
            }
        });
        Ok(())
    }

    fn shutdown(&self) {
        BusUart::shutdown(self);
    }
}
