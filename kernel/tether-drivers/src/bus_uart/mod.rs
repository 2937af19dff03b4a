//! UART behind a blocking register bus.
//!
//! The UART's registers live in a companion microcontroller reached over
//! I2C, so every register access is a bus transaction that blocks and may
//! fail. Nothing that touches a register may run in a context that cannot
//! block. The driver is split accordingly:
//!
//! - the threaded interrupt handler ([`irq`]) reads the interrupt
//!   identification, drains the receive FIFO inline, and defers transmit;
//! - the TX work item ([`tx`]) moves bytes from the line discipline's ring
//!   buffer into the transmit FIFO;
//! - the control work item ([`control`]) applies stop and RTS requests that
//!   arrived from non-blocking contexts as [`PendingWork`] bits;
//! - [`BusUart`] holds all mutable state behind one [`Mutex`], so exactly
//!   one bus transaction is in flight per port.
//!
//! [`Mutex`]: tether_core::sync::Mutex

mod control;
mod irq;
mod port;
mod rx;
mod tx;

pub mod regs;
pub mod termios;

use tether_driver_api::serial::{Icount, LineConfig};

pub use control::PendingWork;
pub use port::{AttachContext, BusUart};
pub use termios::{AutoFlow, FlowCaps};

/// Mutable per-port state. Only reachable through the port's lock.
pub(crate) struct UartState<R> {
    /// Device name for log lines.
    name: &'static str,
    regs: R,
    icount: Icount,
    rx_enabled: bool,
    tx_enabled: bool,
    line: LineConfig,
    auto_flow: AutoFlow,
    throttled: bool,
    power_on_rx: bool,
}

impl<R> UartState<R> {
    fn new(name: &'static str, regs: R) -> Self {
        Self {
            name,
            regs,
            icount: Icount::default(),
            rx_enabled: false,
            tx_enabled: false,
            line: LineConfig::default(),
            auto_flow: AutoFlow::empty(),
            throttled: false,
            power_on_rx: false,
        }
    }
}

/// Adds `n` to a 32-bit interrupt counter, wrapping like the hardware
/// counters it mirrors.
fn bump(counter: &mut u32, n: usize) {
    *counter = counter.wrapping_add(u32::try_from(n).unwrap_or(u32::MAX));
}
