//! Threaded interrupt handler.

use tether_core::dev_err;
use tether_driver_api::capability::IrqReturn;
use tether_driver_api::regmap::RegisterPort;
use tether_driver_api::serial::TtyPort;

use super::BusUart;
use super::regs::{IIR, Iir};
use super::rx;

impl<R, T> BusUart<R, T>
where
    R: RegisterPort + 'static,
    T: TtyPort + ?Sized + 'static,
{
    /// Services one interrupt. Runs in the platform's interrupt thread,
    /// which may block.
    ///
    /// Reads IIR once; receive data is drained inline, transmit is deferred
    /// to the TX work item. The interrupt is always reported as handled.
    pub(super) fn handle_irq(&self) -> IrqReturn {
        let mut guard = self.state.lock();
        if self.is_stopped() {
            return IrqReturn::Handled;
        }
        let Some(st) = guard.as_mut() else {
            return IrqReturn::Handled;
        };

        let iir = match st.regs.read(IIR) {
            Ok(raw) => Iir::from_bits_truncate(raw),
            Err(err) => {
                dev_err!(st.name, "failed to read IIR: {}", err);
                return IrqReturn::Handled;
            }
        };

        if iir.contains(Iir::RHR) {
            rx::drain(st, &*self.tty, iir.contains(Iir::RLSE));
        }
        if iir.contains(Iir::THR) {
            self.schedule_tx();
        }

        IrqReturn::Handled
    }
}
