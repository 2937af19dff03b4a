//! Deferred control requests.
//!
//! Stop and modem-control requests arrive from contexts that cannot block.
//! They are recorded as [`PendingWork`] bits and applied by the control
//! work item with at most two register updates.

use bitflags::bitflags;
use tether_core::dev_err;
use tether_driver_api::regmap::RegisterPort;

use super::UartState;
use super::regs::{INTCTL, IntCtl, MSR, Msr};

bitflags! {
    /// Requests waiting for the control work item.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PendingWork: u8 {
        /// Stop the receiver.
        const STOP_RX   = 1 << 0;
        /// Stop the transmitter.
        const STOP_TX   = 1 << 1;
        /// Assert RTS.
        const SET_RTS   = 1 << 2;
        /// Deassert RTS.
        const CLEAR_RTS = 1 << 3;
    }
}

/// Applies a drained batch of requests. Must be called with the port lock
/// held.
///
/// When both RTS requests are present, asserting wins.
pub(super) fn apply<R: RegisterPort>(st: &mut UartState<R>, work: PendingWork) {
    let mut disable = IntCtl::empty();
    let mut reset = IntCtl::empty();
    if work.contains(PendingWork::STOP_RX) {
        disable |= IntCtl::RX_IE;
        reset |= IntCtl::RX_FIFO_RESET;
    }
    if work.contains(PendingWork::STOP_TX) {
        disable |= IntCtl::TX_IE;
        reset |= IntCtl::TX_FIFO_RESET;
    }

    if !disable.is_empty() {
        match st.regs.update_bits(INTCTL, (disable | reset).bits(), reset.bits()) {
            Ok(()) => {
                if disable.contains(IntCtl::RX_IE) {
                    st.rx_enabled = false;
                }
                if disable.contains(IntCtl::TX_IE) {
                    st.tx_enabled = false;
                }
            }
            Err(err) => dev_err!(st.name, "failed to write INTCTL: {}", err),
        }
    }

    if work.intersects(PendingWork::SET_RTS | PendingWork::CLEAR_RTS) {
        let level = if work.contains(PendingWork::SET_RTS) {
            Msr::RTS
        } else {
            Msr::empty()
        };
        if let Err(err) = st.regs.update_bits(MSR, Msr::RTS.bits(), level.bits()) {
            dev_err!(st.name, "failed to write MSR: {}", err);
        }
    }
}
