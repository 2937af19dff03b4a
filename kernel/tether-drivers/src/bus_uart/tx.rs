//! Transmit path: ring buffer to hardware FIFO.

use tether_core::{dev_dbg, dev_err};
use tether_driver_api::regmap::RegisterPort;
use tether_driver_api::serial::TtyPort;

use super::regs::{THR, TXLVL};
use super::{UartState, bump};
use crate::config::{UART_TX_FIFO_SIZE, UART_WAKEUP_CHARS};

/// What a drain pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TxOutcome {
    /// Nothing to do: no consumer, output stopped, or nothing queued.
    Idle,
    /// The FIFO had no usable space; the caller must schedule another pass.
    Rearm,
    /// This many bytes were taken from the ring buffer and written.
    Sent(usize),
}

/// Moves as much queued data as the transmit FIFO accepts.
///
/// Must be called with the port lock held (`st` is the locked state).
pub(super) fn drain<R, T>(st: &mut UartState<R>, tty: &T) -> TxOutcome
where
    R: RegisterPort,
    T: TtyPort + ?Sized,
{
    if !tty.has_consumer() || tty.tx_stopped() || tty.xmit().lock().is_empty() {
        return TxOutcome::Idle;
    }

    let space = match st.regs.read(TXLVL) {
        Ok(level) => usize::from(level),
        Err(err) => {
            dev_err!(st.name, "failed to read TXLVL: {}", err);
            0
        }
    };

    if space == 0 {
        dev_dbg!(st.name, "TX FIFO is full");
        return TxOutcome::Rearm;
    }
    if space > UART_TX_FIFO_SIZE {
        dev_err!(st.name, "invalid TXLVL value {}", space);
        return TxOutcome::Rearm;
    }

    let mut buf = [0u8; UART_TX_FIFO_SIZE];
    let mut count = 0;
    {
        // Only the tail moves here; the line discipline owns the head.
        let mut xmit = tty.xmit().lock();
        while count < space {
            let Some(byte) = xmit.pop() else { break };
            buf[count] = byte;
            count += 1;
        }
    }

    bump(&mut st.icount.tx, count);
    if let Err(err) = st.regs.bulk_write(THR, &buf[..count]) {
        dev_err!(st.name, "failed to write THR: {}", err);
    }

    if tty.xmit().lock().len() < UART_WAKEUP_CHARS {
        tty.write_wakeup();
    }

    TxOutcome::Sent(count)
}
