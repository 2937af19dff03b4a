//! Receive path: hardware FIFO to line discipline.

use tether_core::{dev_err, dev_warn};
use tether_driver_api::regmap::RegisterPort;
use tether_driver_api::serial::{Icount, RxFlag, TtyPort};

use super::regs::{LSR, RHR, RX_ERRORS, RXLVL, RxErrorCode};
use super::{UartState, bump};
use crate::config::UART_RX_FIFO_SIZE;

/// Maps a per-byte error code to a flag and counts it.
fn classify(code: u8, icount: &mut Icount) -> RxFlag {
    match RxErrorCode::from_raw(code) {
        RxErrorCode::None => RxFlag::Normal,
        RxErrorCode::Framing => {
            icount.frame += 1;
            RxFlag::Frame
        }
        RxErrorCode::Parity => {
            icount.parity += 1;
            RxFlag::Parity
        }
        // The device did not service its own UART in time.
        RxErrorCode::FifoOverrun => {
            icount.overrun += 1;
            RxFlag::Overrun
        }
        RxErrorCode::Break | RxErrorCode::HwOverrun => {
            icount.brk += 1;
            RxFlag::Break
        }
    }
}

/// Drains the receive FIFO into the line discipline. Returns the number of
/// bytes delivered.
///
/// `line_errors` is the interrupt's receive-line-status indication; LSR has
/// the final say. Must be called with the port lock held.
pub(super) fn drain<R, T>(st: &mut UartState<R>, tty: &T, line_errors: bool) -> usize
where
    R: RegisterPort,
    T: TtyPort + ?Sized,
{
    let name = st.name;

    let len = match st.regs.read(RXLVL) {
        Ok(level) => usize::from(level),
        Err(err) => {
            dev_err!(name, "failed to read RXLVL: {}", err);
            return 0;
        }
    };
    if len == 0 {
        return 0;
    }
    if len > UART_RX_FIFO_SIZE {
        // The device keeps the data and raises the interrupt again.
        dev_err!(name, "invalid RXLVL value {}", len);
        return 0;
    }

    // Error codes must be fetched before the data read pops the FIFO.
    let mut errors = [0u8; UART_RX_FIFO_SIZE];
    let mut has_errors = false;
    if line_errors {
        match st.regs.read(LSR) {
            Err(err) => {
                dev_err!(name, "failed to read LSR: {}", err);
                return 0;
            }
            Ok(0) => {}
            Ok(_) => {
                if let Err(err) = st.regs.bulk_read(RX_ERRORS, &mut errors[..len]) {
                    dev_err!(name, "failed to read RX_ERRORS: {}", err);
                    return 0;
                }
                has_errors = true;
            }
        }
    }

    let mut data = [0u8; UART_RX_FIFO_SIZE];
    let mut result = st.regs.bulk_read(RHR, &mut data[..len]);
    if let Err(err) = result {
        dev_warn!(name, "failed to read RHR: {}, retrying", err);
        result = st.regs.bulk_read(RHR, &mut data[..len]);
    }

    let mut delivered = 0;
    match result {
        Err(err) => dev_err!(name, "failed to read RHR: {}", err),
        Ok(()) => {
            bump(&mut st.icount.rx, len);
            for (&ch, &code) in data[..len].iter().zip(&errors[..len]) {
                if tty.handle_sysrq_char(ch) {
                    continue;
                }
                let flag = if has_errors {
                    classify(code, &mut st.icount)
                } else {
                    RxFlag::Normal
                };
                if !tty.insert_char(ch, flag) {
                    dev_err!(name, "receive buffer full, dropping {:#04x}", ch);
                    st.icount.overrun += 1;
                    break;
                }
                delivered += 1;
            }
        }
    }

    tty.flip_buffer_push();
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockRegs, MockTty, Op, logs};
    use tether_core::log::LogLevel;

    fn state(regs: &MockRegs) -> UartState<MockRegs> {
        UartState::new("ttyT", regs.clone())
    }

    #[test]
    fn clean_drain_delivers_everything_once() {
        let regs = MockRegs::new();
        regs.load_rx(b"hello", &[]);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 5);
        assert_eq!(tty.received_bytes(), b"hello");
        assert!(tty.received().iter().all(|&(_, f)| f == RxFlag::Normal));
        assert_eq!(tty.flushes(), 1);
        assert_eq!(st.icount.rx, 5);
    }

    #[test]
    fn empty_fifo_does_nothing() {
        let regs = MockRegs::new();
        let tty = MockTty::open();
        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, true), 0);
        assert_eq!(tty.flushes(), 0);
        assert_eq!(regs.ops(), vec![Op::Read(RXLVL)]);
    }

    #[test]
    fn oversized_rxlvl_is_dropped_without_reading() {
        let regs = MockRegs::new();
        regs.set(RXLVL, 129);
        let tty = MockTty::open();
        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 0);
        assert_eq!(regs.ops(), vec![Op::Read(RXLVL)]);
        assert_eq!(tty.flushes(), 0);
    }

    #[test]
    fn errors_are_fetched_before_data() {
        let regs = MockRegs::new();
        regs.load_rx(b"abcde", &[0, 1, 2, 3, 5]);
        regs.set(LSR, 0x01);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, true), 5);
        assert_eq!(
            regs.ops(),
            vec![
                Op::Read(RXLVL),
                Op::Read(LSR),
                Op::BulkRead(RX_ERRORS, 5),
                Op::BulkRead(RHR, 5),
            ]
        );
        assert_eq!(
            tty.received(),
            vec![
                (b'a', RxFlag::Normal),
                (b'b', RxFlag::Frame),
                (b'c', RxFlag::Parity),
                (b'd', RxFlag::Overrun),
                (b'e', RxFlag::Break),
            ]
        );
        assert_eq!(st.icount.frame, 1);
        assert_eq!(st.icount.parity, 1);
        assert_eq!(st.icount.overrun, 1);
        assert_eq!(st.icount.brk, 1);
    }

    #[test]
    fn hardware_overrun_reports_as_break() {
        let regs = MockRegs::new();
        regs.load_rx(b"z", &[4]);
        regs.set(LSR, 0x02);
        let tty = MockTty::open();
        let mut st = state(&regs);
        drain(&mut st, &tty, true);
        assert_eq!(tty.received(), vec![(b'z', RxFlag::Break)]);
        assert_eq!(st.icount.brk, 1);
    }

    #[test]
    fn clear_lsr_downgrades_error_indication() {
        let regs = MockRegs::new();
        regs.load_rx(b"ok", &[1, 1]);
        regs.set(LSR, 0);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, true), 2);
        assert!(!regs.ops().contains(&Op::BulkRead(RX_ERRORS, 2)));
        assert_eq!(tty.received(), vec![(b'o', RxFlag::Normal), (b'k', RxFlag::Normal)]);
        assert_eq!(st.icount.frame, 0);
    }

    #[test]
    fn data_read_is_retried_once() {
        let regs = MockRegs::new();
        regs.load_rx(b"retry", &[]);
        regs.fail_next(RHR, 1);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 5);
        assert_eq!(tty.received_bytes(), b"retry");
        assert_eq!(
            regs.ops()
                .iter()
                .filter(|op| matches!(op, Op::BulkRead(RHR, _)))
                .count(),
            2
        );
    }

    #[test]
    fn double_read_failure_delivers_nothing_but_flushes() {
        logs::capture();
        let regs = MockRegs::new();
        regs.load_rx(b"lost", &[]);
        regs.fail_next(RHR, 2);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 0);
        assert!(tty.received().is_empty());
        assert_eq!(tty.flushes(), 1);
        assert_eq!(st.icount.rx, 0);
        assert_eq!(logs::count(LogLevel::Warn), 1);
        assert_eq!(logs::count(LogLevel::Error), 1);
    }

    #[test]
    fn full_receive_buffer_truncates_and_counts_overrun() {
        let regs = MockRegs::new();
        regs.load_rx(b"abcdef", &[]);
        let tty = MockTty::open();
        tty.limit_rx(3);

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 3);
        assert_eq!(tty.received_bytes(), b"abc");
        assert_eq!(st.icount.overrun, 1);
        assert_eq!(tty.flushes(), 1);
    }

    #[test]
    fn sysrq_bytes_are_not_delivered() {
        let regs = MockRegs::new();
        regs.load_rx(b"a!b", &[]);
        let tty = MockTty::open();
        tty.set_sysrq(b'!');

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, false), 2);
        assert_eq!(tty.received_bytes(), b"ab");
    }

    #[test]
    fn error_log_failure_aborts_without_flush() {
        let regs = MockRegs::new();
        regs.load_rx(b"abc", &[1, 1, 1]);
        regs.set(LSR, 1);
        regs.fail_next(RX_ERRORS, 1);
        let tty = MockTty::open();

        let mut st = state(&regs);
        assert_eq!(drain(&mut st, &tty, true), 0);
        assert_eq!(tty.flushes(), 0);
        assert!(!regs.ops().iter().any(|op| matches!(op, Op::BulkRead(RHR, _))));
    }
}
