//! Serial line types and the line-discipline interface.
//!
//! A serial driver pulls outgoing bytes from the transmit ring buffer owned
//! by a [`TtyPort`] and pushes received bytes, each tagged with an
//! [`RxFlag`], back into it.

use planck_noalloc::ringbuf::RingBuf;
use tether_core::sync::SpinLock;

/// Number of slots in the transmit ring buffer.
pub const XMIT_SIZE: usize = 4096;

/// The transmit ring buffer shared between the line discipline (producer,
/// advances the head) and the driver (consumer, advances the tail).
pub type XmitBuf = RingBuf<u8, XMIT_SIZE>;

// ---------------------------------------------------------------------------
// Line discipline interface
// ---------------------------------------------------------------------------

/// The line-discipline side of a serial port.
///
/// Every method is callable from any context; none may block.
pub trait TtyPort: Send + Sync {
    /// Returns `true` while a consumer has the port open.
    fn has_consumer(&self) -> bool;

    /// Returns `true` while output is stopped by software flow control
    /// (XOFF) or an explicit stop request.
    fn tx_stopped(&self) -> bool;

    /// The transmit ring buffer.
    fn xmit(&self) -> &SpinLock<XmitBuf>;

    /// Queues one received byte with its error tag. Returns `false` if the
    /// receive buffer is full and the byte was dropped.
    fn insert_char(&self, ch: u8, flag: RxFlag) -> bool;

    /// Hands everything queued by [`insert_char`](Self::insert_char) to the
    /// reader.
    fn flip_buffer_push(&self);

    /// Notifies writers that transmit ring buffer space is available.
    fn write_wakeup(&self);

    /// Offers a received byte to the magic-sysrq hook. Returns `true` if the
    /// byte was consumed and must not be delivered.
    fn handle_sysrq_char(&self, ch: u8) -> bool {
        let _ = ch;
        false
    }
}

// ---------------------------------------------------------------------------
// Receive tags and counters
// ---------------------------------------------------------------------------

/// Error tag attached to a received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxFlag {
    /// Received cleanly.
    #[default]
    Normal,
    /// Stop bit missing.
    Frame,
    /// Parity mismatch.
    Parity,
    /// Data was lost before this byte.
    Overrun,
    /// Line held in the spacing state for a whole frame.
    Break,
}

/// Per-port interrupt counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Icount {
    /// Bytes handed to the transmitter.
    pub tx: u32,
    /// Bytes taken from the receiver.
    pub rx: u32,
    /// Framing errors.
    pub frame: u32,
    /// Parity errors.
    pub parity: u32,
    /// Overruns, in the hardware FIFO or the receive buffer.
    pub overrun: u32,
    /// Break conditions.
    pub brk: u32,
}

bitflags::bitflags! {
    /// Modem control and status lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mctrl: u8 {
        /// Request To Send (output).
        const RTS = 1 << 0;
        /// Data Terminal Ready (output).
        const DTR = 1 << 1;
        /// Clear To Send (input).
        const CTS = 1 << 2;
        /// Data Set Ready (input).
        const DSR = 1 << 3;
        /// Carrier detect (input).
        const CAR = 1 << 4;
    }
}

// ---------------------------------------------------------------------------
// Line configuration
// ---------------------------------------------------------------------------

/// Character width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    /// 5 bits.
    Five,
    /// 6 bits.
    Six,
    /// 7 bits.
    Seven,
    /// 8 bits.
    Eight,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit.
    One,
    /// Two stop bits.
    Two,
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// A requested line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    /// Baud rate in bits per second.
    pub baud: u32,
    /// Character width.
    pub data_bits: DataBits,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Parity.
    pub parity: Parity,
    /// RTS/CTS hardware flow control.
    pub hw_flow: bool,
}

impl LineConfig {
    /// 8 data bits, no parity, 1 stop bit, no flow control at `baud`.
    pub const fn new_8n1(baud: u32) -> Self {
        Self {
            baud,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            hw_flow: false,
        }
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::new_8n1(9600)
    }
}
