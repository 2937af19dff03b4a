//! Bus UART register map.

use bitflags::bitflags;

use crate::config::{UART_DEFAULT_BAUD, UART_MAX_BAUD, UART_MIN_BAUD};

// ---------------------------------------------------------------------------
// Register addresses
// ---------------------------------------------------------------------------

/// Configuration register 0: enables, power and wake-up.
pub const CFG0: u16 = 0x0500;
/// Configuration register 1: frame format, flow control, throttle.
pub const CFG1: u16 = 0x0501;
/// Baud rate code, see [`BaudCode`].
pub const BAUD: u16 = 0x0502;
/// Device pin used as RTS.
pub const RTSPIN: u16 = 0x0503;
/// Device pin used as CTS.
pub const CTSPIN: u16 = 0x0504;
/// Interrupt enables and FIFO resets.
pub const INTCTL: u16 = 0x0508;
/// Interrupt identification (read).
pub const IIR: u16 = 0x0509;
/// Line status summary (read).
pub const LSR: u16 = 0x050A;
/// Modem status and control.
pub const MSR: u16 = 0x050B;
/// Receive FIFO occupancy (read).
pub const RXLVL: u16 = 0x050C;
/// Transmit FIFO free space (read).
pub const TXLVL: u16 = 0x050D;
/// Transmit holding register (write, FIFO port).
pub const THR: u16 = 0x0520;
/// Receive holding register (read, FIFO port).
pub const RHR: u16 = 0x0540;
/// Per-byte receive error codes, one [`RxErrorCode`] per byte in the
/// receive FIFO, in FIFO order.
pub const RX_ERRORS: u16 = 0x0600;

// ---------------------------------------------------------------------------
// Bitflag types
// ---------------------------------------------------------------------------

bitflags! {
    /// CFG0 bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cfg0: u8 {
        /// UART block enabled.
        const ENABLE    = 1 << 0;
        /// Transmitter enabled.
        const TXEN      = 1 << 1;
        /// Receiver enabled.
        const RXEN      = 1 << 2;
        /// Power the system on when data is received.
        const PWR_ON    = 1 << 3;
        /// Wake the system from suspend when data is received.
        const WAKEUP    = 1 << 4;
    }
}

bitflags! {
    /// CFG1 bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cfg1: u8 {
        /// Two stop bits instead of one.
        const TWO_STOPBITS  = 1 << 0;
        /// Parity enabled.
        const PARITY_EN     = 1 << 1;
        /// Odd parity (with `PARITY_EN`).
        const PARITY_ODD    = 1 << 2;
        /// Automatic CTS flow control.
        const CTS_EN        = 1 << 3;
        /// Automatic RTS flow control.
        const RTS_EN        = 1 << 4;
        /// Deassert RTS until unthrottled.
        const THROTTLE      = 1 << 5;
    }
}

bitflags! {
    /// INTCTL bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntCtl: u8 {
        /// Receive-data interrupt enable.
        const RX_IE         = 1 << 0;
        /// Transmit-holding-register-empty interrupt enable.
        const TX_IE         = 1 << 1;
        /// Receive-line-status interrupt enable.
        const RLS_IE        = 1 << 2;
        /// Reset the receive FIFO (self-clearing).
        const RX_FIFO_RESET = 1 << 4;
        /// Reset the transmit FIFO (self-clearing).
        const TX_FIFO_RESET = 1 << 5;
    }
}

bitflags! {
    /// IIR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Iir: u8 {
        /// Receive data ready.
        const RHR   = 1 << 0;
        /// Transmit holding register empty.
        const THR   = 1 << 1;
        /// Receive line status event.
        const RLSE  = 1 << 2;
    }
}

bitflags! {
    /// MSR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Msr: u8 {
        /// RTS output level.
        const RTS   = 1 << 0;
        /// CTS input level.
        const CTS   = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// Enumerated register values
// ---------------------------------------------------------------------------

/// Error code stored in [`RX_ERRORS`] for each received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RxErrorCode {
    /// No error.
    None = 0,
    /// Stop bit missing.
    Framing = 1,
    /// Parity mismatch.
    Parity = 2,
    /// The device's own receive FIFO overflowed.
    FifoOverrun = 3,
    /// The UART hardware overran.
    HwOverrun = 4,
    /// Break condition.
    Break = 5,
}

impl RxErrorCode {
    /// Decodes a raw error byte; unknown codes read as [`RxErrorCode::None`].
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Framing,
            2 => Self::Parity,
            3 => Self::FifoOverrun,
            4 => Self::HwOverrun,
            5 => Self::Break,
            _ => Self::None,
        }
    }
}

/// Value written to [`BAUD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BaudCode {
    /// 1200 bps.
    B1200 = 0,
    /// 2400 bps.
    B2400 = 1,
    /// 4800 bps.
    B4800 = 2,
    /// 9600 bps.
    B9600 = 3,
    /// 19200 bps.
    B19200 = 4,
    /// 38400 bps.
    B38400 = 5,
    /// 57600 bps.
    B57600 = 6,
    /// 115200 bps.
    B115200 = 7,
    /// 230400 bps.
    B230400 = 8,
}

impl BaudCode {
    /// Every supported code, slowest first.
    pub const ALL: [Self; 9] = [
        Self::B1200,
        Self::B2400,
        Self::B4800,
        Self::B9600,
        Self::B19200,
        Self::B38400,
        Self::B57600,
        Self::B115200,
        Self::B230400,
    ];

    /// Code used when the requested rate is unsupported.
    pub const DEFAULT: Self = Self::B9600;

    /// Returns the code for an exactly supported rate.
    pub fn from_baud(baud: u32) -> Option<Self> {
        if !(UART_MIN_BAUD..=UART_MAX_BAUD).contains(&baud) {
            return None;
        }
        Self::ALL.into_iter().find(|code| code.baud() == baud)
    }

    /// Returns the rate this code selects.
    pub const fn baud(self) -> u32 {
        match self {
            Self::B1200 => 1200,
            Self::B2400 => 2400,
            Self::B4800 => 4800,
            Self::B9600 => UART_DEFAULT_BAUD,
            Self::B19200 => 19_200,
            Self::B38400 => 38_400,
            Self::B57600 => 57_600,
            Self::B115200 => 115_200,
            Self::B230400 => 230_400,
        }
    }

    /// Returns the register value.
    pub const fn raw(self) -> u8 {
        self as u8
    }
}
