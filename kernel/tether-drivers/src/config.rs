//! Driver configuration.
//!
//! Compile-time constants shared by the drivers.

use tether_driver_api::capability::FwVersion;

// ---------------------------------------------------------------------------
// Bus UART
// ---------------------------------------------------------------------------

/// Hardware receive FIFO depth; also the RX staging buffer size.
pub const UART_RX_FIFO_SIZE: usize = 128;

/// Hardware transmit FIFO depth; also the TX staging buffer size.
pub const UART_TX_FIFO_SIZE: usize = 128;

/// Oldest firmware with a working UART.
pub const UART_MIN_FW_VERSION: FwVersion = FwVersion::new(1, 1);

/// Writers are woken once fewer than this many bytes wait for transmission.
pub const UART_WAKEUP_CHARS: usize = 256;

/// Baud rate used when the requested one is not supported.
pub const UART_DEFAULT_BAUD: u32 = 9600;

/// Lowest supported baud rate.
pub const UART_MIN_BAUD: u32 = 1200;

/// Highest supported baud rate.
pub const UART_MAX_BAUD: u32 = 230_400;
