//! PMIC register map.

use bitflags::bitflags;

// ---------------------------------------------------------------------------
// Register addresses
// ---------------------------------------------------------------------------

/// Page control; first register of the dumpable space.
pub const PAGE_CON: u16 = 0x000;
/// Latched causes of the last power-down. Write back to clear.
pub const FAULT_LOG: u16 = 0x005;
/// System control C (OTP reload).
pub const CONTROL_C: u16 = 0x010;
/// System control F (shutdown request).
pub const CONTROL_F: u16 = 0x013;
/// I/O buck control.
pub const BIO_CONT: u16 = 0x024;
/// Peripheral buck control.
pub const BPERI_CONT: u16 = 0x025;
/// LDO11 control.
pub const LDO11_CONT: u16 = 0x030;
/// Power sequencer control.
pub const SEQ: u16 = 0x081;
/// Last register of the automatic ADC block.
pub const AUTO3_LOW: u16 = 0x0B1;
/// OTP read counter, first register of the OTP page.
pub const OTP_COUNT: u16 = 0x101;
/// Factory temperature offset.
pub const T_OFFSET: u16 = 0x104;
/// Chip model id.
pub const CHIP_ID: u16 = 0x181;
/// Chip variant; the revision sits in the high nibble.
pub const CHIP_VARIANT: u16 = 0x182;
/// Configuration id; last register of the dumpable space.
pub const CHIP_CONFIG_ID: u16 = 0x184;

/// Expected [`CHIP_ID`] value.
pub const CHIP_MODEL: u8 = 0x61;

/// Shift of the revision code within [`CHIP_VARIANT`].
pub const VARIANT_SHIFT: u8 = 4;

// ---------------------------------------------------------------------------
// Bits
// ---------------------------------------------------------------------------

bitflags! {
    /// [`FAULT_LOG`] causes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultLog: u8 {
        /// Watchdog timeout.
        const TWD_ERROR = 1 << 0;
        /// Power-on reset.
        const POR       = 1 << 1;
        /// Supply dropped below the fault threshold.
        const VDD_FAULT = 1 << 2;
        /// Supply below the start threshold.
        const VDD_START = 1 << 3;
        /// Junction over-temperature.
        const TEMP_CRIT = 1 << 4;
        /// Long press of the on-key.
        const KEY_RESET = 1 << 5;
        /// nSHUTDOWN pin asserted.
        const NSHUTDOWN = 1 << 6;
        /// Shutdown after the wait timer.
        const WAIT_SHUT = 1 << 7;
    }
}

/// Buck follows the power sequencer (in `*_CONT` buck registers).
pub const BUCK_CONF: u8 = 1 << 3;
/// LDO follows the power sequencer (in `*_CONT` LDO registers).
pub const LDO_CONF: u8 = 1 << 3;
/// Reload OTP settings on the next power-up (in [`CONTROL_C`]).
pub const OTPREAD_EN: u8 = 1 << 7;
/// Enter power-down (in [`CONTROL_F`]).
pub const SHUTDOWN: u8 = 1 << 1;

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Silicon revision. The RTC and general-purpose ID blocks moved between
/// revisions, so the register holes differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Revision AD.
    Ad,
    /// Revision BB or later.
    Bb,
}

impl Variant {
    const AD: u8 = 0x3;
    const BB: u8 = 0x5;

    /// Decodes the revision code (already shifted). Codes between AD and
    /// BB, and below AD, are unsupported.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            Self::AD => Some(Self::Ad),
            c if c >= Self::BB => Some(Self::Bb),
            _ => None,
        }
    }

    /// Last RTC alarm register.
    pub const fn second_d(self) -> u16 {
        match self {
            Self::Ad => 0x04E,
            Self::Bb => 0x04F,
        }
    }

    /// Last general-purpose ID register.
    pub const fn gp_id_19(self) -> u16 {
        match self {
            Self::Ad => 0x133,
            Self::Bb => 0x134,
        }
    }
}

/// Returns `true` if `addr` is unimplemented on `variant` and must not be
/// read.
pub const fn is_hole(addr: u16, variant: Variant) -> bool {
    (addr > variant.second_d() && addr < SEQ - 1)
        || (addr > AUTO3_LOW && addr < OTP_COUNT - 1)
        || (addr > variant.gp_id_19() && addr < CHIP_ID - 1)
}
