//! Power-management IC.
//!
//! The PMIC is the parent of the bus UART's companion microcontroller. This
//! driver identifies it, clears the latched fault log, hands its function
//! blocks to the platform, and provides the system power-off sequence.
//! Access is strictly sequential: one bus lock, no deferred work.

pub mod regs;

use alloc::sync::Arc;
use core::fmt::{self, Write as _};

use tether_core::sync::{Mutex, SpinLock};
use tether_core::{dev_dbg, dev_err, dev_info, dev_warn, kprint};
use tether_driver_api::capability::{Cell, CellRegistrar};
use tether_driver_api::error::{BusError, DriverError};
use tether_driver_api::regmap::RegisterPort;

use self::regs::{
    BIO_CONT, BPERI_CONT, BUCK_CONF, CHIP_CONFIG_ID, CHIP_ID, CHIP_MODEL, CHIP_VARIANT,
    CONTROL_C, CONTROL_F, FAULT_LOG, FaultLog, LDO_CONF, LDO11_CONT, OTPREAD_EN, PAGE_CON,
    SHUTDOWN, T_OFFSET, VARIANT_SHIFT, Variant,
};

// ---------------------------------------------------------------------------
// Function cells
// ---------------------------------------------------------------------------

/// Parent-local interrupt numbers.
mod irq {
    pub const ONKEY: u32 = 0;
    pub const ALARM: u32 = 1;
    pub const TICK: u32 = 2;
    pub const ADC_RDY: u32 = 3;
    pub const LDO_LIM: u32 = 8;
    pub const GPI0: u32 = 13;
}

const GPIO_IRQS: [(&str, u32); 16] = [
    ("GPI0", irq::GPI0),
    ("GPI1", irq::GPI0 + 1),
    ("GPI2", irq::GPI0 + 2),
    ("GPI3", irq::GPI0 + 3),
    ("GPI4", irq::GPI0 + 4),
    ("GPI5", irq::GPI0 + 5),
    ("GPI6", irq::GPI0 + 6),
    ("GPI7", irq::GPI0 + 7),
    ("GPI8", irq::GPI0 + 8),
    ("GPI9", irq::GPI0 + 9),
    ("GPI10", irq::GPI0 + 10),
    ("GPI11", irq::GPI0 + 11),
    ("GPI12", irq::GPI0 + 12),
    ("GPI13", irq::GPI0 + 13),
    ("GPI14", irq::GPI0 + 14),
    ("GPI15", irq::GPI0 + 15),
];

/// Function blocks registered at init.
pub const CELLS: [Cell; 8] = [
    Cell {
        name: "da9063-regulators",
        compatible: "dlg,da9063-regulators",
        irqs: &[("LDO_LIM", irq::LDO_LIM)],
    },
    Cell {
        name: "da9063-leds",
        compatible: "dlg,da9063-leds",
        irqs: &[],
    },
    Cell {
        name: "da9063-watchdog",
        compatible: "dlg,da9063-watchdog",
        irqs: &[],
    },
    Cell {
        name: "da9063-hwmon",
        compatible: "dlg,da9063-hwmon",
        irqs: &[("ADC_RDY", irq::ADC_RDY)],
    },
    Cell {
        name: "da9063-onkey",
        compatible: "dlg,da9063-onkey",
        irqs: &[("ONKEY", irq::ONKEY)],
    },
    Cell {
        name: "da9063-rtc",
        compatible: "dlg,da9063-rtc",
        irqs: &[("ALARM", irq::ALARM), ("TICK", irq::TICK)],
    },
    Cell {
        name: "da9063-vibration",
        compatible: "dlg,da9063-vibration",
        irqs: &[],
    },
    Cell {
        name: "da9063-gpio",
        compatible: "dlg,da9063-gpio",
        irqs: &GPIO_IRQS,
    },
];

// ---------------------------------------------------------------------------
// Pmic
// ---------------------------------------------------------------------------

/// Identification read at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// Chip model id.
    pub model: u8,
    /// Raw revision code.
    pub variant_code: u8,
    /// Decoded revision.
    pub variant: Variant,
    /// Factory temperature offset.
    pub t_offset: u8,
    /// Fault causes latched before init cleared them.
    pub faults: FaultLog,
}

/// An initialized PMIC.
pub struct Pmic<R> {
    name: &'static str,
    regs: Mutex<R>,
    info: ChipInfo,
}

impl<R: RegisterPort + 'static> Pmic<R> {
    /// Identifies the chip, clears its fault log, registers its function
    /// cells, and installs it as the system power-off handler.
    ///
    /// Failing to clear the fault log is not fatal. If another power-off
    /// handler is already installed the PMIC still initializes.
    ///
    /// # Errors
    ///
    /// - [`DriverError::DeviceNotFound`] for a foreign model id or an
    ///   unsupported revision.
    /// - The converted bus error if an identification register cannot be
    ///   read.
    /// - The registrar's error if the cells cannot be added.
    pub fn init(
        name: &'static str,
        mut regs: R,
        cells: &dyn CellRegistrar,
        power: &PowerOffRegistry,
    ) -> Result<Arc<Self>, DriverError> {
        let faults = clear_fault_log(name, &mut regs).unwrap_or_else(|_| {
            dev_err!(name, "cannot clear fault log");
            FaultLog::empty()
        });

        let model = read_id(name, &mut regs, CHIP_ID, "chip model id")?;
        if model != CHIP_MODEL {
            dev_err!(name, "invalid chip model id: {:#04x}", model);
            return Err(DriverError::DeviceNotFound);
        }

        let variant_id = read_id(name, &mut regs, CHIP_VARIANT, "chip variant id")?;
        let variant_code = variant_id >> VARIANT_SHIFT;
        let Some(variant) = Variant::from_code(variant_code) else {
            dev_err!(name, "cannot support variant code: {:#04x}", variant_code);
            return Err(DriverError::DeviceNotFound);
        };

        let t_offset = read_id(name, &mut regs, T_OFFSET, "chip temperature offset")?;

        let info = ChipInfo {
            model,
            variant_code,
            variant,
            t_offset,
            faults,
        };
        dev_info!(
            name,
            "device detected (model-ID: {:#04x} rev-ID: {:#04x} t_offset: {:#04x})",
            model,
            variant_code,
            t_offset
        );

        if let Err(err) = cells.add_cells(name, &CELLS) {
            dev_err!(name, "cannot add function cells: {}", err);
            return Err(err);
        }

        let pmic = Arc::new(Self {
            name,
            regs: Mutex::named("Pmic.regs", regs),
            info,
        });
        if power.register(pmic.clone()).is_err() {
            dev_warn!(name, "a power-off handler is already installed");
        }
        Ok(pmic)
    }

    /// Removes the function cells added by [`init`](Self::init).
    pub fn exit(&self, cells: &dyn CellRegistrar) {
        cells.remove_cells(self.name);
    }

    /// Device name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Identification read at init.
    pub fn info(&self) -> ChipInfo {
        self.info
    }

    /// Writes a hex table of the whole register space to `out`.
    ///
    /// Sixteen registers per row with a gap after the eighth. Unimplemented
    /// registers print as `--`, failed reads as `??`.
    ///
    /// # Errors
    ///
    /// Only errors from `out`; bus failures are part of the output.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let mut bus = self.regs.lock();

        out.write_str("PMIC\t00 01 02 03 04 05 06 07     08 09 0a 0b 0c 0d 0e 0f\n")?;
        out.write_str("    \t---------------------------------------------------\n")?;

        let mut col = 0;
        for addr in PAGE_CON..=CHIP_CONFIG_ID {
            if col == 0 {
                write!(out, "{addr:#06x}:\t")?;
            }
            if regs::is_hole(addr, self.info.variant) {
                out.write_str("-- ")?;
            } else {
                match bus.read(addr) {
                    Ok(value) => write!(out, "{value:02x} ")?,
                    Err(_) => out.write_str("?? ")?,
                }
            }
            if col == 7 {
                out.write_str("    ")?;
            }
            if col == 15 {
                out.write_char('\n')?;
                col = 0;
            } else {
                col += 1;
            }
        }
        if col != 0 {
            out.write_char('\n')?;
        }
        Ok(())
    }

    /// [`dump`](Self::dump) to the console.
    pub fn log_dump(&self) {
        // The console never fails.
        let _ = self.dump(&mut Console);
    }
}

/// Reads one identification register, logging a failure.
fn read_id<R: RegisterPort>(
    name: &'static str,
    regs: &mut R,
    addr: u16,
    what: &str,
) -> Result<u8, DriverError> {
    regs.read(addr).map_err(|err| {
        dev_err!(name, "cannot read {}: {}", what, err);
        DriverError::from(err)
    })
}

/// Reads the latched fault causes and writes them back to clear them.
fn clear_fault_log<R: RegisterPort>(name: &'static str, regs: &mut R) -> Result<FaultLog, BusError> {
    let raw = regs
        .read(FAULT_LOG)
        .inspect_err(|err| dev_err!(name, "cannot read FAULT_LOG: {}", err))?;

    let faults = FaultLog::from_bits_retain(raw);
    for (cause, _) in faults.iter_names() {
        dev_dbg!(name, "fault log entry detected: {}", cause);
    }

    regs.write(FAULT_LOG, raw)
        .inspect_err(|err| dev_err!(name, "cannot reset FAULT_LOG: {}", err))?;
    Ok(faults)
}

struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        kprint!("{}", s);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Power-off
// ---------------------------------------------------------------------------

/// Something that can switch the system off.
pub trait PowerOff: Send + Sync {
    /// Starts the power-down. The caller halts afterwards.
    fn power_off(&self);
}

impl<R: RegisterPort + 'static> PowerOff for Pmic<R> {
    /// Detaches the LDO11, BIO and BPERI supplies from the sequencer so they
    /// stay up through the power-down, arms the OTP reload, and requests
    /// shutdown. Each step is attempted even if an earlier one failed.
    ///
    /// The bus lock is never released, so nothing else reaches the PMIC
    /// afterwards.
    fn power_off(&self) {
        let mut bus = self.regs.lock();

        let steps = [
            (BPERI_CONT, BUCK_CONF, 0, "BPERI_CONT"),
            (LDO11_CONT, LDO_CONF, 0, "LDO11_CONT"),
            (BIO_CONT, BUCK_CONF, 0, "BIO_CONT"),
            (CONTROL_C, OTPREAD_EN, OTPREAD_EN, "CONTROL_C"),
            (CONTROL_F, SHUTDOWN, SHUTDOWN, "CONTROL_F"),
        ];
        for (addr, mask, value, reg) in steps {
            if let Err(err) = bus.update_bits(addr, mask, value) {
                dev_err!(self.name, "power-off: cannot update {}: {}", reg, err);
            }
        }

        core::mem::forget(bus);
    }
}

/// The system's single power-off handler.
///
/// Installed once during driver init; [`power_off`](Self::power_off) is
/// called by the platform at the end of a shutdown.
pub struct PowerOffRegistry {
    handler: SpinLock<Option<Arc<dyn PowerOff>>>,
}

impl PowerOffRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            handler: SpinLock::named("PowerOffRegistry.handler", None),
        }
    }

    /// Installs `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidState`] if a handler is already
    /// installed.
    pub fn register(&self, handler: Arc<dyn PowerOff>) -> Result<(), DriverError> {
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return Err(DriverError::InvalidState);
        }
        *slot = Some(handler);
        Ok(())
    }

    /// Returns `true` once a handler is installed.
    pub fn is_registered(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Runs the installed handler.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Unsupported`] if no handler is installed.
    pub fn power_off(&self) -> Result<(), DriverError> {
        let handler = self.handler.lock().clone();
        let handler = handler.ok_or(DriverError::Unsupported)?;
        handler.power_off();
        Ok(())
    }
}

impl Default for PowerOffRegistry {
    fn default() -> Self {
        Self::new()
    }
}
