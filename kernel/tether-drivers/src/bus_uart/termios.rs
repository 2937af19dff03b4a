//! Line configuration translation.
//!
//! Turns a [`LineConfig`] into the CFG1 and BAUD register values. Pure: the
//! session writes the registers and emits the diagnostics.

use bitflags::bitflags;
use tether_driver_api::serial::{DataBits, LineConfig, Parity, StopBits};

use super::regs::{BaudCode, Cfg1};

bitflags! {
    /// Flow-control directions backed by a reserved pin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlowCaps: u8 {
        /// RTS output is wired.
        const RTS = 1 << 0;
        /// CTS input is wired.
        const CTS = 1 << 1;
    }
}

bitflags! {
    /// Automatic flow control the hardware is performing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AutoFlow: u8 {
        /// The transmitter pauses while CTS is deasserted.
        const AUTO_CTS = 1 << 0;
        /// RTS follows receive FIFO occupancy.
        const AUTO_RTS = 1 << 1;
    }
}

/// Register values for one line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Line bits of CFG1.
    pub cfg1: Cfg1,
    /// Baud code to program.
    pub baud: BaudCode,
    /// The unsupported rate that was replaced by [`BaudCode::DEFAULT`].
    pub fallback_from: Option<u32>,
    /// Automatic flow control that becomes active.
    pub auto_flow: AutoFlow,
}

impl LineSettings {
    /// The configuration actually in effect, for reporting back to the
    /// line discipline.
    pub fn effective(&self, requested: &LineConfig) -> LineConfig {
        LineConfig {
            baud: self.baud.baud(),
            ..*requested
        }
    }
}

/// Masks the parts of `cfg` the hardware cannot do: only 8 data bits exist,
/// and hardware flow control needs at least one wired direction.
pub fn sanitize(cfg: &LineConfig, caps: FlowCaps) -> LineConfig {
    LineConfig {
        data_bits: DataBits::Eight,
        hw_flow: cfg.hw_flow && !caps.is_empty(),
        ..*cfg
    }
}

/// Translates a sanitized configuration into register values.
///
/// Hardware flow control is enabled per direction only when `caps` has that
/// direction. An unsupported baud rate selects [`BaudCode::DEFAULT`] and
/// reports the rejected rate in [`LineSettings::fallback_from`].
pub fn translate(cfg: &LineConfig, caps: FlowCaps) -> LineSettings {
    let mut cfg1 = Cfg1::empty();
    let mut auto_flow = AutoFlow::empty();

    if cfg.stop_bits == StopBits::Two {
        cfg1 |= Cfg1::TWO_STOPBITS;
    }
    match cfg.parity {
        Parity::None => {}
        Parity::Even => cfg1 |= Cfg1::PARITY_EN,
        Parity::Odd => cfg1 |= Cfg1::PARITY_EN | Cfg1::PARITY_ODD,
    }
    if cfg.hw_flow {
        if caps.contains(FlowCaps::CTS) {
            cfg1 |= Cfg1::CTS_EN;
            auto_flow |= AutoFlow::AUTO_CTS;
        }
        if caps.contains(FlowCaps::RTS) {
            cfg1 |= Cfg1::RTS_EN;
            auto_flow |= AutoFlow::AUTO_RTS;
        }
    }

    let (baud, fallback_from) = match BaudCode::from_baud(cfg.baud) {
        Some(code) => (code, None),
        None => (BaudCode::DEFAULT, Some(cfg.baud)),
    };

    LineSettings {
        cfg1,
        baud,
        fallback_from,
        auto_flow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(baud: u32) -> LineConfig {
        LineConfig {
            hw_flow: true,
            ..LineConfig::new_8n1(baud)
        }
    }

    #[test]
    fn supported_baud_has_no_fallback() {
        let s = translate(&LineConfig::new_8n1(57_600), FlowCaps::empty());
        assert_eq!(s.baud, BaudCode::B57600);
        assert_eq!(s.fallback_from, None);
        assert_eq!(s.cfg1, Cfg1::empty());
    }

    #[test]
    fn unsupported_baud_falls_back_to_9600() {
        let s = translate(&LineConfig::new_8n1(999_999), FlowCaps::empty());
        assert_eq!(s.baud, BaudCode::B9600);
        assert_eq!(s.fallback_from, Some(999_999));
        assert_eq!(s.effective(&LineConfig::new_8n1(999_999)).baud, 9600);
    }

    #[test]
    fn frame_format_bits() {
        let cfg = LineConfig {
            stop_bits: StopBits::Two,
            parity: Parity::Odd,
            ..LineConfig::new_8n1(9600)
        };
        let s = translate(&cfg, FlowCaps::empty());
        assert_eq!(
            s.cfg1,
            Cfg1::TWO_STOPBITS | Cfg1::PARITY_EN | Cfg1::PARITY_ODD
        );

        let even = LineConfig {
            parity: Parity::Even,
            ..LineConfig::new_8n1(9600)
        };
        assert_eq!(translate(&even, FlowCaps::empty()).cfg1, Cfg1::PARITY_EN);
    }

    #[test]
    fn flow_control_only_for_wired_directions() {
        let s = translate(&flow(9600), FlowCaps::CTS);
        assert_eq!(s.cfg1, Cfg1::CTS_EN);
        assert_eq!(s.auto_flow, AutoFlow::AUTO_CTS);

        let s = translate(&flow(9600), FlowCaps::all());
        assert_eq!(s.cfg1, Cfg1::CTS_EN | Cfg1::RTS_EN);
        assert_eq!(s.auto_flow, AutoFlow::all());

        let s = translate(&LineConfig::new_8n1(9600), FlowCaps::all());
        assert!(s.auto_flow.is_empty());
    }

    #[test]
    fn sanitize_masks_unsupported_requests() {
        let cfg = LineConfig {
            data_bits: DataBits::Seven,
            ..flow(115_200)
        };
        let clean = sanitize(&cfg, FlowCaps::empty());
        assert_eq!(clean.data_bits, DataBits::Eight);
        assert!(!clean.hw_flow);
        assert_eq!(clean.baud, 115_200);

        assert!(sanitize(&cfg, FlowCaps::RTS).hw_flow);
    }
}
