//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// OSPFv2 Options field.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-1
//
// Bit order (LSB to MSB): Q, E, MC, NP, L, DC, O, DN. The Q-bit (legacy
// TOS-routing capability) and the DN-bit (RFC 3623 "do not use this LSA in
// the SPF calculation", squatted on here to also gate LSA aging per
// RFC 3623 Appendix) are both still advertised by real routers even though
// neither has ongoing operational significance for this probe.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct Options: u8 {
        const Q  = 0x01;
        const E  = 0x02;
        const MC = 0x04;
        const NP = 0x08;
        const L  = 0x10;
        const DC = 0x20;
        const O  = 0x40;
        const DN = 0x80;
    }
}

impl Options {
    /// Parses the comma-separated option-name list accepted in
    /// configuration (e.g. "E,NP"), per the flag names in the IANA
    /// registry above.
    pub fn parse_names(s: &str) -> Result<Options, String> {
        let mut options = Options::empty();
        for name in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let flag = match name {
                "Q" => Options::Q,
                "E" => Options::E,
                "MC" => Options::MC,
                "NP" => Options::NP,
                "L" => Options::L,
                "DC" => Options::DC,
                "O" => Options::O,
                "DN" => Options::DN,
                other => return Err(format!("unknown option flag: {other}")),
            };
            options.insert(flag);
        }
        Ok(options)
    }
}

impl std::fmt::Display for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.bits())
    }
}
