//! Fixed-width AM identifiers.
//!
//! All three render as zero-padded uppercase hex and parse back from hex,
//! with or without a `0x` prefix.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

macro_rules! am_identifier {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $width:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $repr);

        impl $name {
            /// Raw numeric value.
            pub const fn get(self) -> $repr {
                self.0
            }

            /// Big-endian wire bytes.
            pub const fn to_be_bytes(self) -> [u8; std::mem::size_of::<$repr>()] {
                self.0.to_be_bytes()
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!("{:0", $width, "X}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = FrameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                <$repr>::from_str_radix(digits, 16)
                    .map(Self)
                    .map_err(|_| FrameError::InvalidHex(s.to_string()))
            }
        }
    };
}

am_identifier!(
    /// A 2-byte node address.
    AmAddr,
    u16,
    4
);

am_identifier!(
    /// A 1-byte network group (PAN) identifier.
    AmGroup,
    u8,
    2
);

am_identifier!(
    /// A 1-byte AM message type.
    AmId,
    u8,
    2
);

impl AmAddr {
    /// Link-local broadcast address.
    pub const BROADCAST: AmAddr = AmAddr(0xFFFF);
}

impl AmGroup {
    /// Group used by stock TinyOS images.
    pub const DEFAULT: AmGroup = AmGroup(0x22);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_padded_hex() {
        assert_eq!(AmAddr(0x1).to_string(), "0001");
        assert_eq!(AmAddr::BROADCAST.to_string(), "FFFF");
        assert_eq!(AmGroup(0x0A).to_string(), "0A");
        assert_eq!(AmId(0xEE).to_string(), "EE");
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        assert_eq!("0x1234".parse::<AmAddr>().unwrap(), AmAddr(0x1234));
        assert_eq!("beef".parse::<AmAddr>().unwrap(), AmAddr(0xBEEF));
        assert_eq!("22".parse::<AmGroup>().unwrap(), AmGroup::DEFAULT);
        assert_eq!("0XfE".parse::<AmId>().unwrap(), AmId(0xFE));
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(matches!(
            "100".parse::<AmId>(),
            Err(FrameError::InvalidHex(s)) if s == "100"
        ));
        assert!("xyz".parse::<AmAddr>().is_err());
        assert!("".parse::<AmGroup>().is_err());
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(AmAddr(2) < AmAddr(0x100));
        assert!(AmId(0xFF) > AmId(0));
        assert_eq!(u16::from(AmAddr(7)), 7);
    }

    #[test]
    fn big_endian_bytes() {
        assert_eq!(AmAddr(0x1234).to_be_bytes(), [0x12, 0x34]);
        assert_eq!(AmGroup(0x22).to_be_bytes(), [0x22]);
    }
}
