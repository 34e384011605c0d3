//! Field value specs for packet header fields.
//!
//! A field is exactly one of a fixed value, an explicit list of values, or
//! an incrementing counter. Packet `n` of a flow takes element
//! `n mod cardinality` of its field pattern, so a flow may emit more packets
//! than a field has distinct values.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ── Pattern ─────────────────────────────────────────────────────────

/// How a header field varies across the packets of a flow.
///
/// Serialized in the OTG shape, e.g. `{"choice": "values", "values": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum Pattern<T> {
    /// Same value in every packet.
    Value { value: T },
    /// Cycle through an explicit list.
    Values { values: Vec<T> },
    /// `start`, `start + step`, … for `count` values, then wrap.
    Increment { increment: Counter<T> },
}

/// Parameters of an incrementing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter<T> {
    pub start: T,
    pub step: T,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl<T: Default> Default for Pattern<T> {
    fn default() -> Self {
        Pattern::Value {
            value: T::default(),
        }
    }
}

impl<T> Pattern<T> {
    pub fn value(value: T) -> Self {
        Pattern::Value { value }
    }

    /// Replace the field pattern with a fixed value.
    pub fn set_value(&mut self, value: T) -> &mut Self {
        *self = Pattern::Value { value };
        self
    }

    /// Replace the field pattern with an explicit value list.
    pub fn set_values(&mut self, values: impl IntoIterator<Item = T>) -> &mut Self {
        *self = Pattern::Values {
            values: values.into_iter().collect(),
        };
        self
    }

    /// Replace the field pattern with an incrementing counter.
    pub fn set_increment(&mut self, start: T, step: T, count: u32) -> &mut Self {
        *self = Pattern::Increment {
            increment: Counter { start, step, count },
        };
        self
    }

    /// Number of distinct values this pattern produces before repeating.
    pub fn cardinality(&self) -> u64 {
        match self {
            Pattern::Value { .. } => 1,
            Pattern::Values { values } => values.len() as u64,
            Pattern::Increment { increment } => u64::from(increment.count),
        }
    }
}

impl<T: PatternValue> Pattern<T> {
    /// Value carried by packet `index` of a flow.
    ///
    /// Returns `None` for an empty list or a zero-count counter, which a
    /// controller rejects at configuration time.
    pub fn nth(&self, index: u64) -> Option<T> {
        match self {
            Pattern::Value { value } => Some(*value),
            Pattern::Values { values } => {
                if values.is_empty() {
                    return None;
                }
                values.get((index % values.len() as u64) as usize).copied()
            }
            Pattern::Increment { increment } => {
                if increment.count == 0 {
                    return None;
                }
                let k = index % u64::from(increment.count);
                let raw = increment
                    .start
                    .to_bits()
                    .wrapping_add(increment.step.to_bits().wrapping_mul(k));
                Some(T::from_bits(raw & T::MASK))
            }
        }
    }
}

// ── Value types ─────────────────────────────────────────────────────

/// A header field value that can be counted with wrapping arithmetic.
pub trait PatternValue: Copy {
    /// Mask of the field width; counters wrap inside it.
    const MASK: u64;

    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;
}

macro_rules! int_pattern_value {
    ($($t:ty),*) => {
        $(
            impl PatternValue for $t {
                const MASK: u64 = <$t>::MAX as u64;

                fn to_bits(self) -> u64 {
                    self as u64
                }

                fn from_bits(bits: u64) -> Self {
                    bits as $t
                }
            }
        )*
    };
}

int_pattern_value!(u8, u16, u32, u64);

impl PatternValue for Ipv4Addr {
    const MASK: u64 = u32::MAX as u64;

    fn to_bits(self) -> u64 {
        u64::from(u32::from(self))
    }

    fn from_bits(bits: u64) -> Self {
        Ipv4Addr::from(bits as u32)
    }
}

impl PatternValue for MacAddr {
    const MASK: u64 = 0xFFFF_FFFF_FFFF;

    fn to_bits(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    fn from_bits(bits: u64) -> Self {
        let b = bits.to_be_bytes();
        MacAddr([b[2], b[3], b[4], b[5], b[6], b[7]])
    }
}

// ── MAC address ─────────────────────────────────────────────────────

/// 48-bit Ethernet address, written as `aa:bb:cc:dd:ee:ff`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address {0:?}")]
pub struct MacParseError(pub String);

impl MacAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for slot in out.iter_mut() {
            let part = parts.next().ok_or_else(|| MacParseError(s.to_string()))?;
            if part.len() != 2 {
                return Err(MacParseError(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| MacParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(MacParseError(s.to_string()));
        }
        Ok(MacAddr(out))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_replace_previous_kind() {
        let mut p: Pattern<u16> = Pattern::default();
        p.set_increment(5000, 2, 10);
        p.set_values([4000, 4044]);
        assert_eq!(
            p,
            Pattern::Values {
                values: vec![4000, 4044]
            }
        );
        p.set_value(7);
        assert_eq!(p, Pattern::Value { value: 7 });
        assert_eq!(p.cardinality(), 1);
    }

    #[test]
    fn increment_wraps_after_count() {
        let mut p = Pattern::value(0u16);
        p.set_increment(5000, 2, 10);
        assert_eq!(p.nth(0), Some(5000));
        assert_eq!(p.nth(9), Some(5018));
        assert_eq!(p.nth(10), Some(5000));
        assert_eq!(p.cardinality(), 10);
    }

    #[test]
    fn increment_wraps_within_field_width() {
        let p = Pattern::Increment {
            increment: Counter {
                start: 250u8,
                step: 10,
                count: 3,
            },
        };
        assert_eq!(p.nth(1), Some(4));
    }

    #[test]
    fn values_cycle_and_empty_is_none() {
        let p = Pattern::Values {
            values: vec![4000u16, 4044, 4060, 4074],
        };
        assert_eq!(p.nth(4), Some(4000));
        assert_eq!(p.nth(7), Some(4074));

        let empty: Pattern<u16> = Pattern::Values { values: vec![] };
        assert_eq!(empty.nth(0), None);
    }

    #[test]
    fn ipv4_and_mac_counters() {
        let p = Pattern::Increment {
            increment: Counter {
                start: Ipv4Addr::new(10, 0, 0, 255),
                step: Ipv4Addr::new(0, 0, 0, 1),
                count: 4,
            },
        };
        assert_eq!(p.nth(1), Some(Ipv4Addr::new(10, 0, 1, 0)));

        let m = Pattern::Increment {
            increment: Counter {
                start: MacAddr::new([0xff; 6]),
                step: MacAddr::new([0, 0, 0, 0, 0, 1]),
                count: 2,
            },
        };
        assert_eq!(m.nth(1), Some(MacAddr::new([0; 6])));
    }

    #[test]
    fn mac_parse_and_display() {
        let mac: MacAddr = "00:AA:00:00:04:00".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0xaa, 0x00, 0x00, 0x04, 0x00]);
        assert_eq!(mac.to_string(), "00:aa:00:00:04:00");
        assert!("00:aa:00".parse::<MacAddr>().is_err());
        assert!("00:aa:00:00:04:00:11".parse::<MacAddr>().is_err());
        assert!("zz:aa:00:00:04:00".parse::<MacAddr>().is_err());
    }

    #[test]
    fn pattern_json_shape() {
        let p = Pattern::Increment {
            increment: Counter {
                start: 5000u16,
                step: 2,
                count: 10,
            },
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["choice"], "increment");
        assert_eq!(v["increment"]["start"], 5000);

        let back: Pattern<u16> =
            serde_json::from_str(r#"{"choice":"increment","increment":{"start":1,"step":1}}"#)
                .unwrap();
        assert_eq!(back.cardinality(), 1);
    }
}
