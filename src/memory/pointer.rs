//! 24-bit banked CPU addresses

use crate::input::{parse_cpu_address, InputError};
use std::fmt;
use std::str::FromStr;

/// A 65C816 memory address, split into its bank and in-bank halves.
///
/// Ordering follows the flat 24-bit value, so a `BTreeMap` keyed by
/// `CpuAddress` iterates the address space in the same order the bus does.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CpuAddress {
    bank: u8,
    addr: u16,
}

impl CpuAddress {
    pub const fn new(bank: u8, addr: u16) -> Self {
        CpuAddress { bank, addr }
    }

    /// Construct an address from a flat 24-bit value. Bits above 23 are
    /// discarded.
    pub const fn from_u24(flat: u32) -> Self {
        CpuAddress {
            bank: ((flat >> 16) & 0xFF) as u8,
            addr: (flat & 0xFFFF) as u16,
        }
    }

    pub const fn to_u24(self) -> u32 {
        ((self.bank as u32) << 16) | self.addr as u32
    }

    pub const fn bank(self) -> u8 {
        self.bank
    }

    pub const fn addr(self) -> u16 {
        self.addr
    }

    /// The same in-bank address in another bank.
    pub const fn with_addr(self, addr: u16) -> Self {
        CpuAddress {
            bank: self.bank,
            addr,
        }
    }

    /// Advance within the current bank.
    ///
    /// The program counter of the 65C816 never carries into the program bank,
    /// so neither does this.
    pub fn wrapping_add(self, offset: u16) -> Self {
        self.with_addr(self.addr.wrapping_add(offset))
    }

    /// Displace within the current bank by a signed amount.
    pub fn wrapping_offset(self, displacement: i32) -> Self {
        self.with_addr((self.addr as i32).wrapping_add(displacement) as u16)
    }
}

impl fmt::Display for CpuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:02X}:{:04X}", self.bank, self.addr)
    }
}

impl fmt::UpperHex for CpuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.to_u24())
    }
}

impl FromStr for CpuAddress {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cpu_address(s)
    }
}

impl From<CpuAddress> for u32 {
    fn from(addr: CpuAddress) -> u32 {
        addr.to_u24()
    }
}

derive_serialize_from_display!(CpuAddress);
derive_deserialize_from_str!(CpuAddress, "valid 65C816 address");
