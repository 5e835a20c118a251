//! Input utility functions

use crate::memory::CpuAddress;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("empty address")]
    Empty,

    #[error("`{0}` is not a hexadecimal number")]
    NotHex(String),

    #[error("bank `{0}` does not fit in eight bits")]
    BankTooWide(String),

    #[error("address `{0}` does not fit in sixteen bits")]
    AddressTooWide(String),

    #[error("`{0}` is not a valid file offset")]
    BadOffset(String),

    #[error("`{0}` is not a mapping mode, expected lorom or hirom")]
    BadMapping(String),
}

fn parse_hex(text: &str) -> Result<u32, InputError> {
    if text.is_empty() {
        return Err(InputError::Empty);
    }

    u32::from_str_radix(text, 16).map_err(|_| InputError::NotHex(text.to_string()))
}

/// Parse any CPU address specification entered in by a user.
///
/// Accepted forms, all hexadecimal with an optional leading `$`:
///
///  * `BB:AAAA` - explicit bank and in-bank address
///  * `BBAAAA` - flat 24-bit address (five or six digits)
///  * `AAAA` - in-bank address, bank zero assumed
pub fn parse_cpu_address(text_str: &str) -> Result<CpuAddress, InputError> {
    let trimmed = text_str.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(InputError::Empty);
    }

    if let Some((bank, addr)) = trimmed.split_once(':') {
        let bank_val = parse_hex(bank.trim_start_matches('$'))?;
        let addr_val = parse_hex(addr.trim_start_matches('$'))?;

        if bank_val > 0xFF {
            return Err(InputError::BankTooWide(bank.to_string()));
        }

        if addr_val > 0xFFFF {
            return Err(InputError::AddressTooWide(addr.to_string()));
        }

        return Ok(CpuAddress::new(bank_val as u8, addr_val as u16));
    }

    let flat = parse_hex(trimmed)?;
    if trimmed.len() > 6 || flat > 0xFF_FFFF {
        return Err(InputError::AddressTooWide(trimmed.to_string()));
    }

    if trimmed.len() <= 4 {
        Ok(CpuAddress::new(0, flat as u16))
    } else {
        Ok(CpuAddress::from_u24(flat))
    }
}

/// Parse a ROM file offset. `0x`-prefixed values are hexadecimal, anything
/// else is decimal.
pub fn parse_offset(text_str: &str) -> Result<usize, InputError> {
    let trimmed = text_str.trim();

    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse::<usize>(),
    };

    parsed.map_err(|_| InputError::BadOffset(text_str.to_string()))
}
