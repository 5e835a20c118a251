//! Address mapping for Super Famicom cartridges.
//!
//! The SFC has a bewildering number of cartridge configurations, but nearly
//! every game executes in place out of ROM mapped in one of two ways:
//!
//!  1. LoROM, where each bank exposes 32KiB of ROM in its upper half and the
//!     lower half is left to RAM and hardware registers
//!  2. HiROM, where banks $C0-$FF expose full 64KiB windows of ROM, and the
//!     upper halves of the system banks mirror them so that the reset and
//!     interrupt vectors in bank $00 land in ROM
//!
//! Copier headers and header detection are someone else's problem. The
//! caller says how many bytes to skip and which mapping to use.

use crate::analysis::{AddressError, Anomaly};
use crate::memory::{CpuAddress, RomImage};
use serde::Serialize;
use std::fmt;
use std::str;

/// Largest image either mapping can put on the bus.
pub const MAX_ROM_SIZE: usize = 0x40_0000;

const LOROM_BANK_SIZE: usize = 0x8000;
const HIROM_BANK_SIZE: usize = 0x1_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MappingMode {
    LoROM,
    HiROM,
}

impl MappingMode {
    /// Bytes of ROM visible through one bank.
    pub fn bank_size(self) -> usize {
        match self {
            MappingMode::LoROM => LOROM_BANK_SIZE,
            MappingMode::HiROM => HIROM_BANK_SIZE,
        }
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingMode::LoROM => write!(f, "lorom"),
            MappingMode::HiROM => write!(f, "hirom"),
        }
    }
}

impl str::FromStr for MappingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "lorom" => Ok(MappingMode::LoROM),
            "lo" => Ok(MappingMode::LoROM),
            "mode20" => Ok(MappingMode::LoROM),
            "hirom" => Ok(MappingMode::HiROM),
            "hi" => Ok(MappingMode::HiROM),
            "mode21" => Ok(MappingMode::HiROM),
            _ => Err(()),
        }
    }
}

derive_serialize_from_display!(MappingMode);
derive_deserialize_from_str!(MappingMode, "valid SFC mapping mode");

/// Bidirectional mapping between ROM offsets and CPU addresses.
///
/// Offsets are into the image with any copier header already removed.
/// The translator holds no reference to the ROM itself, so it is `Copy` and
/// can be handed to as many threads as needed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AddressTranslator {
    mode: MappingMode,
    rom_size: usize,
}

impl AddressTranslator {
    pub fn new(mode: MappingMode, rom_size: usize) -> Result<Self, AddressError> {
        if rom_size == 0 {
            return Err(AddressError::EmptyRom);
        }

        if rom_size > MAX_ROM_SIZE {
            return Err(AddressError::RomTooLarge {
                size: rom_size,
                limit: MAX_ROM_SIZE,
            });
        }

        Ok(AddressTranslator { mode, rom_size })
    }

    pub fn mode(&self) -> MappingMode {
        self.mode
    }

    pub fn rom_size(&self) -> usize {
        self.rom_size
    }

    /// The canonical CPU address of a ROM offset.
    ///
    /// LoROM banks $7E and $7F are work RAM, so the last 64KiB of a full
    /// 4MiB LoROM image is reported through its $FE/$FF mirror instead.
    pub fn rom_offset_to_cpu(&self, offset: usize) -> Result<CpuAddress, AddressError> {
        if offset >= self.rom_size {
            return Err(AddressError::OffsetOutOfRange(offset));
        }

        Ok(match self.mode {
            MappingMode::LoROM => {
                let mut bank = (offset / LOROM_BANK_SIZE) as u8;
                if bank >= 0x7E {
                    bank |= 0x80;
                }

                CpuAddress::new(bank, 0x8000 | (offset % LOROM_BANK_SIZE) as u16)
            }
            MappingMode::HiROM => CpuAddress::new(
                0xC0 + (offset / HIROM_BANK_SIZE) as u8,
                (offset % HIROM_BANK_SIZE) as u16,
            ),
        })
    }

    /// The ROM offset a CPU address reads from, if it reads from ROM at all.
    pub fn cpu_to_rom_offset(&self, addr: CpuAddress) -> Option<usize> {
        self.try_cpu_to_rom_offset(addr).ok()
    }

    pub fn try_cpu_to_rom_offset(&self, addr: CpuAddress) -> Result<usize, AddressError> {
        let bank = addr.bank() as usize;
        let pa = addr.addr() as usize;

        let offset = match (self.mode, addr.bank()) {
            (_, 0x7E..=0x7F) => None,
            (MappingMode::LoROM, _) if pa >= 0x8000 => {
                Some((bank & 0x7F) * LOROM_BANK_SIZE + (pa - 0x8000))
            }
            (MappingMode::LoROM, _) => None,
            (MappingMode::HiROM, 0xC0..=0xFF) => Some((bank - 0xC0) * HIROM_BANK_SIZE + pa),
            (MappingMode::HiROM, 0x40..=0x7D) => Some((bank - 0x40) * HIROM_BANK_SIZE + pa),
            (MappingMode::HiROM, _) if pa >= 0x8000 => Some((bank & 0x3F) * HIROM_BANK_SIZE + pa),
            (MappingMode::HiROM, _) => None,
        };

        match offset {
            Some(offset) if offset < self.rom_size => Ok(offset),
            _ => Err(AddressError::OutOfWindow(addr)),
        }
    }

    /// True if the address reads from ROM.
    pub fn is_mapped(&self, addr: CpuAddress) -> bool {
        self.cpu_to_rom_offset(addr).is_some()
    }
}

/// The interrupt and reset vectors of the 65C816.
///
/// Native mode and emulation mode each have their own set. There is no
/// native RESET because the processor always resets into emulation mode, and
/// emulation mode shares one vector between IRQ and BRK.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Vector {
    NativeCop,
    NativeBrk,
    NativeAbort,
    NativeNmi,
    NativeIrq,
    EmulationCop,
    EmulationAbort,
    EmulationNmi,
    Reset,
    EmulationIrq,
}

impl Vector {
    pub const ALL: [Vector; 10] = [
        Vector::NativeCop,
        Vector::NativeBrk,
        Vector::NativeAbort,
        Vector::NativeNmi,
        Vector::NativeIrq,
        Vector::EmulationCop,
        Vector::EmulationAbort,
        Vector::EmulationNmi,
        Vector::Reset,
        Vector::EmulationIrq,
    ];

    /// Where in bank $00 the vector is stored.
    pub fn location(self) -> CpuAddress {
        let addr = match self {
            Vector::NativeCop => 0xFFE4,
            Vector::NativeBrk => 0xFFE6,
            Vector::NativeAbort => 0xFFE8,
            Vector::NativeNmi => 0xFFEA,
            Vector::NativeIrq => 0xFFEE,
            Vector::EmulationCop => 0xFFF4,
            Vector::EmulationAbort => 0xFFF8,
            Vector::EmulationNmi => 0xFFFA,
            Vector::Reset => 0xFFFC,
            Vector::EmulationIrq => 0xFFFE,
        };

        CpuAddress::new(0x00, addr)
    }

    pub fn name(self) -> &'static str {
        match self {
            Vector::NativeCop => "native_cop",
            Vector::NativeBrk => "native_brk",
            Vector::NativeAbort => "native_abort",
            Vector::NativeNmi => "native_nmi",
            Vector::NativeIrq => "native_irq",
            Vector::EmulationCop => "emu_cop",
            Vector::EmulationAbort => "emu_abort",
            Vector::EmulationNmi => "emu_nmi",
            Vector::Reset => "reset",
            Vector::EmulationIrq => "emu_irq_brk",
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handler addresses read out of a ROM's vector area.
///
/// Vectors are 16-bit pointers and always execute in bank $00.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VectorTable {
    handlers: Vec<(Vector, CpuAddress)>,

    #[serde(skip)]
    errors: Vec<(Vector, AddressError)>,
}

impl VectorTable {
    pub fn read(rom: &RomImage<'_>) -> Self {
        let mut table = VectorTable::default();

        for vector in Vector::ALL.iter().copied() {
            let handler = rom
                .read_word(vector.location())
                .map(|word| CpuAddress::new(0x00, word))
                .and_then(|handler| {
                    rom.translator()
                        .try_cpu_to_rom_offset(handler)
                        .map(|_| handler)
                });

            match handler {
                Ok(handler) => table.handlers.push((vector, handler)),
                Err(e) => table.errors.push((vector, e)),
            }
        }

        table
    }

    /// Vectors whose handler lies in ROM, in table order.
    pub fn handlers(&self) -> impl Iterator<Item = (Vector, CpuAddress)> + '_ {
        self.handlers.iter().copied()
    }

    /// Vectors which could not be read, or which point outside ROM.
    pub fn errors(&self) -> impl Iterator<Item = (Vector, AddressError)> + '_ {
        self.errors.iter().copied()
    }

    /// Unusable vectors, as the anomalies analysis reports them.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.errors()
            .map(|(vector, error)| Anomaly::OutOfWindow {
                from: Some(vector.location()),
                target: match error {
                    AddressError::OutOfWindow(addr) => addr,
                    _ => vector.location(),
                },
            })
            .collect()
    }

    pub fn handler(&self, vector: Vector) -> Option<CpuAddress> {
        self.handlers
            .iter()
            .find(|(v, _)| *v == vector)
            .map(|(_, addr)| *addr)
    }
}
