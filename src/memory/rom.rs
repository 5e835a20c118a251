//! ROM images as seen through a cartridge mapping

use crate::analysis::AddressError;
use crate::memory::CpuAddress;
use crate::platform::{AddressTranslator, MappingMode};

/// A ROM image borrowed from the caller, with its copier header removed.
///
/// The image never owns or copies the file contents. Any number of analyzers
/// on any number of threads may read the same image at once.
#[derive(Copy, Clone, Debug)]
pub struct RomImage<'a> {
    bytes: &'a [u8],
    translator: AddressTranslator,
}

impl<'a> RomImage<'a> {
    /// Wrap raw file contents.
    ///
    /// `header` is the size of any copier header preceding the ROM data,
    /// usually 0 or 512. It is not detected here.
    pub fn new(file: &'a [u8], header: usize, mode: MappingMode) -> Result<Self, AddressError> {
        let bytes = file.get(header..).ok_or(AddressError::HeaderTooLarge {
            header,
            file: file.len(),
        })?;
        let translator = AddressTranslator::new(mode, bytes.len())?;

        Ok(RomImage { bytes, translator })
    }

    /// The ROM contents, header excluded. Index with ROM offsets.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn translator(&self) -> &AddressTranslator {
        &self.translator
    }

    pub fn mode(&self) -> MappingMode {
        self.translator.mode()
    }

    /// Read the ROM byte visible at a CPU address.
    pub fn fetch(&self, addr: CpuAddress) -> Result<u8, AddressError> {
        let offset = self.translator.try_cpu_to_rom_offset(addr)?;

        self.bytes
            .get(offset)
            .copied()
            .ok_or(AddressError::OutOfWindow(addr))
    }

    /// Read a little-endian word. The high byte comes from the next address
    /// in the same bank, as the CPU would read it.
    pub fn read_word(&self, addr: CpuAddress) -> Result<u16, AddressError> {
        let lo = self.fetch(addr)? as u16;
        let hi = self.fetch(addr.wrapping_add(1))? as u16;

        Ok(lo | (hi << 8))
    }
}
