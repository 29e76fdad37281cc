pub mod mbc1;
pub mod mbc2;
pub mod mbc5;
pub mod nombc;

use std::fmt;

/// Error type covering cartridge construction from a raw ROM image.
/// Bus-level reads/writes never fail; everything that can go wrong happens
/// while parsing the header and allocating ROM/RAM storage.
#[derive(Debug, PartialEq, Eq)]
pub enum CartridgeError {
    /// The ROM image was empty or otherwise not usable as input.
    FileNotFound,
    /// The cartridge type byte (0x147) was recognized but the resulting
    /// controller could not be constructed.
    CartridgeAllocationFailed,
    /// The ROM image is shorter than its own header declares.
    RomAllocationFailed,
    /// The RAM size byte (0x149) named a size outside the known table.
    RamAllocationFailed,
    /// The cartridge type byte (0x147) names an MBC this core doesn't model.
    MbcNotSupported,
    /// A save blob was handed in where none was expected, or vice versa.
    NullReturnArgument,
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CartridgeError::FileNotFound => write!(f, "no ROM data provided"),
            CartridgeError::CartridgeAllocationFailed => {
                write!(f, "cartridge controller could not be constructed")
            }
            CartridgeError::RomAllocationFailed => {
                write!(f, "ROM image shorter than its header declares")
            }
            CartridgeError::RamAllocationFailed => write!(f, "unrecognized RAM size byte"),
            CartridgeError::MbcNotSupported => write!(f, "unsupported cartridge type byte"),
            CartridgeError::NullReturnArgument => write!(f, "save data argument was empty"),
        }
    }
}

impl std::error::Error for CartridgeError {}

/// A loaded game cartridge: ROM/RAM storage plus whatever bank-switching
/// logic its memory bank controller implements. Bus address decoding
/// (0x0000-0x7FFF, 0xA000-0xBFFF) is the cartridge's own responsibility;
/// the bus just forwards addresses in range.
pub trait Cartridge {
    fn read_byte(&self, addr: u16) -> u8;
    fn write_byte(&mut self, addr: u16, val: u8);

    /// Battery-backed RAM contents, for the shell to persist. `None` if this
    /// cartridge has no battery-backed RAM.
    fn save_data(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restores battery-backed RAM from a previously saved blob. A no-op on
    /// cartridges without battery-backed RAM.
    fn load_save_data(&mut self, _data: &[u8]) {}
}

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Decodes the 0x148 header byte into a ROM size in bytes. Codes 0x52-0x54
/// are the odd non-power-of-two pirate-cart sizes occasionally seen in the
/// wild; everything else doubles from 32 KiB.
fn rom_size_bytes(code: u8) -> Option<usize> {
    let banks: usize = match code {
        0x00 => 2,
        0x01 => 4,
        0x02 => 8,
        0x03 => 16,
        0x04 => 32,
        0x05 => 64,
        0x06 => 128,
        0x07 => 256,
        0x08 => 512,
        0x52 => 72,
        0x53 => 80,
        0x54 => 96,
        _ => return None,
    };
    Some(banks * ROM_BANK_SIZE)
}

/// Decodes the 0x149 header byte into a RAM size in bytes. Code 0x01 (2 KiB)
/// is the one size that isn't a whole number of 8 KiB banks.
fn ram_size_bytes(code: u8) -> Option<usize> {
    match code {
        0x00 => Some(0),
        0x01 => Some(512),
        0x02 => Some(RAM_BANK_SIZE),
        0x03 => Some(4 * RAM_BANK_SIZE),
        0x04 => Some(16 * RAM_BANK_SIZE),
        0x05 => Some(8 * RAM_BANK_SIZE),
        _ => None,
    }
}

const HEADER_CART_TYPE: usize = 0x147;
const HEADER_ROM_SIZE: usize = 0x148;
const HEADER_RAM_SIZE: usize = 0x149;

/// Parses a cartridge header out of `rom` and constructs the matching
/// controller. The returned box owns the entire ROM image; no copy is made
/// beyond what the controller needs for its RAM.
pub fn load(rom: Vec<u8>) -> Result<Box<dyn Cartridge>, CartridgeError> {
    if rom.is_empty() {
        return Err(CartridgeError::FileNotFound);
    }
    if rom.len() <= HEADER_RAM_SIZE {
        return Err(CartridgeError::RomAllocationFailed);
    }

    let cart_type = rom[HEADER_CART_TYPE];
    let rom_size =
        rom_size_bytes(rom[HEADER_ROM_SIZE]).ok_or(CartridgeError::RomAllocationFailed)?;
    if rom.len() < rom_size {
        return Err(CartridgeError::RomAllocationFailed);
    }

    match cart_type {
        0x00 => Ok(Box::new(nombc::NoMbc::power_on(rom))),
        0x01 | 0x02 | 0x03 => {
            let ram_size = ram_size_bytes(rom[HEADER_RAM_SIZE])
                .ok_or(CartridgeError::RamAllocationFailed)?;
            let has_battery = cart_type == 0x03;
            Ok(Box::new(mbc1::Mbc1::power_on(rom, ram_size, has_battery)))
        }
        0x05 | 0x06 => {
            let has_battery = cart_type == 0x06;
            Ok(Box::new(mbc2::Mbc2::power_on(rom, has_battery)))
        }
        0x19 | 0x1A | 0x1B | 0x1C | 0x1D | 0x1E => {
            let ram_size = ram_size_bytes(rom[HEADER_RAM_SIZE])
                .ok_or(CartridgeError::RamAllocationFailed)?;
            let has_battery = matches!(cart_type, 0x1B | 0x1E);
            Ok(Box::new(mbc5::Mbc5::power_on(rom, ram_size, has_battery)))
        }
        _ => Err(CartridgeError::MbcNotSupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_rom(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let size = rom_size_bytes(rom_code).unwrap_or(ROM_BANK_SIZE * 2);
        let mut rom = vec![0u8; size];
        rom[HEADER_CART_TYPE] = cart_type;
        rom[HEADER_ROM_SIZE] = rom_code;
        rom[HEADER_RAM_SIZE] = ram_code;
        rom
    }

    #[test]
    fn empty_rom_is_rejected() {
        assert_eq!(load(Vec::new()), Err(CartridgeError::FileNotFound));
    }

    #[test]
    fn no_mbc_loads_from_minimal_header() {
        let rom = synthetic_rom(0x00, 0x00, 0x00);
        assert!(load(rom).is_ok());
    }

    #[test]
    fn unknown_cart_type_is_rejected() {
        let rom = synthetic_rom(0xFE, 0x00, 0x00);
        assert_eq!(load(rom), Err(CartridgeError::MbcNotSupported));
    }

    #[test]
    fn truncated_rom_is_rejected() {
        let mut rom = synthetic_rom(0x00, 0x03, 0x00); // declares 256 KiB
        rom.truncate(0x8000); // actually provide 32 KiB
        assert_eq!(load(rom), Err(CartridgeError::RomAllocationFailed));
    }

    #[test]
    fn mbc1_with_battery_loads() {
        let rom = synthetic_rom(0x03, 0x01, 0x02);
        assert!(load(rom).is_ok());
    }

    #[test]
    fn mbc5_loads() {
        let rom = synthetic_rom(0x1B, 0x02, 0x03);
        assert!(load(rom).is_ok());
    }
}
