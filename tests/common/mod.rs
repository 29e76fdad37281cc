#![allow(dead_code)]

const ROM_BANK_SIZE: usize = 0x4000;

/// Builds a minimal cartridge ROM image with a header declaring the given
/// type/ROM-size/RAM-size codes, sized to match the declared ROM size. Used
/// in place of the real Blargg test ROM binaries this pack doesn't ship,
/// so the integration tests below exercise the shell against synthetic
/// images instead.
pub fn synthetic_rom(cart_type: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
    let banks: usize = match rom_size_code {
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
        _ => 2,
    };
    let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
    rom[0x147] = cart_type;
    rom[0x148] = rom_size_code;
    rom[0x149] = ram_size_code;
    rom
}

/// A 32 KiB no-MBC image with `program` poked in starting at 0x0100 (the
/// cartridge entry point), the usual place to start driving the CPU from.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = synthetic_rom(0x00, 0x00, 0x00);
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    rom
}
