#[macro_use]
extern crate log;

mod cartridge;
mod cpu;
mod dma;
pub mod gb;
mod input;
mod interrupt;
mod joypad;
pub mod logger;
mod mmu;
mod ppu;
mod serial;
mod soundctl;
mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use input::ButtonState;

/// Master clock rate of the CPU and the unit every machine-cycle tick is
/// defined in terms of (one machine cycle = four master clocks).
pub const CLOCK_RATE: u32 = 4_194_304;
