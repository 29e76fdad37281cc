use super::cartridge::{self, Cartridge, CartridgeError};
use super::cpu::Cpu;
use super::input::ButtonState;
use super::logger::Logger;
use super::mmu::Mmu;

/// A flat, `Copy` snapshot of register state for debug/tooling consumers.
/// Re-exported here so it can appear in `GbDebug`'s public interface
/// without naming the (private) `cpu` module directly.
pub use super::cpu::CpuDebugRegisters;

/// A snapshot of CPU and interrupt/PPU register state, for host-side
/// debuggers and test harnesses. Not used by the core itself.
pub struct GbDebug {
    pub cpu: CpuDebugRegisters,
    pub ie: u8,
    pub if_: u8,
    pub lcdc: u8,
    pub stat: u8,
    pub ly: u8,
}

/// The top-level shell: owns the CPU and the bus (which in turn owns every
/// other subsystem), and exposes the pull-based, single-step/frame-step
/// interface a host embeds against. No subsystem holds a reference to any
/// other; every cross-component effect is routed through the bus the CPU
/// drives.
pub struct Gameboy {
    cpu: Cpu,
    mmu: Mmu,
}

impl Gameboy {
    /// Allocates a fresh instance with every subsystem at its power-on
    /// state, diagnostics routed through the default `log`-crate-backed
    /// logger. Equivalent to `reset(true)` immediately after construction.
    pub fn create() -> Self {
        Self::with_logger(Logger::default())
    }

    /// As `create`, but with an explicit host-supplied logger (or
    /// `Logger::null()` to drop every diagnostic message).
    pub fn with_logger(logger: Logger) -> Self {
        let mmu = Mmu::create(logger.clone());
        let cpu = Cpu::power_on(logger);
        Gameboy { cpu, mmu }
    }

    /// Reinitializes every subsystem to its documented post-boot state.
    /// When `skip_bootrom` is false and a boot ROM blob has been installed
    /// via `set_boot_rom`, it becomes visible again at 0x0000-0x00FF until
    /// the cartridge program writes to 0xFF50.
    pub fn reset(&mut self, skip_bootrom: bool) {
        self.mmu.reset(skip_bootrom);
        self.cpu.reset(skip_bootrom);
    }

    /// Installs the 256-byte boot ROM blob. The blob itself is an external
    /// collaborator (out of scope per spec); the core only models its
    /// gating behavior.
    pub fn set_boot_rom(&mut self, rom: Option<[u8; 0x100]>) {
        self.mmu.set_boot_rom(rom);
    }

    /// Installs (or detaches) a cartridge, returning whichever cartridge
    /// was previously installed so the host can persist its battery-backed
    /// RAM before dropping it.
    pub fn set_cartridge(&mut self, cart: Option<Box<dyn Cartridge>>) -> Option<Box<dyn Cartridge>> {
        self.mmu.set_cartridge(cart)
    }

    /// Parses a raw ROM image's header and installs the resulting
    /// cartridge, returning whichever cartridge was previously installed.
    pub fn load_cartridge(
        &mut self,
        rom_data: Vec<u8>,
    ) -> Result<Option<Box<dyn Cartridge>>, CartridgeError> {
        let cart = cartridge::load(rom_data)?;
        Ok(self.set_cartridge(Some(cart)))
    }

    /// Battery-backed RAM contents of the installed cartridge, if any.
    pub fn save_data(&self) -> Option<Vec<u8>> {
        self.mmu.save_data()
    }

    /// Restores battery-backed RAM on the installed cartridge, if any.
    pub fn load_save_data(&mut self, data: &[u8]) {
        self.mmu.load_save_data(data);
    }

    /// Executes exactly one CPU instruction (interrupt dispatch, a single
    /// idle tick while halted, or one decoded opcode), consuming `input`
    /// for the joypad's edge detector first. Returns the number of machine
    /// cycles the bus advanced by.
    pub fn update(&mut self, input: ButtonState) -> u32 {
        self.mmu.update_input(input);
        self.cpu.step(&mut self.mmu)
    }

    /// Steps single instructions until the PPU has advanced through
    /// exactly one full frame, reported by its entry into VBlank. If the
    /// PPU is already in VBlank when called, the loop first runs out the
    /// remainder of the current VBlank before waiting for the next one, so
    /// the caller always observes exactly one frame's worth of progress.
    pub fn update_to_vblank(&mut self, input: ButtonState) {
        self.mmu.update_input(input);
        if self.mmu.in_vblank() {
            while self.mmu.in_vblank() {
                self.cpu.step(&mut self.mmu);
            }
        }
        while !self.mmu.in_vblank() {
            self.cpu.step(&mut self.mmu);
        }
    }

    /// Up to 160x144 composited color-index bytes (0-3), or all-4 if the
    /// LCD is currently disabled.
    pub fn get_display_data(&self) -> [u8; 160 * 144] {
        self.mmu.display_data()
    }

    /// 256x256 debug view of the raw background layer, independent of
    /// scroll position and window/sprite overlays.
    pub fn get_background_data(&self) -> [u8; 256 * 256] {
        self.mmu.background_data()
    }

    /// 128x192 debug view of all 384 decoded tiles as a 16x24 grid.
    pub fn get_tileset_data(&self) -> [u8; 128 * 192] {
        self.mmu.tileset_data()
    }

    /// Polls the serial port for a completed one-byte transfer (SC bit 7
    /// set with the internal clock source), acknowledging it by clearing
    /// SC. There is no link-cable peer to shift with; this only exists so
    /// cartridge programs that bit-bang diagnostics out over serial (a
    /// common self-test pattern) have somewhere to send them.
    pub fn poll_serial(&mut self) -> Option<u8> {
        if self.mmu.read_byte(0xFF02) == 0x81 {
            self.mmu.write_byte(0xFF02, 0x01);
            Some(self.mmu.read_byte(0xFF01))
        } else {
            None
        }
    }

    /// The CPU's current program counter.
    pub fn get_pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn get_debug_state(&mut self) -> GbDebug {
        GbDebug {
            cpu: self.cpu.debug_registers(),
            if_: self.mmu.read_byte(0xFF0F),
            ie: self.mmu.read_byte(0xFFFF),
            lcdc: self.mmu.read_byte(0xFF40),
            stat: self.mmu.read_byte(0xFF41),
            ly: self.mmu.read_byte(0xFF44),
        }
    }

    /// Returns the dispatched byte (bypassing DMA bus-conflict overrides)
    /// for every address in `range`. Debug/test tooling only.
    pub fn get_memory_range(&mut self, range: core::ops::Range<u16>) -> Vec<u8> {
        self.mmu.debug_read_range(range)
    }
}
