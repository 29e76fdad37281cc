/// Register bank for 0xFF10-0xFF26, the four sound channels' control
/// registers. Sample synthesis is out of scope (no DAC, no mixer, no
/// audio sink) — only the register read/write surface and its read masks
/// are modeled, so cartridge programs that poll or reprogram these
/// registers see the documented bit behavior even though no audio is
/// produced. Only six registers force bits to 1 on read (NR10, NR30,
/// NR32, NR41, NR44, NR52); every other register reads back exactly what
/// was last written, including the write-only frequency/length bytes.
pub struct SoundCtl {
    regs: [u8; 0x17],
}

const IDX_NR10: usize = 0x00;
const IDX_NR30: usize = 0x0A;
const IDX_NR32: usize = 0x0C;
const IDX_NR41: usize = 0x10;
const IDX_NR44: usize = 0x13;
const IDX_NR52: usize = 0x16;

impl SoundCtl {
    /// Documented post-boot register contents, independent of whether the
    /// boot ROM actually ran: the values the hardware lands on either way.
    pub fn power_on() -> Self {
        SoundCtl {
            regs: [
                0x80, 0xBF, 0xF3, 0x00, 0xBF, // NR10-NR14
                0x00, 0x3F, 0x00, 0x00, 0xBF, // NR20-NR24 (NR20 unused)
                0x7F, 0xFF, 0x9F, 0x00, 0xBF, // NR30-NR34
                0x00, 0xFF, 0x00, 0x00, 0xBF, // NR40-NR44 (NR40 unused)
                0x77, 0xF3, 0xF1, // NR50-NR52
            ],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::power_on();
    }

    fn index(addr: u16) -> usize {
        (addr - 0xFF10) as usize
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        let i = Self::index(addr);
        match i {
            IDX_NR10 => self.regs[i] | 0x80,
            IDX_NR30 => self.regs[i] | 0x7F,
            IDX_NR32 => self.regs[i] | 0x9F,
            IDX_NR41 => self.regs[i] | 0xC0,
            IDX_NR44 => self.regs[i] | 0x3F,
            IDX_NR52 => self.regs[i] | 0x70,
            _ => self.regs[i],
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        let i = Self::index(addr);
        self.regs[i] = val;
    }
}
