use super::input::ButtonState;

/// Register 0xFF00. Bits 5-4 select which half of the key matrix is
/// visible on the low nibble (active low: 0 selects, 1 deselects); a
/// selected line's bit is pulled low when the matching key is pressed.
/// Before every external read and after every host-input update, the low
/// nibble is recomputed and any bit that falls 1->0 raises the Joypad
/// interrupt.
pub struct Joypad {
    select_buttons: bool,
    select_directions: bool,
    /// bit0=A, bit1=B, bit2=Select, bit3=Start
    buttons_pressed: u8,
    /// bit0=Right, bit1=Left, bit2=Up, bit3=Down
    directions_pressed: u8,
    output_nibble: u8,
    interrupt_pending: bool,
}

impl Joypad {
    pub fn power_on() -> Self {
        Joypad {
            select_buttons: false,
            select_directions: false,
            buttons_pressed: 0,
            directions_pressed: 0,
            output_nibble: 0x0F,
            interrupt_pending: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::power_on();
    }

    /// Called once per host `update`/`update_to_vblank` call with the
    /// latest button state.
    pub fn set_input(&mut self, input: ButtonState) {
        self.buttons_pressed = (input.a as u8)
            | (input.b as u8) << 1
            | (input.select as u8) << 2
            | (input.start as u8) << 3;
        self.directions_pressed = (input.right as u8)
            | (input.left as u8) << 1
            | (input.up as u8) << 2
            | (input.down as u8) << 3;
        self.recompute();
    }

    fn matrix(&self) -> u8 {
        let mut pressed = 0u8;
        if self.select_buttons {
            pressed |= self.buttons_pressed;
        }
        if self.select_directions {
            pressed |= self.directions_pressed;
        }
        (!pressed) & 0x0F
    }

    fn recompute(&mut self) {
        let old = self.output_nibble;
        let new = self.matrix();
        self.output_nibble = new;
        let fell = old ^ new;
        if old & fell != 0 {
            self.interrupt_pending = true;
        }
    }

    /// Returns whether a 1->0 transition was observed since the last poll,
    /// clearing the latch.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::replace(&mut self.interrupt_pending, false)
    }

    pub fn read_byte(&mut self, addr: u16) -> u8 {
        assert_eq!(addr, 0xFF00);
        self.recompute();
        let mut v = 0xC0;
        v |= (!self.select_directions as u8) << 4;
        v |= (!self.select_buttons as u8) << 5;
        v |= self.output_nibble;
        v
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        assert_eq!(addr, 0xFF00);
        self.select_directions = (val & 0x10) == 0;
        self.select_buttons = (val & 0x20) == 0;
        self.recompute();
    }
}

#[cfg(test)]
mod joypad_tests {
    use super::*;

    #[test]
    fn action_buttons_select_and_report() {
        let mut joy = Joypad::power_on();
        joy.write_byte(0xFF00, 0xDF); // select buttons (bit5=0), directions deselected
        joy.take_interrupt();

        joy.set_input(ButtonState {
            a: true,
            ..Default::default()
        });
        assert!(joy.take_interrupt());
        assert_eq!(joy.read_byte(0xFF00) & 0x0F, 0b1110);

        joy.set_input(ButtonState {
            b: true,
            start: true,
            ..Default::default()
        });
        assert!(joy.take_interrupt());
        assert_eq!(joy.read_byte(0xFF00) & 0x0F, 0b0101);

        joy.set_input(ButtonState::default());
        assert!(!joy.take_interrupt());
        assert_eq!(joy.read_byte(0xFF00) & 0x0F, 0b1111);
    }

    #[test]
    fn direction_buttons_select_and_report() {
        let mut joy = Joypad::power_on();
        joy.write_byte(0xFF00, 0xEF); // select directions
        joy.take_interrupt();

        joy.set_input(ButtonState {
            up: true,
            ..Default::default()
        });
        assert!(joy.take_interrupt());
        assert_eq!(joy.read_byte(0xFF00) & 0x0F, 0b1011);
    }

    #[test]
    fn unselected_nibble_reads_all_ones() {
        let mut joy = Joypad::power_on();
        joy.write_byte(0xFF00, 0x30); // select neither
        joy.set_input(ButtonState {
            a: true,
            up: true,
            ..Default::default()
        });
        assert_eq!(joy.read_byte(0xFF00) & 0x0F, 0x0F);
    }

    #[test]
    fn top_two_bits_always_read_high() {
        let mut joy = Joypad::power_on();
        assert_eq!(joy.read_byte(0xFF00) & 0xC0, 0xC0);
    }
}
