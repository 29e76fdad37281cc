/// The eight buttons a host can report as pressed/released. Consumed once
/// per `Gameboy::update`/`update_to_vblank` call; the joypad block derives
/// its edge-triggered interrupt from how this compares to the previous call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub a: bool,
    pub b: bool,
    pub start: bool,
    pub select: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl ButtonState {
    pub fn none() -> Self {
        Self::default()
    }
}
