//! Front-panel behaviour shared by every module board: a mode switch, a test
//! button and a red status LED.

use crate::modules::Module;
use crate::timer::Ticks;
use crate::userio::{BlinkMode, Blinker, ButtonTimer, Pattern};
use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin, PinState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// How long the test button must be held to enter test mode.
pub const TEST_HOLD_TICKS: Ticks = 1000;

const MANUAL_PATTERN: Pattern = Pattern::repeating(1, 500, 4000);
const TEST_START_PATTERN: Pattern = Pattern::once(2, 125, 250);
const TEST_BLINK_PATTERN: Pattern = Pattern::once(1, 150, 150);
const TEST_FINISH_PATTERN: Pattern = Pattern::once(1, 1000, 1000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMode {
    /// Before the first update.
    #[default]
    None,
    /// A master is talking to the module. The LED follows the master's LED bit.
    Connected,
    /// No master, or the mode switch forces local control.
    Manual,
    Test,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum TestState {
    /// Waiting for the button.
    #[default]
    Idle,
    /// Start animation running.
    Start,
    Test,
    /// Finish animation running.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("mode switch read failed: {0:?}")]
    Switch(ErrorKind),
    #[error("test button read failed: {0:?}")]
    Button(ErrorKind),
    #[error("status LED write failed: {0:?}")]
    Led(ErrorKind),
}

/// Switch and button read high when active.
#[derive(Debug)]
pub struct Client<S, B, L> {
    switch: S,
    button: B,
    led: L,
    mode: ClientMode,
    nontest_mode: ClientMode,
    test_state: TestState,
    button_timer: ButtonTimer,
    blinker: Blinker,
}

impl<S, B, L> Client<S, B, L>
where
    S: InputPin,
    B: InputPin,
    L: OutputPin,
{
    pub fn new(switch: S, button: B, led: L) -> Self {
        Self {
            switch,
            button,
            led,
            mode: ClientMode::None,
            nontest_mode: ClientMode::None,
            test_state: TestState::Idle,
            button_timer: ButtonTimer::new(),
            blinker: Blinker::new(),
        }
    }

    /// Updates `module`, then the front panel. Call once per control cycle.
    pub fn update<M: Module + ?Sized>(&mut self, module: &mut M) -> Result<(), ClientError> {
        let previous = self.mode;
        if self.mode == ClientMode::None {
            self.mode = ClientMode::Manual;
        }

        module.update();

        let forced_manual = self.switch.is_high().map_err(|e| ClientError::Switch(e.kind()))?;
        self.nontest_mode = if module.connected() && !forced_manual {
            ClientMode::Connected
        } else {
            ClientMode::Manual
        };
        self.mode = self.nontest_mode;

        let pressed = self.button.is_high().map_err(|e| ClientError::Button(e.kind()))?;
        self.button_timer.update(pressed);
        if self.button_timer.pressed_for(TEST_HOLD_TICKS) || self.test_state != TestState::Idle {
            self.mode = ClientMode::Test;
        }

        if self.mode != previous {
            info!(from = ?previous, to = ?self.mode, "client mode changed");
            match self.mode {
                ClientMode::Connected => self.blinker.set_state(false),
                ClientMode::Manual => self.blinker.run_pattern(MANUAL_PATTERN),
                ClientMode::Test => self.blinker.run_pattern(TEST_START_PATTERN),
                ClientMode::None => {}
            }
        }

        match self.mode {
            ClientMode::Connected => self.blinker.set_state(module.led()),
            ClientMode::Test => self.advance_test(),
            ClientMode::Manual | ClientMode::None => {}
        }

        self.blinker.update();
        self.led
            .set_state(PinState::from(self.blinker.output()))
            .map_err(|e| ClientError::Led(e.kind()))
    }

    fn advance_test(&mut self) {
        let animating = self.blinker.mode() == BlinkMode::Blink;
        self.test_state = match self.test_state {
            TestState::Idle | TestState::Start if animating => TestState::Start,
            TestState::Idle | TestState::Start => TestState::Test,
            TestState::Test => TestState::Test,
            TestState::Finish if animating => TestState::Finish,
            // Mode falls back on the next update.
            TestState::Finish => TestState::Idle,
        };
    }

    /// Call once per tick of the 1 kHz tick source. The module is ticked
    /// separately.
    pub fn tick(&mut self) {
        self.button_timer.tick();
        self.blinker.tick();
    }

    /// The current mode. While the test start animation runs this reports
    /// the mode the board would otherwise be in.
    pub fn mode(&self) -> ClientMode {
        match self.test_state {
            TestState::Start => self.nontest_mode,
            TestState::Idle | TestState::Test | TestState::Finish => self.mode,
        }
    }

    /// Signals the next test step with a single blink.
    pub fn test_blink(&mut self) {
        if self.mode == ClientMode::Test {
            self.blinker.run_pattern(TEST_BLINK_PATTERN);
        }
    }

    /// Leaves test mode once the finish animation has played.
    pub fn test_finish(&mut self) {
        if self.test_state == TestState::Test {
            debug!("test mode finishing");
            self.blinker.run_pattern(TEST_FINISH_PATTERN);
            self.test_state = TestState::Finish;
        }
    }

    pub fn led_level(&self) -> bool {
        self.blinker.output()
    }

    pub fn release(self) -> (S, B, L) {
        (self.switch, self.button, self.led)
    }
}
