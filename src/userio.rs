//! Front-panel input and indicator helpers, independent of any pin type.

use crate::timer::{Stopwatch, Ticks, Timer};
use serde::{Deserialize, Serialize};

/// Edge detector over a sampled boolean input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStates {
    previous: bool,
    pub held: bool,
    /// Went from low to high on the last update.
    pub pressed: bool,
    /// Went from high to low on the last update.
    pub released: bool,
}

impl InputStates {
    pub const fn new() -> Self {
        Self { previous: false, held: false, pressed: false, released: false }
    }

    pub fn update(&mut self, level: bool) {
        self.held = level;
        self.pressed = level && !self.previous;
        self.released = !level && self.previous;
        self.previous = level;
    }
}

/// Measures how long a button has been held or released.
#[derive(Debug, Clone, Copy)]
pub struct ButtonTimer {
    states: InputStates,
    stopwatch: Stopwatch,
    checked: bool,
}

impl ButtonTimer {
    pub fn new() -> Self {
        let mut stopwatch = Stopwatch::new();
        stopwatch.start();
        Self { states: InputStates::new(), stopwatch, checked: false }
    }

    /// Samples the button. Any edge restarts the measurement.
    pub fn update(&mut self, level: bool) {
        self.states.update(level);
        if self.states.pressed || self.states.released {
            self.stopwatch.set(0);
            self.checked = false;
        }
    }

    pub fn tick(&mut self) {
        self.stopwatch.tick();
    }

    pub fn states(&self) -> InputStates {
        self.states
    }

    pub fn held_time(&self) -> Ticks {
        if self.states.held {
            self.stopwatch.elapsed()
        } else {
            0
        }
    }

    pub fn released_time(&self) -> Ticks {
        if self.states.held {
            0
        } else {
            self.stopwatch.elapsed()
        }
    }

    /// True once per press, the first time it has been held for `ticks`.
    /// Tracks a single threshold per press.
    pub fn pressed_for(&mut self, ticks: Ticks) -> bool {
        if !self.checked && self.states.held && self.held_time() >= ticks {
            self.checked = true;
            return true;
        }
        false
    }

    /// True once per release, the first time it has been released for `ticks`.
    pub fn released_for(&mut self, ticks: Ticks) -> bool {
        if !self.checked && !self.states.held && self.released_time() >= ticks {
            self.checked = true;
            return true;
        }
        false
    }
}

impl Default for ButtonTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Blink pattern: `count` on/off pulses followed by `rest` ticks off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub on: Ticks,
    pub off: Ticks,
    pub rest: Ticks,
    pub count: u8,
    pub repeat: bool,
    /// Swaps the on and off output levels.
    pub inverted: bool,
}

impl Pattern {
    pub const fn once(count: u8, on: Ticks, off: Ticks) -> Self {
        Self { on, off, rest: 0, count, repeat: false, inverted: false }
    }

    pub const fn repeating(count: u8, on: Ticks, off: Ticks) -> Self {
        Self { on, off, rest: 0, count, repeat: true, inverted: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlinkMode {
    #[default]
    Solid,
    Blink,
}

/// Drives a single output level through a [`Pattern`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Blinker {
    pattern: Pattern,
    mode: BlinkMode,
    timer: Timer,
    count: u8,
    lit: bool,
    output: bool,
}

impl Blinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops any pattern and holds `state`.
    pub fn set_state(&mut self, state: bool) {
        self.mode = BlinkMode::Solid;
        self.output = state;
    }

    pub fn run_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
        self.mode = BlinkMode::Blink;
        self.count = 0;
        self.lit = false;
        // Expired, so the first update turns the output on.
        self.timer.restart(0);
    }

    pub fn run_pattern_if_solid(&mut self, pattern: Pattern) {
        if self.mode == BlinkMode::Solid {
            self.run_pattern(pattern);
        }
    }

    pub fn update(&mut self) {
        if self.mode != BlinkMode::Blink || !self.timer.finished() {
            return;
        }

        let next = if self.lit {
            self.output = self.pattern.inverted;
            self.count = self.count.saturating_add(1);
            self.pattern.off
        } else if self.count >= self.pattern.count {
            if !self.pattern.repeat {
                self.mode = BlinkMode::Solid;
                return;
            }
            self.count = 0;
            // Flipped below, so the next update starts a pulse.
            self.lit = true;
            self.pattern.rest
        } else {
            self.output = !self.pattern.inverted;
            self.pattern.on
        };
        self.lit = !self.lit;
        self.timer.restart(next);
    }

    pub fn tick(&mut self) {
        self.timer.tick();
    }

    pub fn output(&self) -> bool {
        self.output
    }

    pub fn mode(&self) -> BlinkMode {
        self.mode
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(blinker: &mut Blinker, ticks: usize) -> Vec<bool> {
        let mut levels = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            blinker.update();
            levels.push(blinker.output());
            blinker.tick();
        }
        levels
    }

    #[test]
    fn test_input_edges() {
        let mut states = InputStates::new();
        states.update(true);
        assert!(states.pressed && states.held);
        states.update(true);
        assert!(!states.pressed && states.held);
        states.update(false);
        assert!(states.released && !states.held);
    }

    #[test]
    fn test_pressed_for_fires_once_per_press() {
        let mut button = ButtonTimer::new();
        button.update(true);
        for _ in 0..10 {
            button.tick();
        }
        button.update(true);
        assert!(!button.pressed_for(11));
        assert!(button.pressed_for(10));
        assert!(!button.pressed_for(10));

        button.update(false);
        assert_eq!(button.held_time(), 0);
        button.tick();
        button.update(true);
        assert_eq!(button.held_time(), 0);
    }

    #[test]
    fn test_released_for() {
        let mut button = ButtonTimer::new();
        button.update(true);
        button.update(false);
        button.tick();
        button.tick();
        assert_eq!(button.released_time(), 2);
        assert!(button.released_for(2));
        assert!(!button.released_for(2));
    }

    #[test]
    fn test_one_shot_pattern() {
        let mut blinker = Blinker::new();
        blinker.run_pattern(Pattern::once(2, 2, 1));
        let levels = run(&mut blinker, 8);
        assert_eq!(levels, vec![true, true, false, true, true, false, false, false]);
        assert_eq!(blinker.mode(), BlinkMode::Solid);
    }

    #[test]
    fn test_repeating_pattern_rests() {
        let mut blinker = Blinker::new();
        blinker.run_pattern(Pattern { rest: 2, ..Pattern::repeating(1, 1, 1) });
        let levels = run(&mut blinker, 7);
        assert_eq!(levels, vec![true, false, false, false, true, false, false]);
        assert_eq!(blinker.mode(), BlinkMode::Blink);
    }

    #[test]
    fn test_set_state_cancels_pattern() {
        let mut blinker = Blinker::new();
        blinker.run_pattern(Pattern::repeating(1, 5, 5));
        blinker.update();
        blinker.set_state(false);
        assert_eq!(blinker.mode(), BlinkMode::Solid);
        blinker.run_pattern_if_solid(Pattern::once(1, 1, 1));
        assert_eq!(blinker.mode(), BlinkMode::Blink);
    }
}
