//! Countdown timers and stopwatches driven by an external tick source.
//!
//! Nothing here reads a clock. The owner calls `tick()` once per tick of the
//! platform's 1 kHz tick interrupt (modules forward ticks through
//! [`Module::tick`](crate::modules::Module::tick)).

pub type Ticks = u16;

/// Countdown timer. Finishes when the loaded tick count reaches zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    ticks: Ticks,
    running: bool,
    finished: bool,
}

impl Timer {
    pub const fn new() -> Self {
        Self { ticks: 0, running: false, finished: false }
    }

    /// Sets the remaining ticks without changing the running state.
    pub fn load(&mut self, ticks: Ticks) {
        self.ticks = ticks;
    }

    /// Starts counting down. A timer loaded with zero finishes immediately.
    pub fn start(&mut self) {
        if self.ticks == 0 {
            self.running = false;
            self.finished = true;
            return;
        }
        self.running = true;
        self.finished = false;
    }

    pub fn restart(&mut self, ticks: Ticks) {
        self.load(ticks);
        self.start();
    }

    /// Pauses without clearing the remaining ticks.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn tick(&mut self) {
        if self.running {
            self.ticks = self.ticks.saturating_sub(1);
            if self.ticks == 0 {
                self.running = false;
                self.finished = true;
            }
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> Ticks {
        self.ticks
    }
}

/// Counts ticks upwards while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stopwatch {
    ticks: Ticks,
    running: bool,
}

impl Stopwatch {
    pub const fn new() -> Self {
        Self { ticks: 0, running: false }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn set(&mut self, ticks: Ticks) {
        self.ticks = ticks;
    }

    pub fn tick(&mut self) {
        if self.running {
            self.ticks = self.ticks.saturating_add(1);
        }
    }

    pub fn elapsed(&self) -> Ticks {
        self.ticks
    }

    pub fn running(&self) -> bool {
        self.running
    }
}
