//! Tick division for work that runs every N samples.

/// Counts ticks and fires every `n`th one.
///
/// Deterministic: whether a tick fires depends only on how many ticks have
/// elapsed since construction.
#[derive(Clone, Copy, Debug)]
pub struct TickDivider {
    divisor: usize,
    count: usize,
}

impl TickDivider {
    /// Create a divider that fires every `divisor` ticks (at least 1).
    pub fn new(divisor: usize) -> Self {
        Self {
            divisor: divisor.max(1),
            count: 0,
        }
    }

    pub fn divisor(&self) -> usize {
        self.divisor
    }

    /// Count one tick. Returns the number of ticks covered when the divider
    /// fires.
    pub fn step(&mut self) -> Option<usize> {
        self.count += 1;
        if self.count >= self.divisor {
            self.count = 0;
            Some(self.divisor)
        } else {
            None
        }
    }
}
