/// Fixed-step accumulator: wall-clock frame time goes in, whole simulation ticks come out.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    max_frame_time: f32,
    accumulator: f32,
}

impl FixedTimestep {
    pub fn new(step: f32, max_frame_time: f32) -> Self {
        Self {
            step,
            max_frame_time: max_frame_time.max(step),
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Adds one frame of elapsed time and returns how many fixed ticks are now due.
    ///
    /// Frames longer than `max_frame_time` are truncated so a stall cannot trigger an
    /// unbounded catch-up burst.
    pub fn advance(&mut self, frame_time: f32) -> u32 {
        if self.step <= 0.0 {
            return 0;
        }
        self.accumulator += frame_time.clamp(0.0, self.max_frame_time);

        let mut ticks = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            ticks += 1;
        }
        ticks
    }

    /// Fraction of a tick left in the accumulator, in `[0, 1)`.
    pub fn alpha(&self) -> f32 {
        if self.step > 0.0 { self.accumulator / self.step } else { 0.0 }
    }
}
