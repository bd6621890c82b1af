/// A scalar parameter with at most one pending linear ramp.
///
/// Times are in seconds on the owning context's clock. Scheduling a new ramp
/// replaces the pending one, starting from the value the parameter has at the
/// moment of scheduling so that the curve stays continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParam {
    value: f32,
    ramp: Option<LinearRamp>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearRamp {
    start_value: f32,
    start_time: f64,
    end_value: f32,
    end_time: f64,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self { value, ramp: None }
    }

    /// Sets the value immediately, cancelling any ramp.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.ramp = None;
    }

    /// Ramps linearly from the current value at `now` to `target` at `end_time`.
    pub fn linear_ramp_to(&mut self, target: f32, end_time: f64, now: f64) {
        if end_time <= now {
            self.set_value(target);
            return;
        }
        let start_value = self.value_at(now);
        self.value = start_value;
        self.ramp = Some(LinearRamp {
            start_value,
            start_time: now,
            end_value: target,
            end_time,
        });
    }

    pub fn value_at(&self, time: f64) -> f32 {
        match self.ramp {
            None => self.value,
            Some(ramp) if time >= ramp.end_time => ramp.end_value,
            Some(ramp) if time <= ramp.start_time => ramp.start_value,
            Some(ramp) => {
                let t = (time - ramp.start_time) / (ramp.end_time - ramp.start_time);
                ramp.start_value + (ramp.end_value - ramp.start_value) * t as f32
            }
        }
    }
}

impl Default for AudioParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
