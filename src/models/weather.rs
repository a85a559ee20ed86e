use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Weather {
    // vec of (time, state) pairs.
    // The time is the time in seconds since the start of the race.
    // The state is a floating point between 0.0 and 1.0.
    // - 1.0 is heavy rain
    // - 0.0 is clear sky
    // - 0.5 is cloudy
    // values are sorted by time
    pub state_change_time: Vec<(f32, f32)>,
}

impl Weather {
    pub fn get_state_at_time(&self, time: f32) -> f32 {
        if self.state_change_time.is_empty() {
            return 0.5; // Default to cloudy if no data
        }

        // If before first timepoint, return first value
        if time <= self.state_change_time[0].0 {
            return self.state_change_time[0].1;
        }

        // If after last timepoint, return the last value
        if time >= self.state_change_time.last().unwrap().0 {
            return self.state_change_time.last().unwrap().1;
        }

        // Find the two closest timepoints for interpolation
        for i in 0..self.state_change_time.len() - 1 {
            let (t1, s1) = self.state_change_time[i];
            let (t2, s2) = self.state_change_time[i + 1];

            if time >= t1 && time <= t2 {
                // Linear interpolation: s1 + (s2 - s1) * (time - t1) / (t2 - t1)
                let ratio = (time - t1) / (t2 - t1);
                return s1 + (s2 - s1) * ratio;
            }
        }
        // Fallback (shouldn't reach here)
        self.state_change_time.last().unwrap().1
    }

    /// Grip multiplier applied by the physics kernel: 1.0 on a dry track,
    /// down to 0.6 in heavy rain.
    pub fn grip_multiplier_at_time(&self, time: f32) -> f32 {
        1.0 - 0.4 * self.get_state_at_time(time)
    }
}

/// Per-tick environment passed into the physics kernel: whatever about the
/// outside world a participant's update depends on besides their own state.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    pub grip_multiplier: f32,
}

impl Environment {
    pub fn dry() -> Self {
        Environment { grip_multiplier: 1.0 }
    }

    pub fn from_weather(weather: &Weather, race_time_s: f32) -> Self {
        Environment {
            grip_multiplier: weather.grip_multiplier_at_time(race_time_s),
        }
    }
}
