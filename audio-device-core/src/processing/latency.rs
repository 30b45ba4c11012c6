use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Running playback position of a device.
///
/// Whole seconds are folded into `base` as samples accumulate, so the
/// sample counter stays below one second's worth at the current rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceClock {
    pub base: Duration,
    pub samples_done: u64,
}

impl DeviceClock {
    pub fn advance(&mut self, frames: u64, sample_rate: u32) {
        self.samples_done += frames;
        if sample_rate == 0 {
            return;
        }
        let rate = u64::from(sample_rate);
        let seconds = self.samples_done / rate;
        if seconds > 0 {
            self.base += Duration::from_secs(seconds);
            self.samples_done %= rate;
        }
    }

    pub fn time(&self, sample_rate: u32) -> Duration {
        self.base + frames_to_duration(self.samples_done, sample_rate)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Device time paired with the audio still buffered ahead of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockLatency {
    pub clock_time: Duration,
    pub latency: Duration,
}

pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = u128::from(frames) * NANOS_PER_SEC / u128::from(sample_rate);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Latency of `chunks` committed chunks of `update_size` frames.
pub fn buffered_latency(chunks: usize, update_size: u32, sample_rate: u32) -> Duration {
    frames_to_duration(chunks as u64 * u64::from(update_size), sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_buffer_has_no_latency() {
        assert_eq!(buffered_latency(0, 1024, 44100), Duration::ZERO);
    }

    #[test]
    fn latency_scales_with_committed_chunks() {
        for k in 1..=4 {
            let latency = buffered_latency(k, 1024, 44100);
            assert_relative_eq!(
                latency.as_secs_f64(),
                (k * 1024) as f64 / 44100.0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn zero_rate_reports_zero() {
        assert_eq!(frames_to_duration(480, 0), Duration::ZERO);
    }

    #[test]
    fn clock_folds_whole_seconds() {
        let mut clock = DeviceClock::default();
        clock.advance(30_000, 48000);
        clock.advance(30_000, 48000);
        assert_eq!(clock.base, Duration::from_secs(1));
        assert_eq!(clock.samples_done, 12_000);
        assert_relative_eq!(clock.time(48000).as_secs_f64(), 1.25, epsilon = 1e-9);

        clock.reset();
        assert_eq!(clock.time(48000), Duration::ZERO);
    }
}
