//! Reading conditioner: physical range check plus moving-average smoothing
//! of temperature and humidity before a zone's reading is reported.

use heapless::Deque;

use crate::config::RangeGuard;
use crate::protocol::ZoneReading;
use crate::protocol::frames::INVALID_READING;

/// Hard capacity of a smoothing buffer.
pub const MAX_SMOOTHING: usize = 16;

/// Raw sensor output before conditioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub temperature: f32,
    pub humidity: f32,
    pub co2: f32,
}

#[derive(Debug, Clone)]
struct MovingAverage {
    buf: Deque<f32, MAX_SMOOTHING>,
    window: usize,
}

impl MovingAverage {
    fn new(window: usize) -> Self {
        Self {
            buf: Deque::new(),
            window: window.clamp(1, MAX_SMOOTHING),
        }
    }

    fn push(&mut self, v: f32) -> f32 {
        while self.buf.len() >= self.window {
            self.buf.pop_front();
        }
        let _ = self.buf.push_back(v);
        self.buf.iter().sum::<f32>() / self.buf.len() as f32
    }
}

#[derive(Debug, Clone)]
pub struct ReadingConditioner {
    range: RangeGuard,
    temperature: MovingAverage,
    humidity: MovingAverage,
}

impl ReadingConditioner {
    pub fn new(range: RangeGuard, window: usize) -> Self {
        Self {
            range,
            temperature: MovingAverage::new(window),
            humidity: MovingAverage::new(window),
        }
    }

    /// `None` means the sensor read itself failed.  Out-of-range readings
    /// are reported as faults and do not enter the averages.
    pub fn condition(&mut self, raw: Option<RawReading>) -> ZoneReading {
        let Some(raw) = raw else {
            return ZoneReading::Fault(INVALID_READING.into());
        };
        let in_range = self.range.temperature.contains(raw.temperature)
            && self.range.humidity.contains(raw.humidity)
            && self.range.co2.contains(raw.co2);
        if !in_range {
            return ZoneReading::Fault(INVALID_READING.into());
        }
        ZoneReading::Valid {
            temp: self.temperature.push(raw.temperature),
            humidity: self.humidity.push(raw.humidity),
            co2: raw.co2.round() as u32,
        }
    }
}
