//! Elapsed time, rate summary, and decoding of the captured samples.

use chrono::Utc;

use crate::batch::SLOT_BYTES;

/// A wall-clock stamp split into whole seconds and leftover microseconds.
#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub secs: i64,
    pub micros: u32,
}

impl Stamp {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            secs: now.timestamp(),
            micros: now.timestamp_subsec_micros(),
        }
    }
}

/// The run bracketed by its start and end stamps.
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow {
    pub start: Stamp,
    pub end: Stamp,
    pub completed: u64,
}

impl SampleWindow {
    /// Wall-clock seconds between the two stamps.
    ///
    /// Borrows a second when the end stamp's microseconds are behind the
    /// start's, so the subtraction never wraps.
    pub fn elapsed_secs(&self) -> f64 {
        let (secs, micros) = if self.end.micros >= self.start.micros {
            (self.end.secs - self.start.secs, self.end.micros - self.start.micros)
        } else {
            (
                self.end.secs - 1 - self.start.secs,
                1_000_000 + self.end.micros - self.start.micros,
            )
        };
        secs as f64 + micros as f64 / 1e6
    }

    /// Transfers per second, 0 when the run was shorter than the timer
    /// resolution.
    pub fn rate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Unpack the 10-bit sample from one 3-byte response: a null leading
/// byte, the upper 8 bits, then the low 2 bits in the top of the third
/// byte. Fixed by the device protocol.
pub fn decode_sample(slot: &[u8]) -> u16 {
    ((slot[1] as u16) << 2) + ((slot[2] >> 6) as u16)
}

pub fn format_summary(window: &SampleWindow) -> String {
    format!(
        "Summary\n  Elapsed: {:.2} seconds\n    Reads: {}\n     Rate: {:.2} Hz\n",
        window.elapsed_secs(),
        window.completed,
        window.rate()
    )
}

/// One line per slot of the last completed block, decoded.
pub fn format_dump(rx: &[u8]) -> String {
    let mut out = String::from("\nLast block of data\n");
    for (i, slot) in rx.chunks_exact(SLOT_BYTES).enumerate() {
        out.push_str(&format!("{:03}: {}\n", i, decode_sample(slot)));
    }
    out
}
