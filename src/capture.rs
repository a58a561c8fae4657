//! The benchmark loop against the spidev transport.
//!
//! One submission pushes the whole transfer chain through a single
//! `SPI_IOC_MESSAGE` call, so the kernel clocks out every chained sample
//! without returning to userspace in between. The loop resubmits the same
//! chain as fast as the bus allows and only looks at the stop flag between
//! submissions.

use std::collections::TryReserveError;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use thiserror::Error;
use tracing::info;

use crate::batch;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("opening {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("allocating the {what}: {source}")]
    Allocation {
        what: &'static str,
        source: TryReserveError,
    },
    #[error("submitting transfer block: {source}")]
    Transfer { completed: u64, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct CaptureOpts {
    pub device: String,
    pub blocks: usize,
    pub channel: u8,
    pub speed_hz: u32,
}

/// What the loop hands back after a clean (interrupted) run.
#[derive(Debug)]
pub struct Capture {
    /// Transfers completed over the whole run.
    pub completed: u64,
    /// Input block from the last completed submission.
    pub last_block: Vec<u8>,
}

/// Anything that can push a transfer chain through in one atomic call.
pub trait Transport {
    fn submit(&mut self, chain: &mut [SpidevTransfer]) -> io::Result<()>;
}

impl Transport for Spidev {
    fn submit(&mut self, chain: &mut [SpidevTransfer]) -> io::Result<()> {
        self.transfer_multiple(chain)
    }
}

fn open_device(path: &str, speed_hz: u32) -> Result<Spidev, CaptureError> {
    let mut spi = Spidev::open(path).map_err(|source| CaptureError::Open {
        path: path.to_owned(),
        source,
    })?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options).map_err(|source| CaptureError::Open {
        path: path.to_owned(),
        source,
    })?;
    Ok(spi)
}

/// Run the benchmark until `stop` is set or a submission fails.
///
/// Buffers are allocated before the device is touched, so an allocation
/// failure never leaves a half-submitted chain behind. Every exit path
/// releases the device handle and the three buffers through their owners.
pub fn capture(opts: &CaptureOpts, stop: &AtomicBool) -> Result<Capture, CaptureError> {
    let tx = batch::tx_block(opts.blocks, opts.channel).map_err(|source| {
        CaptureError::Allocation {
            what: "output block",
            source,
        }
    })?;
    let mut rx = batch::rx_block(opts.blocks).map_err(|source| CaptureError::Allocation {
        what: "input block",
        source,
    })?;
    let mut chain =
        batch::chain_transfers(&tx, &mut rx, opts.speed_hz).map_err(|source| {
            CaptureError::Allocation {
                what: "transfer chain",
                source,
            }
        })?;

    let mut spi = open_device(&opts.device, opts.speed_hz)?;
    info!(
        device = opts.device.as_str(),
        blocks = opts.blocks,
        channel = opts.channel,
        speed_hz = opts.speed_hz,
        "starting transfer loop"
    );

    let completed = run_loop(&mut spi, &mut chain, stop)?;
    drop(chain);

    Ok(Capture {
        completed,
        last_block: rx,
    })
}

fn run_loop<T: Transport>(
    transport: &mut T,
    chain: &mut [SpidevTransfer],
    stop: &AtomicBool,
) -> Result<u64, CaptureError> {
    let per_submit = chain.len() as u64;
    let mut completed = 0u64;
    while !stop.load(Ordering::SeqCst) {
        transport
            .submit(chain)
            .map_err(|source| CaptureError::Transfer { completed, source })?;
        completed += per_submit;
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::batch;

    fn test_chain(blocks: usize) -> (Vec<u8>, Vec<u8>) {
        (
            batch::tx_block(blocks, 0).unwrap(),
            batch::rx_block(blocks).unwrap(),
        )
    }

    /// Succeeds until `limit` submissions have gone through, then raises
    /// the stop flag from inside the transport, like an operator would.
    struct StopAfter {
        calls: u64,
        limit: u64,
        stop: Arc<AtomicBool>,
    }

    impl Transport for StopAfter {
        fn submit(&mut self, _chain: &mut [SpidevTransfer]) -> io::Result<()> {
            self.calls += 1;
            if self.calls >= self.limit {
                self.stop.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct FailAfter {
        calls: u64,
        limit: u64,
    }

    impl Transport for FailAfter {
        fn submit(&mut self, _chain: &mut [SpidevTransfer]) -> io::Result<()> {
            if self.calls == self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus fell over"));
            }
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn counts_every_completed_transfer_until_stopped() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = test_chain(1);
        let mut chain = batch::chain_transfers(&tx, &mut rx, 1_000_000).unwrap();
        let mut transport = StopAfter {
            calls: 0,
            limit: 100,
            stop: stop.clone(),
        };
        let completed = run_loop(&mut transport, &mut chain, &stop).unwrap();
        assert_eq!(completed, 100);
        assert_eq!(transport.calls, 100);
    }

    #[test]
    fn multi_block_submissions_count_in_block_units() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = test_chain(8);
        let mut chain = batch::chain_transfers(&tx, &mut rx, 1_000_000).unwrap();
        let mut transport = StopAfter {
            calls: 0,
            limit: 25,
            stop: stop.clone(),
        };
        let completed = run_loop(&mut transport, &mut chain, &stop).unwrap();
        assert_eq!(completed, 25 * 8);
    }

    #[test]
    fn interrupted_run_yields_a_valid_rate() {
        use crate::report::{SampleWindow, Stamp};

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = test_chain(1);
        let mut chain = batch::chain_transfers(&tx, &mut rx, 3_600_000).unwrap();
        let mut transport = StopAfter {
            calls: 0,
            limit: 100,
            stop: stop.clone(),
        };
        let start = Stamp::now();
        let completed = run_loop(&mut transport, &mut chain, &stop).unwrap();
        let end = Stamp::now();
        let window = SampleWindow {
            start,
            end,
            completed,
        };
        assert_eq!(window.completed, 100);
        assert!(window.elapsed_secs() >= 0.0);
        assert!(window.rate() >= 0.0);
        assert!(window.rate().is_finite());
    }

    #[test]
    fn stop_flag_is_idempotent() {
        let stop = Arc::new(AtomicBool::new(false));
        stop.store(true, Ordering::SeqCst);
        stop.store(true, Ordering::SeqCst);
        let (tx, mut rx) = test_chain(1);
        let mut chain = batch::chain_transfers(&tx, &mut rx, 1_000_000).unwrap();
        let mut transport = StopAfter {
            calls: 0,
            limit: u64::MAX,
            stop: stop.clone(),
        };
        let completed = run_loop(&mut transport, &mut chain, &stop).unwrap();
        assert_eq!(completed, 0);
        assert_eq!(transport.calls, 0, "no submission once the flag is up");
    }

    #[test]
    fn submission_failure_reports_the_partial_count() {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = test_chain(4);
        let mut chain = batch::chain_transfers(&tx, &mut rx, 1_000_000).unwrap();
        let mut transport = FailAfter { calls: 0, limit: 5 };
        let err = run_loop(&mut transport, &mut chain, &stop).unwrap_err();
        match err {
            CaptureError::Transfer { completed, .. } => assert_eq!(completed, 5 * 4),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn missing_device_reports_path_and_os_error() {
        let stop = AtomicBool::new(false);
        let opts = CaptureOpts {
            device: "/dev/spidev-does-not-exist".to_owned(),
            blocks: 1,
            channel: 0,
            speed_hz: 1_000_000,
        };
        let err = capture(&opts, &stop).unwrap_err();
        assert!(matches!(err, CaptureError::Open { .. }));
        assert!(err.to_string().contains("/dev/spidev-does-not-exist"));
    }
}
