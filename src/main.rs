use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adc_hammer::args::{convert_filter, Args};
use adc_hammer::capture::{self, CaptureError, CaptureOpts};
use adc_hammer::report::{self, SampleWindow, Stamp};
use clap::Parser;
use tracing::{debug, error};

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    if !args.adc_list.is_empty() {
        debug!("channel list ignored, sampling channel {} only", args.channel);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        error!("installing interrupt handler: {}", e);
        return ExitCode::FAILURE;
    }

    let opts = CaptureOpts {
        device: args.device,
        blocks: args.blocks as usize,
        channel: args.channel,
        speed_hz: args.speed,
    };

    println!("\n(use ctrl-c to stop)\n");
    let start = Stamp::now();

    match capture::capture(&opts, &stop) {
        Ok(cap) => {
            let window = SampleWindow {
                start,
                end: Stamp::now(),
                completed: cap.completed,
            };
            if args.dump {
                print!("{}", report::format_dump(&cap.last_block));
            }
            if window.completed > 0 {
                print!("{}", report::format_summary(&window));
            }
            ExitCode::SUCCESS
        }
        Err(CaptureError::Transfer { completed, source }) => {
            error!("submitting transfer block: {}", source);
            if completed > 0 {
                let window = SampleWindow {
                    start,
                    end: Stamp::now(),
                    completed,
                };
                print!("{}", report::format_summary(&window));
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
