//! Argument parsing for running from the command line

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Chained transfers per read, each one a 3-byte channel sample
    #[clap(short, long, default_value_t = 1)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub blocks: u16,
    /// ADC channel to sample
    #[clap(short, long, default_value_t = 0)]
    #[clap(value_parser = clap::value_parser!(u8).range(..=7))]
    pub channel: u8,
    /// SPI clock speed in Hz
    #[clap(short, long, default_value_t = 3_600_000)]
    #[clap(value_parser = clap::value_parser!(u32).range(1_000_000..=10_000_000))]
    pub speed: u32,
    /// Spidev device to benchmark
    #[clap(long, default_value = "/dev/spidev0.0")]
    pub device: String,
    /// Dump the decoded values from the last completed read
    #[clap(short, long)]
    pub dump: bool,
    /// Channels to scan (accepted for compatibility, only -c is sampled)
    #[clap(value_parser = clap::value_parser!(u8).range(..=7))]
    pub adc_list: Vec<u8>,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}
