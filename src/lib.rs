//! Throughput benchmark for MCP3008-family ADCs behind Linux spidev.
//!
//! Each read of a channel is a 3-byte full-duplex SPI exchange. To measure
//! how fast the bus can go, we chain a block of those exchanges into a
//! single `SPI_IOC_MESSAGE` submission and hammer the device with it until
//! someone hits ctrl-c, then report the achieved sample rate.

pub mod args;
pub mod batch;
pub mod capture;
pub mod report;
