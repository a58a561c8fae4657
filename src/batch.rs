//! Construction of the chained transfer block submitted on every read.

use std::collections::TryReserveError;

use spidev::SpidevTransfer;

/// Bytes reserved per transfer slot. 4 keeps the slots word aligned even
/// though only 3 are clocked out.
pub const SLOT_BYTES: usize = 4;
/// Bytes clocked per transfer: the command byte plus two response bytes.
pub const TRANSFER_BYTES: usize = 3;

// Start bit and single-ended mode, the channel goes in the next 3 bits.
const CMD_BASE: u8 = 0x60;

/// The command byte for a single-ended read of `channel`.
pub fn command_byte(channel: u8) -> u8 {
    debug_assert!(channel <= 7);
    CMD_BASE | (channel << 2)
}

/// Allocate the zero-filled output block with the command byte stamped
/// into the first byte of every slot.
pub fn tx_block(blocks: usize, channel: u8) -> Result<Vec<u8>, TryReserveError> {
    let mut tx = zeroed(blocks * SLOT_BYTES)?;
    for slot in tx.chunks_exact_mut(SLOT_BYTES) {
        slot[0] = command_byte(channel);
    }
    Ok(tx)
}

/// Allocate the zero-filled input block the device response lands in.
pub fn rx_block(blocks: usize) -> Result<Vec<u8>, TryReserveError> {
    zeroed(blocks * SLOT_BYTES)
}

fn zeroed(len: usize) -> Result<Vec<u8>, TryReserveError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Chain one descriptor per slot across the two blocks.
///
/// Chip select is held between chained transfers. The last transfer must
/// release it or the first read of the next block is lost.
pub fn chain_transfers<'a>(
    tx: &'a [u8],
    rx: &'a mut [u8],
    speed_hz: u32,
) -> Result<Vec<SpidevTransfer<'a, 'a>>, TryReserveError> {
    debug_assert_eq!(tx.len(), rx.len());
    let blocks = tx.len() / SLOT_BYTES;
    let mut chain = Vec::new();
    chain.try_reserve_exact(blocks)?;
    let slots = tx.chunks_exact(SLOT_BYTES).zip(rx.chunks_exact_mut(SLOT_BYTES));
    for (i, (tx_slot, rx_slot)) in slots.enumerate() {
        let mut xfer =
            SpidevTransfer::read_write(&tx_slot[..TRANSFER_BYTES], &mut rx_slot[..TRANSFER_BYTES]);
        xfer.speed_hz = speed_hz;
        xfer.cs_change = u8::from(i != blocks - 1);
        chain.push(xfer);
    }
    Ok(chain)
}
