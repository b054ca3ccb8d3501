//! StoveLink thermal-frame packet encoder.
//!
//! Wire format (little-endian, 1552 bytes):
//! ```text
//! ┌──────────┬──────────┬────────────┬────────────┬──────────┬───────────────────────┐
//! │ seq (u32)│ ms (u32) │ open % f32 │ burn s u16 │ rsvd u16 │ 768 × u16 (0.1 °C)    │
//! └──────────┴──────────┴────────────┴────────────┴──────────┴───────────────────────┘
//!  0          4          8            12           14         16                  1552
//! ```
//!
//! Vent position goes out as *open* percentage: 100 = fully open, 0 =
//! fully closed.  Every field is clamped into its wire type.

use log::debug;

use crate::error::{Error, Result};

/// Thermal frame dimensions (32 × 24 sensor).
pub const FRAME_PIXELS: usize = 768;
pub const HEADER_SIZE: usize = 16;
pub const PACKET_SIZE: usize = HEADER_SIZE + FRAME_PIXELS * 2;

/// Decoded packet header, for collectors and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHeader {
    pub sequence: u32,
    pub timestamp_ms: u32,
    pub open_percent: f32,
    pub combustion_secs: u16,
}

impl PacketHeader {
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() != PACKET_SIZE {
            return Err(Error::Telemetry("packet must be 1552 bytes"));
        }
        let u32_at = |i: usize| u32::from_le_bytes([packet[i], packet[i + 1], packet[i + 2], packet[i + 3]]);
        Ok(Self {
            sequence: u32_at(0),
            timestamp_ms: u32_at(4),
            open_percent: f32::from_bits(u32_at(8)),
            combustion_secs: u16::from_le_bytes([packet[12], packet[13]]),
        })
    }
}

/// Stateful encoder: owns the rolling sequence counter.
#[derive(Debug, Default)]
pub struct StoveLinkEncoder {
    sequence: u32,
}

impl StoveLinkEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u32 {
        self.sequence
    }

    /// Encode one frame of temperatures (°C) with vent metadata.
    ///
    /// `position` is the controller's fraction (0 = open, 1 = closed).
    pub fn encode_into(
        &mut self,
        frame: &[f32],
        position: f32,
        combustion_secs: f64,
        timestamp_ms: u32,
        out: &mut [u8; PACKET_SIZE],
    ) -> Result<()> {
        if frame.len() != FRAME_PIXELS {
            return Err(Error::Telemetry("thermal frame must hold 768 pixels"));
        }

        let open_percent = ((1.0 - position) * 100.0).clamp(0.0, 100.0);
        let burn = combustion_secs.clamp(0.0, f64::from(u16::MAX)) as u16;

        out[0..4].copy_from_slice(&self.sequence.to_le_bytes());
        out[4..8].copy_from_slice(&timestamp_ms.to_le_bytes());
        out[8..12].copy_from_slice(&open_percent.to_le_bytes());
        out[12..14].copy_from_slice(&burn.to_le_bytes());
        out[14..16].copy_from_slice(&0u16.to_le_bytes());

        for (chunk, celsius) in out[HEADER_SIZE..].chunks_exact_mut(2).zip(frame) {
            // Saturating cast: negatives and NaN land on 0.
            let tenths = (celsius * 10.0) as u16;
            chunk.copy_from_slice(&tenths.to_le_bytes());
        }

        debug!(
            "stovelink: seq={} ts={} open={:.1}% burn={}s",
            self.sequence, timestamp_ms, open_percent, burn
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    /// Allocating convenience wrapper around [`encode_into`](Self::encode_into).
    pub fn encode(&mut self, frame: &[f32], position: f32, combustion_secs: f64, timestamp_ms: u32) -> Result<Vec<u8>> {
        let mut out = [0u8; PACKET_SIZE];
        self.encode_into(frame, position, combustion_secs, timestamp_ms, &mut out)?;
        Ok(out.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(celsius: f32) -> Vec<f32> {
        vec![celsius; FRAME_PIXELS]
    }

    fn pixel(packet: &[u8], i: usize) -> u16 {
        let at = HEADER_SIZE + i * 2;
        u16::from_le_bytes([packet[at], packet[at + 1]])
    }

    #[test]
    fn packet_is_fixed_size() {
        let mut enc = StoveLinkEncoder::new();
        let packet = enc.encode(&flat(20.0), 0.0, 0.0, 0).unwrap();
        assert_eq!(packet.len(), PACKET_SIZE);
        assert_eq!(PACKET_SIZE, 1552);
    }

    #[test]
    fn header_fields() {
        let mut enc = StoveLinkEncoder::new();
        let packet = enc.encode(&flat(20.0), 0.25, 61.7, 123_456).unwrap();
        let header = PacketHeader::parse(&packet).unwrap();
        assert_eq!(header.sequence, 0);
        assert_eq!(header.timestamp_ms, 123_456);
        assert_eq!(header.open_percent, 75.0);
        assert_eq!(header.combustion_secs, 61);
        assert_eq!(&packet[14..16], &[0, 0]);
    }

    #[test]
    fn sequence_increments_and_wraps() {
        let mut enc = StoveLinkEncoder { sequence: u32::MAX };
        let first = enc.encode(&flat(0.0), 0.0, 0.0, 0).unwrap();
        let second = enc.encode(&flat(0.0), 0.0, 0.0, 0).unwrap();
        assert_eq!(PacketHeader::parse(&first).unwrap().sequence, u32::MAX);
        assert_eq!(PacketHeader::parse(&second).unwrap().sequence, 0);
        assert_eq!(enc.next_sequence(), 1);
    }

    #[test]
    fn temperatures_in_tenths_and_clamped() {
        let mut frame = flat(21.37);
        frame[1] = -5.0;
        frame[2] = 10_000.0;
        let packet = StoveLinkEncoder::new().encode(&frame, 1.0, 0.0, 0).unwrap();
        assert_eq!(pixel(&packet, 0), 213);
        assert_eq!(pixel(&packet, 1), 0);
        assert_eq!(pixel(&packet, 2), u16::MAX);
        assert_eq!(PacketHeader::parse(&packet).unwrap().open_percent, 0.0);
    }

    #[test]
    fn out_of_range_metadata_is_clamped() {
        let packet = StoveLinkEncoder::new()
            .encode(&flat(0.0), -0.5, 1.0e9, 0)
            .unwrap();
        let header = PacketHeader::parse(&packet).unwrap();
        assert_eq!(header.open_percent, 100.0);
        assert_eq!(header.combustion_secs, u16::MAX);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut enc = StoveLinkEncoder::new();
        assert!(matches!(enc.encode(&[0.0; 10], 0.0, 0.0, 0), Err(Error::Telemetry(_))));
        // A rejected frame does not consume a sequence number.
        assert_eq!(enc.next_sequence(), 0);
    }

    #[test]
    fn parse_rejects_short_buffer() {
        assert!(PacketHeader::parse(&[0u8; 16]).is_err());
    }
}
