//! Protocol dispatch behind a single-operation trait.
//!
//! The listener for a port is configured with exactly one protocol, so
//! the implementation is chosen once at startup and never inferred from
//! traffic.

use crate::types::{DecodedFrame, Protocol, Result};
use crate::{ruptela, teltonika};

/// A stateless frame decoder for one tracker protocol.
///
/// `learned_imei` is the identifier the session learned from earlier
/// messages on the same connection; protocols whose data frames do not
/// carry the IMEI (Teltonika) stamp it onto their records.
pub trait FrameDecoder: Send + Sync {
    fn protocol(&self) -> Protocol;
    fn decode(&self, buf: &[u8], learned_imei: &str) -> Result<DecodedFrame>;
}

pub struct RuptelaDecoder;

impl FrameDecoder for RuptelaDecoder {
    fn protocol(&self) -> Protocol {
        Protocol::Ruptela
    }

    fn decode(&self, buf: &[u8], learned_imei: &str) -> Result<DecodedFrame> {
        ruptela::decode(buf, learned_imei)
    }
}

pub struct TeltonikaDecoder;

impl FrameDecoder for TeltonikaDecoder {
    fn protocol(&self) -> Protocol {
        Protocol::Teltonika
    }

    fn decode(&self, buf: &[u8], learned_imei: &str) -> Result<DecodedFrame> {
        teltonika::decode(buf, learned_imei)
    }
}

/// Build the decoder for a configured protocol.
pub fn decoder_for(protocol: Protocol) -> Box<dyn FrameDecoder> {
    match protocol {
        Protocol::Ruptela => Box::new(RuptelaDecoder),
        Protocol::Teltonika => Box::new(TeltonikaDecoder),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_for() {
        assert_eq!(decoder_for(Protocol::Ruptela).protocol(), Protocol::Ruptela);
        assert_eq!(
            decoder_for(Protocol::Teltonika).protocol(),
            Protocol::Teltonika
        );
    }

    #[test]
    fn test_dispatch_reaches_decoder() {
        // A Teltonika identification message through the trait object
        let mut msg = vec![0x00, 0x05];
        msg.extend_from_slice(b"12345");
        let decoded = decoder_for(Protocol::Teltonika).decode(&msg, "").unwrap();
        assert_eq!(decoded.imei.as_deref(), Some("000000000012345"));
    }
}
