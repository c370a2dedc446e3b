//! avl-core: Pure frame decoding for GPS tracker protocols.
//!
//! No async, no I/O — just the binary decoders and validation rules.
//! This crate is the shared core used by `avl-server`, which owns the
//! TCP listeners and the storage sink.
//!
//! Supported protocols:
//! - Ruptela (single-phase, IMEI carried in every frame)
//! - Teltonika (IMEI handshake phase + codec 8 data phase)

pub mod cursor;
pub mod decode;
pub mod ruptela;
pub mod teltonika;
pub mod types;
pub mod validate;

// Re-export commonly used items at crate root
pub use decode::{decoder_for, FrameDecoder, RuptelaDecoder, TeltonikaDecoder};
pub use types::{AvlError, DecodedFrame, GeoPoint, PositionRecord, Protocol};
pub use validate::{record_valid, valid_coordinates};
