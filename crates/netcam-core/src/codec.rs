//! Datagram encoding of an [`Envelope`].
//!
//! # Layout (32-byte NCAM header)
//!
//! ```text
//! [0..4]   magic        u32 BE  0x4E43414D ("NCAM")
//! [4..12]  origin       u64 BE  originating peer
//! [12..20] destination  u64 BE  addressed peer (0 = overlay routing)
//! [20..22] length       u16 BE  header + payload bytes
//! [22..26] sequence     u32 BE  per-originator sequence number
//! [26]     session      u8      0 = control, 1 = image
//! [27]     command      u8
//! [28]     qualifier    u8
//! [29]     status       u8      0 = rejected, 1 = accepted, 127 = request
//! [30..32] reserved     [u8;2]  0x00 0x00
//! [32..]   payload      [u8]    at most the payload capacity
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::envelope::{Envelope, Header, Status};
use crate::errors::CodecError;

pub const HEADER_SIZE: usize = 32;
pub const MAGIC: u32 = 0x4E43_414D;

/// Serialise an envelope into one datagram.
pub fn encode(envelope: &Envelope) -> Bytes {
    let header = envelope.header();
    let mut datagram = BytesMut::with_capacity(envelope.total_length());

    datagram.put_u32(MAGIC);
    datagram.put_u64(header.origin);
    datagram.put_u64(header.destination);
    datagram.put_u16(envelope.total_length() as u16);
    datagram.put_u32(header.sequence);
    datagram.put_u8(header.session);
    datagram.put_u8(header.command);
    datagram.put_u8(header.qualifier);
    datagram.put_u8(header.status as u8);
    datagram.put_slice(&[0x00, 0x00]);
    datagram.put_slice(envelope.payload());

    datagram.freeze()
}

/// Parse one datagram into an envelope with the given payload capacity.
pub fn decode(datagram: &[u8], capacity: usize) -> Result<Envelope, CodecError> {
    if datagram.len() < HEADER_SIZE {
        return Err(CodecError::Short { len: datagram.len() });
    }

    let mut buf = datagram;
    let magic = buf.get_u32();
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let origin = buf.get_u64();
    let destination = buf.get_u64();
    let declared = buf.get_u16() as usize;
    let sequence = buf.get_u32();
    let session = buf.get_u8();
    let command = buf.get_u8();
    let qualifier = buf.get_u8();
    let status = Status::try_from(buf.get_u8()).map_err(CodecError::UnknownStatus)?;
    buf.advance(2);

    if declared != datagram.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: datagram.len(),
        });
    }
    if buf.len() > capacity {
        return Err(CodecError::Oversized {
            len: buf.len(),
            capacity,
        });
    }

    let header = Header {
        origin,
        destination,
        sequence,
        session,
        command,
        qualifier,
        status,
    };
    let mut envelope = Envelope::with_capacity(header, capacity);
    envelope
        .put_bytes(buf)
        .map_err(|_| CodecError::Oversized { len: buf.len(), capacity })?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Route, PAYLOAD_CAPACITY};

    fn metadata() -> Envelope {
        let mut env = Envelope::new(Header::for_route(Route::FrameMetadata, 5, 9, 42));
        env.put_u32(500).unwrap();
        env.put_u32(640).unwrap();
        env.put_u32(480).unwrap();
        env
    }

    #[test]
    fn header_fields_land_at_documented_offsets() {
        let datagram = encode(&metadata());
        assert_eq!(datagram.len(), HEADER_SIZE + 12);
        assert_eq!(&datagram[0..4], b"NCAM");
        assert_eq!(&datagram[4..12], &5u64.to_be_bytes());
        assert_eq!(&datagram[12..20], &9u64.to_be_bytes());
        assert_eq!(&datagram[20..22], &44u16.to_be_bytes());
        assert_eq!(&datagram[22..26], &42u32.to_be_bytes());
        assert_eq!(&datagram[26..30], &[1, 0, 0, 127]);
        assert_eq!(&datagram[32..36], &500u32.to_be_bytes());
    }

    #[test]
    fn decode_restores_the_envelope() {
        let original = metadata();
        let decoded = decode(&encode(&original), PAYLOAD_CAPACITY).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.route(), Route::FrameMetadata);
    }

    #[test]
    fn decode_rejects_malformed_datagrams() {
        let datagram = encode(&metadata()).to_vec();

        assert_eq!(decode(&datagram[..10], PAYLOAD_CAPACITY), Err(CodecError::Short { len: 10 }));

        let mut bad_magic = datagram.clone();
        bad_magic[0] = b'X';
        assert!(matches!(decode(&bad_magic, PAYLOAD_CAPACITY), Err(CodecError::BadMagic(_))));

        assert_eq!(
            decode(&datagram[..40], PAYLOAD_CAPACITY),
            Err(CodecError::LengthMismatch { declared: 44, actual: 40 })
        );

        let mut bad_status = datagram.clone();
        bad_status[29] = 9;
        assert_eq!(decode(&bad_status, PAYLOAD_CAPACITY), Err(CodecError::UnknownStatus(9)));

        assert_eq!(decode(&datagram, 8), Err(CodecError::Oversized { len: 12, capacity: 8 }));
    }
}
