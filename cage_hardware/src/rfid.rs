//! ASCII frame format of ID-series 125 kHz readers.
//!
//! `STX | 10 hex data | 2 hex checksum | CR | LF | ETX`, 16 bytes total.
//! The tag number is the 10 data characters read as one hexadecimal value;
//! the checksum is the XOR of the five data bytes.
use cage_traits::TagId;
use thiserror::Error;

pub const FRAME_LEN: usize = 16;
const STX: u8 = 0x02;
const ETX: u8 = 0x03;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is {0} bytes, expected {FRAME_LEN}")]
    Length(usize),
    #[error("frame is missing STX/ETX markers")]
    Framing,
    #[error("non-hex character in frame")]
    NotHex,
    #[error("checksum mismatch: computed {computed:02X}, frame says {stated:02X}")]
    Checksum { computed: u8, stated: u8 },
}

pub fn parse_id_frame(frame: &[u8], verify_checksum: bool) -> Result<TagId, FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::Length(frame.len()));
    }
    if frame[0] != STX || frame[FRAME_LEN - 1] != ETX {
        return Err(FrameError::Framing);
    }
    let data = std::str::from_utf8(&frame[1..11]).map_err(|_| FrameError::NotHex)?;
    let tag = u64::from_str_radix(data, 16).map_err(|_| FrameError::NotHex)?;

    if verify_checksum {
        let stated = std::str::from_utf8(&frame[11..13])
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or(FrameError::NotHex)?;
        let computed = (0..5).fold(0u8, |acc, i| acc ^ ((tag >> (8 * i)) & 0xFF) as u8);
        if computed != stated {
            return Err(FrameError::Checksum { computed, stated });
        }
    }
    Ok(TagId(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str, checksum: &str) -> Vec<u8> {
        let mut v = vec![STX];
        v.extend_from_slice(data.as_bytes());
        v.extend_from_slice(checksum.as_bytes());
        v.extend_from_slice(b"\r\n");
        v.push(ETX);
        v
    }

    #[test]
    fn parses_valid_frame() {
        // 0x0F ^ 0x00 ^ 0x1A ^ 0x2B ^ 0x3C = 0x02
        let f = frame("0F001A2B3C", "02");
        assert_eq!(parse_id_frame(&f, true), Ok(TagId(0x0F001A2B3C)));
    }

    #[test]
    fn checksum_only_checked_when_asked() {
        let f = frame("0F001A2B3C", "FF");
        assert!(matches!(
            parse_id_frame(&f, true),
            Err(FrameError::Checksum { computed: 0x02, stated: 0xFF })
        ));
        assert_eq!(parse_id_frame(&f, false), Ok(TagId(0x0F001A2B3C)));
    }

    #[test]
    fn rejects_truncated_and_garbled() {
        assert_eq!(parse_id_frame(b"\x02abc", false), Err(FrameError::Length(4)));
        let mut f = frame("0F001A2B3C", "02");
        f[0] = b'X';
        assert_eq!(parse_id_frame(&f, false), Err(FrameError::Framing));
        let f = frame("0F00ZZ2B3C", "02");
        assert_eq!(parse_id_frame(&f, false), Err(FrameError::NotHex));
    }
}
