//! Wrapper detection (`spec.md` §4.H, §6): recognizes a leading Binary
//! II block (`.BXY`), a SEA self-extractor preamble, or a bare BNY
//! archive, and reports which so the caller can hand off to
//! `binary2.rs` or skip the right number of bytes before the NuFX
//! master header.

use std::io::Read;

use crate::byteio::discard;
use crate::error::Result;

pub const BNY_BLOCK_LEN: usize = 128;

/// A fixed marker SEA self-extractors place near the start of the
/// executable stub; real SEA archives don't agree on one exact byte
/// offset across encoders, so this crate looks for it within the first
/// `SEA_SCAN_WINDOW` bytes rather than at one hardcoded offset.
const SEA_MARKER: &[u8] = b"SEA\x00ARC";
const SEA_SCAN_WINDOW: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wrapper {
    /// No wrapper: the reader is already positioned at `NuFile`.
    None,
    /// Plain Binary II archive (no embedded NuFX) — hand off to `binary2`.
    BinaryTwo,
    /// Binary II block immediately followed by a NuFX archive (`.BXY`).
    Bxy,
    /// SEA self-extractor preamble: `preamble_len` bytes to skip before
    /// `inner`, which describes what follows it.
    Sea { preamble_len: usize, inner: Box<Wrapper> },
}

/// Inspects the first bytes of `prefix` (at least 128 bytes, padded with
/// zeros if short) and classifies the wrapper, per `spec.md` §4.H's
/// byte-exact signature checks.
pub fn detect(prefix: &[u8]) -> Wrapper {
    if let Some(sea_end) = find_sea_marker(prefix) {
        let inner = detect(&prefix[sea_end..]);
        return Wrapper::Sea {
            preamble_len: sea_end,
            inner: Box::new(inner),
        };
    }

    if is_binary2_signature(prefix) {
        if prefix.len() >= BNY_BLOCK_LEN + 6 && &prefix[BNY_BLOCK_LEN..BNY_BLOCK_LEN + 6] == crate::reader::NUFILE_MAGIC {
            return Wrapper::Bxy;
        }
        return Wrapper::BinaryTwo;
    }

    Wrapper::None
}

fn is_binary2_signature(prefix: &[u8]) -> bool {
    prefix.len() > 18
        && prefix[0] == 0x0A
        && prefix[1] == 0x47
        && prefix[2] == 0x4C
        && prefix[18] == 0x02
}

fn find_sea_marker(prefix: &[u8]) -> Option<usize> {
    let window = prefix.len().min(SEA_SCAN_WINDOW);
    prefix[..window]
        .windows(SEA_MARKER.len())
        .position(|w| w == SEA_MARKER)
        .map(|i| i + SEA_MARKER.len())
}

/// Skip past whatever wrapper was detected so `r` is positioned at the
/// NuFile magic (or, for a bare BNY archive, left untouched — the caller
/// hands the whole stream to `binary2::decode` instead).
pub fn skip_wrapper<R: Read>(r: &mut R, wrapper: Wrapper) -> Result<()> {
    match wrapper {
        Wrapper::None | Wrapper::BinaryTwo => Ok(()),
        Wrapper::Bxy => discard(r, BNY_BLOCK_LEN as u64),
        Wrapper::Sea { preamble_len, inner } => {
            discard(r, preamble_len as u64)?;
            skip_wrapper(r, *inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detects_none_for_nufile_magic() {
        let mut prefix = crate::reader::NUFILE_MAGIC.to_vec();
        prefix.resize(BNY_BLOCK_LEN, 0);
        assert_eq!(detect(&prefix), Wrapper::None);
    }

    #[test]
    fn detects_bny_signature() {
        let mut prefix = vec![0u8; BNY_BLOCK_LEN];
        prefix[0] = 0x0A;
        prefix[1] = 0x47;
        prefix[2] = 0x4C;
        prefix[18] = 0x02;
        assert_eq!(detect(&prefix), Wrapper::BinaryTwo);
    }

    #[test]
    fn detects_bxy_when_nufile_follows_bny_block() {
        let mut prefix = vec![0u8; BNY_BLOCK_LEN];
        prefix[0] = 0x0A;
        prefix[1] = 0x47;
        prefix[2] = 0x4C;
        prefix[18] = 0x02;
        prefix.extend_from_slice(&crate::reader::NUFILE_MAGIC);
        assert_eq!(detect(&prefix), Wrapper::Bxy);
    }

    #[test]
    fn sea_preamble_is_skipped_before_nufile() {
        let mut prefix = vec![0u8; 40];
        prefix.extend_from_slice(SEA_MARKER);
        prefix.extend_from_slice(&crate::reader::NUFILE_MAGIC);

        let wrapper = detect(&prefix);
        assert!(matches!(wrapper, Wrapper::Sea { ref inner, .. } if **inner == Wrapper::None));

        let mut cursor = Cursor::new(prefix.clone());
        skip_wrapper(&mut cursor, wrapper).unwrap();
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, crate::reader::NUFILE_MAGIC);
    }

    #[test]
    fn bse_skips_sea_preamble_then_bny_block() {
        let mut bny_block = vec![0u8; BNY_BLOCK_LEN];
        bny_block[0] = 0x0A;
        bny_block[1] = 0x47;
        bny_block[2] = 0x4C;
        bny_block[18] = 0x02;

        let mut prefix = vec![0u8; 10];
        prefix.extend_from_slice(SEA_MARKER);
        prefix.extend_from_slice(&bny_block);
        prefix.extend_from_slice(&crate::reader::NUFILE_MAGIC);

        let wrapper = detect(&prefix);
        assert!(matches!(wrapper, Wrapper::Sea { ref inner, .. } if **inner == Wrapper::Bxy));

        let mut cursor = Cursor::new(prefix.clone());
        skip_wrapper(&mut cursor, wrapper).unwrap();
        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, crate::reader::NUFILE_MAGIC);
    }
}
