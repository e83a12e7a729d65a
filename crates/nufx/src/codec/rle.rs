//! Two-state run-length encoding shared by the LZW codecs
//! (`spec.md` §4.D): a delimiter byte introduces a run as
//! `byte, delim, count`; a literal occurrence of the delimiter itself is
//! escaped as `delim, 0x00`. Parameterized over the delimiter since LZW/1
//! and LZW/2 chunks carry their own delimiter byte in the chunk header,
//! unlike SQ's fixed `0x90` (see `codec::sq`, which keeps its own copy of
//! this logic inline for that reason).

const MIN_RUN: usize = 3;
const MAX_RUN: usize = 255;

pub fn encode(data: &[u8], delim: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == byte && run < MAX_RUN {
            run += 1;
        }

        if byte == delim {
            out.push(delim);
            out.push(0x00);
            i += 1;
            continue;
        }

        if run >= MIN_RUN {
            out.push(byte);
            out.push(delim);
            out.push(run as u8);
            i += run;
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

pub fn decode(data: &[u8], delim: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte == delim {
            let count = *data.get(i + 1).unwrap_or(&0);
            if count == 0 {
                out.push(delim);
                i += 2;
            } else {
                // `out` already carries the run's first byte (pushed by
                // the non-delim branch before this delimiter was seen);
                // `count` is the *total* run length, so only count-1
                // more copies are needed.
                let prev = *out.last().unwrap_or(&0);
                for _ in 0..count - 1 {
                    out.push(prev);
                }
                i += 2;
            }
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_run() {
        let data = b"aaaaabbbcccccccccccd".to_vec();
        let encoded = encode(&data, 0x90);
        let decoded = decode(&encoded, 0x90);
        assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrip_no_runs() {
        let data = b"abcdefg".to_vec();
        let encoded = encode(&data, 0x90);
        let decoded = decode(&encoded, 0x90);
        assert_eq!(decoded, data);
    }

    #[test]
    fn escapes_literal_delimiter() {
        let data = vec![0x90, 0x90, 0x90];
        let encoded = encode(&data, 0x90);
        let decoded = decode(&encoded, 0x90);
        assert_eq!(decoded, data);
    }

    #[test]
    fn custom_delimiter() {
        let data = b"xxxxxxxxyz".to_vec();
        let encoded = encode(&data, 0xDB);
        let decoded = decode(&encoded, 0xDB);
        assert_eq!(decoded, data);
    }
}
