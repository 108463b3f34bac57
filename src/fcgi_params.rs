use bytes::{Buf, BufMut, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::{Error, Result};

/// Incremental decoder for FastCGI name-value pair streams (Params,
/// GetValues content). Pairs may be split across arbitrary `put`
/// boundaries; `next_pair` yields nothing until a whole pair is buffered.
pub struct FcgiParamsParser {
    buf: BytesMut,
    last_read_len: usize,
}

impl FcgiParamsParser {
    pub fn new() -> FcgiParamsParser {
        FcgiParamsParser { buf: BytesMut::with_capacity(4096), last_read_len: 0 }
    }

    pub fn put(&mut self, src: &[u8]) {
        self.buf.put_slice(src);
    }

    pub fn next_pair(&mut self) -> Result<Option<(&str, &str)>> {
        // The previous pair is consumed lazily so its borrows stay valid
        // until the caller asks for the next one.
        if self.last_read_len > 0 {
            self.buf.advance(self.last_read_len);
            self.last_read_len = 0;
        }
        let mut peeker = Cursor::new(&self.buf[..]);
        let name_len = match parse_len(&mut peeker) {
            Some(len) => len as usize,
            None => return Ok(None),
        };
        let value_len = match parse_len(&mut peeker) {
            Some(len) => len as usize,
            None => return Ok(None),
        };
        if peeker.remaining() < name_len + value_len {
            return Ok(None);
        }
        let start = peeker.position() as usize;
        self.last_read_len = start + name_len + value_len;
        let bytes = &self.buf[start..];
        let name = std::str::from_utf8(&bytes[..name_len])
            .map_err(|_| Error::MalformedRequest("non-utf8 bytes in param name".to_owned()))?;
        let value = std::str::from_utf8(&bytes[name_len..name_len + value_len])
            .map_err(|_| Error::MalformedRequest("non-utf8 bytes in param value".to_owned()))?;
        Ok(Some((name, value)))
    }

    /// Drain every complete pair into `env`; later duplicates overwrite.
    pub fn collect_env(&mut self, env: &mut HashMap<String, String>) -> Result<()> {
        while let Some((name, value)) = self.next_pair()? {
            env.insert(name.to_owned(), value.to_owned());
        }
        Ok(())
    }
}

impl Default for FcgiParamsParser {
    fn default() -> FcgiParamsParser {
        FcgiParamsParser::new()
    }
}

fn parse_len(peeker: &mut Cursor<&[u8]>) -> Option<u32> {
    if peeker.remaining() < 1 {
        return None;
    }
    let len1 = peeker.get_u8();
    if len1 & 0x80 == 0 {
        return Some(len1 as u32);
    }
    if peeker.remaining() < 3 {
        return None;
    }
    Some(((len1 as u32 & 0x7f) << 24) | (peeker.get_uint(3) as u32))
}

/// Encode one name-value pair, the content format of GetValues and
/// GetValuesResult records. Lengths below 128 take one byte, larger
/// ones four with the high bit set.
pub fn encode_pair(name: &[u8], value: &[u8], out: &mut BytesMut) {
    put_len(name.len(), out);
    put_len(value.len(), out);
    out.put_slice(name);
    out.put_slice(value);
}

fn put_len(len: usize, out: &mut BytesMut) {
    if len < 128 {
        out.put_u8(len as u8);
    } else {
        out.put_u32(len as u32 | 0x8000_0000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_pairs() {
        let mut parser = FcgiParamsParser::new();
        parser.put(b"\x04\x09HOSTlocalhost");
        assert_eq!(parser.next_pair().unwrap(), Some(("HOST", "localhost")));
        assert_eq!(parser.next_pair().unwrap(), None);
    }

    #[test]
    fn parses_pairs_split_across_put_boundaries() {
        let mut parser = FcgiParamsParser::new();
        parser.put(b"\x0e\x03REQUEST");
        assert_eq!(parser.next_pair().unwrap(), None);
        parser.put(b"_METHODGET\x0c\x01QUERY");
        assert_eq!(parser.next_pair().unwrap(), Some(("REQUEST_METHOD", "GET")));
        assert_eq!(parser.next_pair().unwrap(), None);
        parser.put(b"_STRINGx");
        assert_eq!(parser.next_pair().unwrap(), Some(("QUERY_STRING", "x")));
    }

    #[test]
    fn parses_four_byte_lengths() {
        let value = "v".repeat(300);
        let mut encoded = BytesMut::new();
        encode_pair(b"LONG", value.as_bytes(), &mut encoded);
        // 1-byte name length, 4-byte value length with the high bit set
        assert_eq!(encoded[0], 4);
        assert_eq!(&encoded[1..5], &[0x80, 0x00, 0x01, 0x2c]);

        let mut parser = FcgiParamsParser::new();
        parser.put(&encoded);
        assert_eq!(parser.next_pair().unwrap(), Some(("LONG", value.as_str())));
    }

    #[test]
    fn incomplete_four_byte_length_waits_for_more_data() {
        let mut parser = FcgiParamsParser::new();
        parser.put(&[0x80, 0x00]);
        assert_eq!(parser.next_pair().unwrap(), None);
    }

    #[test]
    fn non_utf8_name_is_malformed() {
        let mut parser = FcgiParamsParser::new();
        parser.put(&[0x02, 0x00, 0xff, 0xfe]);
        assert!(matches!(
            parser.next_pair(),
            Err(Error::MalformedRequest(_))
        ));
    }

    #[test]
    fn collect_env_overwrites_duplicate_keys() {
        let mut encoded = BytesMut::new();
        encode_pair(b"A", b"1", &mut encoded);
        encode_pair(b"B", b"2", &mut encoded);
        encode_pair(b"A", b"3", &mut encoded);

        let mut parser = FcgiParamsParser::new();
        parser.put(&encoded);
        let mut env = HashMap::new();
        parser.collect_env(&mut env).unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env["A"], "3");
        assert_eq!(env["B"], "2");
    }

    #[test]
    fn encode_matches_decoder_for_empty_pair() {
        let mut encoded = BytesMut::new();
        encode_pair(b"", b"", &mut encoded);
        assert_eq!(&encoded[..], &[0x00, 0x00]);

        let mut parser = FcgiParamsParser::new();
        parser.put(&encoded);
        assert_eq!(parser.next_pair().unwrap(), Some(("", "")));
    }
}
