use bytes::{Buf, BytesMut};
use log2::*;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use crate::error::{Error, Result};
use crate::fcgi_record::{FcgiRecord, RecordType, FCGI_HEADER_LEN};

/// Turns a byte stream into a sequence of framed records. The framing
/// fields themselves are parsed by `FcgiRecord`; this only buffers and
/// slices the stream.
pub struct FcgiReader<R> {
    rdstream: BufReader<R>,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FcgiReader<R> {
    pub fn new(stream: R) -> FcgiReader<R> {
        FcgiReader {
            rdstream: BufReader::new(stream),
            buf: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Next record, or `None` on a clean end of stream at a record
    /// boundary. End of stream inside a record is a framing error.
    pub async fn read_record(&mut self) -> Result<Option<FcgiRecord>> {
        loop {
            if let Some(record) = self.parse_buffered()? {
                if record.record_type == RecordType::Unknown {
                    warn!("passing through record of unrecognized type, id={}", record.request_id);
                }
                debug!(
                    "read {} record: id={} content_length={}",
                    record.record_type.name(),
                    record.request_id,
                    record.content_length
                );
                return Ok(Some(record));
            }
            let n = self.rdstream.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::MalformedRecord("stream ended inside a record".to_owned()));
            }
        }
    }

    fn parse_buffered(&mut self) -> Result<Option<FcgiRecord>> {
        if self.buf.len() < FCGI_HEADER_LEN {
            return Ok(None);
        }
        let mut record = FcgiRecord::parse_header(&self.buf[..FCGI_HEADER_LEN])?;
        let content_end = FCGI_HEADER_LEN + record.content_length as usize;
        let total = content_end + record.padding_length as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        record.attach_payload(&self.buf[FCGI_HEADER_LEN..content_end], &self.buf[content_end..total])?;
        self.buf.advance(total);
        Ok(Some(record))
    }

    pub fn into_inner(self) -> R {
        self.rdstream.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_records_back_to_back() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&FcgiRecord::new(RecordType::Params, 1, b"\x01\x01ab").to_bytes());
        wire.extend_from_slice(&FcgiRecord::new(RecordType::StdIn, 1, b"body").to_bytes());
        wire.extend_from_slice(&FcgiRecord::new(RecordType::StdIn, 1, &[]).to_bytes());

        let mut reader = FcgiReader::new(&wire[..]);
        let first = reader.read_record().await.unwrap().unwrap();
        assert_eq!(first.record_type, RecordType::Params);
        assert_eq!(first.content, b"\x01\x01ab");

        let second = reader.read_record().await.unwrap().unwrap();
        assert_eq!(second.record_type, RecordType::StdIn);
        assert_eq!(second.content, b"body");

        let third = reader.read_record().await.unwrap().unwrap();
        assert_eq!(third.content_length, 0);

        assert!(reader.read_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reassembles_records_split_across_writes() {
        let record = FcgiRecord::new(RecordType::StdIn, 7, b"fragmented payload");
        let wire = record.to_bytes();

        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = FcgiReader::new(rx);

        tx.write_all(&wire[..3]).await.unwrap();
        tx.write_all(&wire[3..11]).await.unwrap();
        tx.write_all(&wire[11..]).await.unwrap();
        drop(tx);

        let decoded = reader.read_record().await.unwrap().unwrap();
        assert_eq!(decoded.request_id, 7);
        assert_eq!(decoded.content, b"fragmented payload");
        assert!(reader.read_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_stream_is_a_framing_error() {
        let wire = FcgiRecord::new(RecordType::StdIn, 1, b"cut short").to_bytes();
        let mut reader = FcgiReader::new(&wire[..wire.len() - 2]);
        assert!(matches!(
            reader.read_record().await,
            Err(Error::MalformedRecord(_))
        ));
    }

    #[tokio::test]
    async fn bad_version_byte_is_a_framing_error() {
        let mut wire = FcgiRecord::new(RecordType::StdIn, 1, b"x").to_bytes().to_vec();
        wire[0] = 2;
        let mut reader = FcgiReader::new(&wire[..]);
        assert!(matches!(
            reader.read_record().await,
            Err(Error::MalformedRecord(_))
        ));
    }
}
