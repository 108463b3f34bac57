use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::Result;
use crate::fcgi_record::{FcgiRecord, RecordType, FCGI_MAX_CONTENT_LEN};

pub struct FcgiWriter<W> {
    wrstream: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FcgiWriter<W> {
    pub fn new(stream: W) -> FcgiWriter<W> {
        FcgiWriter {
            wrstream: BufWriter::new(stream),
        }
    }

    pub fn take_stream(self) -> W {
        self.wrstream.into_inner()
    }

    pub async fn send_record(&mut self, record: &FcgiRecord) -> Result<()> {
        self.wrstream.write_all(&record.to_bytes()).await?;
        self.wrstream.flush().await?;
        Ok(())
    }

    /// Send stream content, split into records no larger than the 16-bit
    /// content length allows. Does not terminate the stream.
    pub async fn send_stream(&mut self, record_type: RecordType, request_id: u16, content: &[u8]) -> Result<()> {
        for chunk in content.chunks(FCGI_MAX_CONTENT_LEN) {
            self.send_record(&FcgiRecord::new(record_type, request_id, chunk)).await?;
        }
        Ok(())
    }

    /// Zero-length record marking the end of a stream.
    pub async fn end_stream(&mut self, record_type: RecordType, request_id: u16) -> Result<()> {
        self.send_record(&FcgiRecord::new(record_type, request_id, &[])).await
    }
}
