use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use crate::error::{Error, Result};

pub const FCGI_HEADER_LEN: usize = 8;
pub const FCGI_MAX_CONTENT_LEN: usize = 65535;

pub const FCGI_KEEP_CONN: u8 = 1;

// Variable names understood in GetValues / GetValuesResult content.
pub const FCGI_MAX_CONNS: &str = "FCGI_MAX_CONNS";
pub const FCGI_MAX_REQS: &str = "FCGI_MAX_REQS";
pub const FCGI_MPXS_CONNS: &str = "FCGI_MPXS_CONNS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1 = 1,
}

impl Version {
    pub fn from_u8(byte: u8) -> Result<Version> {
        match byte {
            1 => Ok(Version::V1),
            _ => Err(Error::MalformedRecord(format!("unrecognized protocol version {}", byte))),
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Version::V1 => "FCGI_VERSION_1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    StdIn = 5,
    StdOut = 6,
    StdErr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    Unknown = 11,
}

impl RecordType {
    // Unrecognized bytes map to Unknown so that protocol extensions
    // don't kill the connection.
    pub fn from_u8(byte: u8) -> RecordType {
        match byte {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::StdIn,
            6 => RecordType::StdOut,
            7 => RecordType::StdErr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            _ => RecordType::Unknown,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            RecordType::BeginRequest => "FCGI_BEGIN_REQUEST",
            RecordType::AbortRequest => "FCGI_ABORT_REQUEST",
            RecordType::EndRequest => "FCGI_END_REQUEST",
            RecordType::Params => "FCGI_PARAMS",
            RecordType::StdIn => "FCGI_STDIN",
            RecordType::StdOut => "FCGI_STDOUT",
            RecordType::StdErr => "FCGI_STDERR",
            RecordType::Data => "FCGI_DATA",
            RecordType::GetValues => "FCGI_GET_VALUES",
            RecordType::GetValuesResult => "FCGI_GET_VALUES_RESULT",
            RecordType::Unknown => "FCGI_UNKNOWN_TYPE",
        }
    }
}

/// One framed unit of FastCGI traffic: 8-byte header, content, padding.
/// Serialized form is always exactly `8 + content_length + padding_length`
/// bytes; padding aligns the record to a multiple of 8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcgiRecord {
    pub version: Version,
    pub record_type: RecordType,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
    pub content: Vec<u8>,
    pub padding: Vec<u8>,
}

impl FcgiRecord {
    /// Encode-path constructor. Content above 65535 bytes must be split
    /// across records by the caller (`FcgiWriter::send_stream` does this).
    pub fn new(record_type: RecordType, request_id: u16, content: &[u8]) -> FcgiRecord {
        let content_length = content.len() as u16;
        let padding_length = ((8 - content_length % 8) % 8) as u8;
        FcgiRecord {
            version: Version::V1,
            record_type,
            request_id,
            content_length,
            padding_length,
            content: content.to_vec(),
            padding: vec![0; padding_length as usize],
        }
    }

    /// Decode-path constructor from exactly 8 header bytes; content and
    /// padding are attached afterwards once read from the stream.
    pub fn parse_header(header: &[u8]) -> Result<FcgiRecord> {
        if header.len() != FCGI_HEADER_LEN {
            return Err(Error::MalformedRecord(format!(
                "header must be exactly {} bytes, got {}",
                FCGI_HEADER_LEN,
                header.len()
            )));
        }
        let mut peeker = Cursor::new(header);
        let version = Version::from_u8(peeker.get_u8())?;
        let record_type = RecordType::from_u8(peeker.get_u8());
        let request_id = peeker.get_u16();
        let content_length = peeker.get_u16();
        let padding_length = peeker.get_u8();
        let _reserved = peeker.get_u8();
        Ok(FcgiRecord {
            version,
            record_type,
            request_id,
            content_length,
            padding_length,
            content: Vec::new(),
            padding: Vec::new(),
        })
    }

    /// Attach the payload read after the header. Performs no stream I/O;
    /// the buffers must match the header-declared lengths exactly.
    pub fn attach_payload(&mut self, content: &[u8], padding: &[u8]) -> Result<()> {
        if content.len() != self.content_length as usize {
            return Err(Error::MalformedRecord(format!(
                "expected {} content bytes, got {}",
                self.content_length,
                content.len()
            )));
        }
        if padding.len() != self.padding_length as usize {
            return Err(Error::MalformedRecord(format!(
                "expected {} padding bytes, got {}",
                self.padding_length,
                padding.len()
            )));
        }
        self.content = content.to_vec();
        self.padding = padding.to_vec();
        Ok(())
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u8(self.version as u8);
        buf.put_u8(self.record_type as u8);
        buf.put_u16(self.request_id);
        buf.put_u16(self.content_length);
        buf.put_u8(self.padding_length);
        buf.put_u8(0); // reserved
        buf.put_slice(&self.content);
        buf.put_bytes(0, self.padding_length as usize);
        buf.freeze()
    }

    pub fn wire_len(&self) -> usize {
        FCGI_HEADER_LEN + self.content_length as usize + self.padding_length as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Responder = 1,
    Authorizer = 2,
    Filter = 3,
}

impl Role {
    pub fn from_u16(value: u16) -> Result<Role> {
        match value {
            1 => Ok(Role::Responder),
            2 => Ok(Role::Authorizer),
            3 => Ok(Role::Filter),
            _ => Err(Error::MalformedRecord(format!("unknown role {}", value))),
        }
    }
}

/// Content of a BeginRequest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequestBody {
    pub role: Role,
    pub flags: u8,
}

impl BeginRequestBody {
    pub fn parse(content: &[u8]) -> Result<BeginRequestBody> {
        if content.len() < 8 {
            return Err(Error::MalformedRecord(format!(
                "begin request body must be 8 bytes, got {}",
                content.len()
            )));
        }
        let mut peeker = Cursor::new(content);
        let role = Role::from_u16(peeker.get_u16())?;
        let flags = peeker.get_u8();
        Ok(BeginRequestBody { role, flags })
    }
    pub fn keep_conn(&self) -> bool {
        self.flags & FCGI_KEEP_CONN != 0
    }
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u16(self.role as u16);
        buf.put_u8(self.flags);
        buf.put_bytes(0, 5); // reserved
        buf.freeze()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolStatus {
    RequestComplete = 0,
    CantMpxConn = 1,
    Overloaded = 2,
    UnknownRole = 3,
}

impl ProtocolStatus {
    pub fn from_u8(byte: u8) -> Result<ProtocolStatus> {
        match byte {
            0 => Ok(ProtocolStatus::RequestComplete),
            1 => Ok(ProtocolStatus::CantMpxConn),
            2 => Ok(ProtocolStatus::Overloaded),
            3 => Ok(ProtocolStatus::UnknownRole),
            _ => Err(Error::MalformedRecord(format!("unknown protocol status {}", byte))),
        }
    }
}

/// Content of an EndRequest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequestBody {
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

impl EndRequestBody {
    pub fn parse(content: &[u8]) -> Result<EndRequestBody> {
        if content.len() < 8 {
            return Err(Error::MalformedRecord(format!(
                "end request body must be 8 bytes, got {}",
                content.len()
            )));
        }
        let mut peeker = Cursor::new(content);
        let app_status = peeker.get_u32();
        let protocol_status = ProtocolStatus::from_u8(peeker.get_u8())?;
        Ok(EndRequestBody { app_status, protocol_status })
    }
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u32(self.app_status);
        buf.put_u8(self.protocol_status as u8);
        buf.put_bytes(0, 3); // reserved
        buf.freeze()
    }
}
