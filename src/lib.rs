//! Transport-facing layer of an HTTP application server: FastCGI record
//! framing plus incremental assembly of requests arriving over FastCGI
//! or plain HTTP. Listening, routing and response writing live elsewhere.

pub mod error;
pub mod fcgi_params;
pub mod fcgi_reader;
pub mod fcgi_record;
pub mod fcgi_writer;
pub mod request;

pub use error::{Error, Result};
pub use fcgi_params::{encode_pair, FcgiParamsParser};
pub use fcgi_reader::FcgiReader;
pub use fcgi_record::{
    BeginRequestBody, EndRequestBody, FcgiRecord, ProtocolStatus, RecordType, Role, Version,
};
pub use fcgi_writer::FcgiWriter;
pub use request::{AssemblyState, BodyLength, Message, Method, Request};
