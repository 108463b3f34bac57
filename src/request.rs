use bytes::{BufMut, BytesMut};
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    /// Case-insensitive. An empty method is malformed input; a method
    /// outside the supported set is rejected as unsupported so the
    /// response layer can answer with a client error.
    pub fn from_str(s: &str) -> Result<Method> {
        if s.is_empty() {
            return Err(Error::MalformedRequest("missing request method".to_owned()));
        }
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PATCH" => Ok(Method::Patch),
            _ => Err(Error::UnsupportedMethod(s.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the declared body length comes from. `Known` carries a
/// Content-Length / CONTENT_LENGTH value; `UntilEof` means the transport
/// signals the end of the body itself (empty StdIn record for FastCGI,
/// connection end-of-input for plain HTTP) via `Request::finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Known(u64),
    UntilEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Accumulating,
    Complete,
    Failed,
}

/// Capability shared by anything that assembles itself from transport
/// bytes. Keeps the seam open for other message kinds without a class
/// hierarchy.
pub trait Message {
    fn append_data(&mut self, data: &[u8]) -> bool;
    fn is_complete(&self) -> bool;
}

/// An in-progress or completed HTTP request. Method, URL, version and
/// env are fixed at construction; only the body and assembly state
/// change afterwards, and Complete/Failed are terminal.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    version: String,
    env: HashMap<String, String>,
    body: BytesMut,
    body_length: BodyLength,
    state: AssemblyState,
    error: Option<Error>,
}

impl Request {
    pub fn new(
        method: &str,
        target: &str,
        version: &str,
        env: HashMap<String, String>,
        body_length: BodyLength,
    ) -> Result<Request> {
        let method = Method::from_str(method)?;
        let url = parse_target(target, &env)?;
        let state = match body_length {
            // Nothing left to accumulate for a declared-empty body.
            BodyLength::Known(0) => AssemblyState::Complete,
            _ => AssemblyState::Accumulating,
        };
        Ok(Request {
            method,
            url,
            version: normalize_version(version),
            env,
            body: BytesMut::new(),
            body_length,
            state,
            error: None,
        })
    }

    /// Build a request from CGI meta-variables, the form the Params
    /// stream delivers them in.
    pub fn from_fcgi_params(env: HashMap<String, String>) -> Result<Request> {
        let method = env.get("REQUEST_METHOD").cloned().unwrap_or_default();
        let target = env
            .get("REQUEST_URI")
            .or_else(|| env.get("SCRIPT_NAME"))
            .cloned()
            .unwrap_or_default();
        let version = env.get("SERVER_PROTOCOL").cloned().unwrap_or_else(|| "1.1".to_owned());
        let body_length = match env.get("CONTENT_LENGTH").and_then(|v| v.parse::<u64>().ok()) {
            Some(n) => BodyLength::Known(n),
            None => BodyLength::UntilEof,
        };
        Request::new(&method, &target, &version, env, body_length)
    }

    /// Append transport bytes to the body. Returns whether the bytes were
    /// accepted; a finished assembler always answers `false`.
    pub fn append_data(&mut self, data: &[u8]) -> bool {
        if self.state != AssemblyState::Accumulating {
            return false;
        }
        if let BodyLength::Known(declared) = self.body_length {
            let total = self.body.len() as u64 + data.len() as u64;
            if total > declared {
                self.fail(Error::MalformedRequest(format!(
                    "body exceeds declared length of {} bytes",
                    declared
                )));
                return false;
            }
            self.body.put_slice(data);
            if total == declared {
                self.state = AssemblyState::Complete;
            }
            return true;
        }
        self.body.put_slice(data);
        true
    }

    /// Transport end-of-input signal. Completes an `UntilEof` body; under
    /// a declared length it fails the request if the body came up short.
    pub fn finish(&mut self) -> bool {
        if self.state != AssemblyState::Accumulating {
            return false;
        }
        if let BodyLength::Known(declared) = self.body_length {
            let received = self.body.len() as u64;
            if received < declared {
                self.fail(Error::MalformedRequest(format!(
                    "body ended {} bytes short of declared length",
                    declared - received
                )));
                return false;
            }
        }
        self.state = AssemblyState::Complete;
        true
    }

    /// Connection abort. Freezes an accumulating request as Failed.
    pub fn abort(&mut self) {
        if self.state == AssemblyState::Accumulating {
            self.fail(Error::MalformedRequest("request aborted by transport".to_owned()));
        }
    }

    fn fail(&mut self, err: Error) {
        self.state = AssemblyState::Failed;
        self.error = Some(err);
    }

    pub fn method(&self) -> Method {
        self.method
    }
    pub fn url(&self) -> &Url {
        &self.url
    }
    pub fn version(&self) -> &str {
        &self.version
    }
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }
    pub fn body(&self) -> &[u8] {
        &self.body
    }
    pub fn state(&self) -> AssemblyState {
        self.state
    }
    pub fn is_complete(&self) -> bool {
        self.state == AssemblyState::Complete
    }
    pub fn is_failed(&self) -> bool {
        self.state == AssemblyState::Failed
    }
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }
}

impl Message for Request {
    fn append_data(&mut self, data: &[u8]) -> bool {
        Request::append_data(self, data)
    }
    fn is_complete(&self) -> bool {
        Request::is_complete(self)
    }
}

fn normalize_version(version: &str) -> String {
    version.strip_prefix("HTTP/").unwrap_or(version).to_owned()
}

// Origin-form targets get a base derived from the request's own host
// variables; absolute-form targets parse directly.
fn parse_target(target: &str, env: &HashMap<String, String>) -> Result<Url> {
    if target.is_empty() {
        return Err(Error::MalformedRequest("missing request target".to_owned()));
    }
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let host = env
                .get("HTTP_HOST")
                .or_else(|| env.get("SERVER_NAME"))
                .map(String::as_str)
                .unwrap_or("localhost");
            let base = Url::parse(&format!("http://{}/", host))
                .map_err(|err| Error::MalformedRequest(format!("bad host for request target: {}", err)))?;
            base.join(target)
                .map_err(|err| Error::MalformedRequest(format!("unparsable request target: {}", err)))
        }
        Err(err) => Err(Error::MalformedRequest(format!("unparsable request target: {}", err))),
    }
}
