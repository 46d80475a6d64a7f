//! Minimal client for stores speaking the Redis serialization protocol
use async_trait::async_trait;
use log::trace;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{KeyValueStore, StoreConnector, StoreTarget};
use crate::error::{AgentError, Result};

/// Largest bulk reply accepted, matching the server's own `proto-max-bulk-len` default
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// A decoded server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(AgentError::Connection("connection closed by peer".to_string()));
    }
    match line.strip_suffix("\r\n") {
        Some(body) => Ok(body.to_string()),
        None => Err(AgentError::Protocol(format!("unterminated reply line {:?}", line))),
    }
}

/// Read one reply from the stream
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply> {
    let line = read_line(reader).await?;
    let Some(marker) = line.chars().next() else {
        return Err(AgentError::Protocol("empty reply line".to_string()));
    };
    let body = &line[marker.len_utf8()..];

    match marker {
        '+' => Ok(Reply::Simple(body.to_string())),
        '-' => Ok(Reply::Error(body.to_string())),
        ':' => body
            .parse()
            .map(Reply::Integer)
            .map_err(|_| AgentError::Protocol(format!("bad integer reply {:?}", body))),
        '$' => {
            let len: i64 = body
                .parse()
                .map_err(|_| AgentError::Protocol(format!("bad bulk length {:?}", body)))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(AgentError::Protocol(format!(
                    "bulk reply of {} bytes exceeds the {} byte limit",
                    len, MAX_BULK_LEN
                )));
            }

            let expected = len as usize + 2;
            let mut data = Vec::with_capacity(expected.min(READ_CHUNK));
            (&mut *reader).take(expected as u64).read_to_end(&mut data).await?;
            if data.len() != expected {
                return Err(AgentError::Connection(
                    "connection closed inside a bulk reply".to_string(),
                ));
            }
            if !data.ends_with(b"\r\n") {
                return Err(AgentError::Protocol("unterminated bulk reply".to_string()));
            }
            data.truncate(len as usize);
            Ok(Reply::Bulk(Some(data)))
        }
        other => Err(AgentError::Protocol(format!("unsupported reply type {:?}", other))),
    }
}

/// A single connection with per-command timeouts.
///
/// Once a command fails before its reply was fully read, the stream position is
/// unknown and every later call is refused.
pub struct RespClient {
    stream: BufStream<TcpStream>,
    timeout: Duration,
    peer: String,
    broken: bool,
}

impl RespClient {
    /// Connect to `target` and select its database
    pub async fn connect(target: &StoreTarget) -> Result<Self> {
        let stream = timeout(target.timeout, TcpStream::connect((target.host.as_str(), target.port)))
            .await
            .map_err(|_| {
                AgentError::Timeout(format!(
                    "connecting to {} took longer than {:?}",
                    target, target.timeout
                ))
            })?
            .map_err(|e| AgentError::Connection(format!("failed to connect to {}: {}", target, e)))?;

        let mut client = Self {
            stream: BufStream::new(stream),
            timeout: target.timeout,
            peer: target.to_string(),
            broken: false,
        };

        if target.db != 0 {
            match client.call(&["SELECT", &target.db.to_string()]).await? {
                Reply::Simple(_) => {}
                other => {
                    return Err(AgentError::Protocol(format!(
                        "unexpected reply to SELECT: {:?}",
                        other
                    )));
                }
            }
        }

        Ok(client)
    }

    /// Send a command and wait for its reply; error replies become `Err`
    pub async fn call(&mut self, args: &[&str]) -> Result<Reply> {
        if self.broken {
            return Err(AgentError::Connection(format!(
                "connection to {} is out of sync after an earlier failure",
                self.peer
            )));
        }

        let limit = self.timeout;
        let request = encode_command(args);
        trace!("{} <- {:?}", self.peer, args);

        let stream = &mut self.stream;
        let outcome = timeout(limit, async move {
            stream.write_all(&request).await?;
            stream.flush().await?;
            read_reply(stream).await
        })
        .await
        .map_err(|_| {
            AgentError::Timeout(format!(
                "{} did not answer {} within {:?}",
                self.peer,
                args.first().copied().unwrap_or_default(),
                limit
            ))
        })
        .and_then(|read| read);

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                self.broken = true;
                return Err(e);
            }
        };

        match reply {
            Reply::Error(message) => Err(AgentError::Protocol(message)),
            reply => Ok(reply),
        }
    }
}

#[async_trait]
impl KeyValueStore for RespClient {
    async fn ping(&mut self) -> Result<()> {
        match self.call(&["PING"]).await? {
            Reply::Simple(pong) if pong == "PONG" => Ok(()),
            other => Err(AgentError::Protocol(format!("unexpected reply to PING: {:?}", other))),
        }
    }

    async fn llen(&mut self, key: &str) -> Result<i64> {
        match self.call(&["LLEN", key]).await? {
            Reply::Integer(length) => Ok(length),
            other => Err(AgentError::Protocol(format!("unexpected reply to LLEN: {:?}", other))),
        }
    }
    fn is_usable(&self) -> bool {
        !self.broken
    }
}

/// Connector opening [`RespClient`] connections
pub struct RespConnector;

#[async_trait]
impl StoreConnector for RespConnector {
    async fn connect(&self, target: &StoreTarget) -> Result<Box<dyn KeyValueStore>> {
        Ok(Box::new(RespClient::connect(target).await?))
    }

    fn name(&self) -> &str {
        "resp"
    }
}
