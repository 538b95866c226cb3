//! Blocking client
//!
//! One TCP connection, one request in flight. Used by the CLI and by the peer
//! transport.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use crate::cluster::ClusterStatus;
use crate::config::DEFAULT_OPERATION_TIMEOUT_MS;
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::kv::{BatchItem, PutOutcome, ScanPage, ScanRequest};
use crate::protocol::{read_response, write_request, Command, Request, Response};

/// Client connection to a node
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    addr: String,
}

impl Client {
    /// Connect with the default per-operation timeout
    pub fn connect(addr: &str) -> Result<Self> {
        Self::connect_timeout(addr, Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS))
    }

    /// Connect, bounding the connect itself and every later read/write by `timeout`
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        let socket_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| KvError::Network(format!("{} did not resolve to an address", addr)))?;

        let stream = TcpStream::connect_timeout(&socket_addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response
    pub fn send(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)
    }

    fn call(&mut self, command: Command) -> Result<Response> {
        self.send(&Request::new(command))
    }

    // =========================================================================
    // Typed operations
    // =========================================================================

    pub fn get(&mut self, key: &str) -> Result<Entry> {
        self.call(Command::Get {
            key: key.to_string(),
        })?
        .into_body()
    }

    pub fn put(&mut self, key: &str, value: impl Into<Bytes>) -> Result<PutOutcome> {
        self.call(Command::Put {
            key: key.to_string(),
            value: value.into(),
        })?
        .into_body()
    }

    /// `true` if the key existed on the node that served the request
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        self.call(Command::Delete {
            key: key.to_string(),
        })?
        .into_body()
    }

    pub fn ping(&mut self) -> Result<()> {
        self.call(Command::Ping)?.into_unit()
    }

    pub fn scan(&mut self, request: ScanRequest) -> Result<ScanPage> {
        self.call(Command::Scan(request))?.into_body()
    }

    pub fn batch_put(&mut self, items: Vec<(String, Bytes)>) -> Result<Vec<BatchItem>> {
        self.call(Command::BatchPut { items })?.into_body()
    }

    pub fn cluster_status(&mut self, probe: bool) -> Result<ClusterStatus> {
        self.call(Command::ClusterStatus { probe })?.into_body()
    }
}
