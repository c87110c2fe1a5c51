//! beanstalkd client over a single TCP connection.
//!
//! Implements the subset of the text protocol the workers and the CLI use:
//! `use`, `put`, `watch`, `ignore`, `reserve`, `delete`, `bury`.
//! Commands and replies are `\r\n`-terminated lines; job bodies follow
//! `RESERVED` replies and `put` commands as `<bytes>\r\n`.

use super::{Job, QueueClient, QueueError};
use async_trait::async_trait;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_TUBE_NAME: usize = 200;

/// Upper bound of beanstalkd's `max-job-size`.
pub const MAX_JOB_SIZE: usize = 1 << 30;

pub struct BeanstalkClient {
    stream: BufStream<TcpStream>,
    addr: String,
}

impl BeanstalkClient {
    /// Open a connection to a beanstalkd server.
    pub async fn connect(addr: &str) -> Result<Self, QueueError> {
        let stream = TcpStream::connect(addr).await?;
        debug!(addr, "connected to beanstalkd");
        Ok(Self {
            stream: BufStream::new(stream),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Select the tube subsequent `put` commands go to.
    pub async fn use_tube(&mut self, tube: &str) -> Result<(), QueueError> {
        validate_tube(tube)?;
        let command = format!("use {tube}");
        let reply = self.call(&command, None).await?;
        match reply.strip_prefix("USING ") {
            Some(name) if name == tube => Ok(()),
            _ => Err(unexpected(&command, &reply)),
        }
    }

    /// Enqueue a job on the current tube. Returns the new job id.
    pub async fn put(
        &mut self,
        body: &[u8],
        priority: u32,
        delay_secs: u32,
        ttr_secs: u32,
    ) -> Result<u64, QueueError> {
        let command = format!("put {priority} {delay_secs} {ttr_secs} {}", body.len());
        let reply = self.call(&command, Some(body)).await?;
        let mut parts = reply.split(' ');
        match parts.next() {
            Some("INSERTED") => parse_field(&command, &reply, parts.next()),
            Some("BURIED") => Err(QueueError::Server(format!(
                "job buried on insert (server out of memory): {reply}"
            ))),
            _ => Err(unexpected(&command, &reply)),
        }
    }

    async fn call(&mut self, command: &str, body: Option<&[u8]>) -> Result<String, QueueError> {
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        if let Some(body) = body {
            self.stream.write_all(body).await?;
            self.stream.write_all(b"\r\n").await?;
        }
        self.stream.flush().await?;

        let reply = self.read_line().await?;
        debug!(command, reply = %reply, "beanstalkd reply");
        if reply == "JOB_TOO_BIG" {
            return Err(QueueError::JobTooBig);
        }
        if matches!(
            reply.as_str(),
            "OUT_OF_MEMORY" | "INTERNAL_ERROR" | "BAD_FORMAT" | "UNKNOWN_COMMAND" | "EXPECTED_CRLF"
                | "DRAINING"
        ) {
            return Err(QueueError::Server(reply));
        }
        Ok(reply)
    }

    async fn read_line(&mut self) -> Result<String, QueueError> {
        let mut line = Vec::new();
        let n = self.stream.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(QueueError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&line)
            .trim_end_matches(['\r', '\n'])
            .to_string())
    }

    /// Read a `<len>` byte body and its trailing CRLF. Lengths above
    /// [`MAX_JOB_SIZE`] are rejected before anything is allocated.
    async fn read_body(
        &mut self,
        command: &str,
        reply: &str,
        len: usize,
    ) -> Result<Vec<u8>, QueueError> {
        let framed = len
            .checked_add(2)
            .filter(|_| len <= MAX_JOB_SIZE)
            .ok_or_else(|| unexpected(command, reply))?;
        let mut buf = vec![0u8; framed];
        self.stream.read_exact(&mut buf).await?;
        if !buf.ends_with(b"\r\n") {
            return Err(unexpected(command, "job body not terminated by CRLF"));
        }
        buf.truncate(len);
        Ok(buf)
    }

    async fn watch_list_call(&mut self, command: &str) -> Result<usize, QueueError> {
        let reply = self.call(command, None).await?;
        if reply == "NOT_IGNORED" {
            return Err(QueueError::NotIgnored);
        }
        let mut parts = reply.split(' ');
        match parts.next() {
            Some("WATCHING") => parse_field(command, &reply, parts.next()),
            _ => Err(unexpected(command, &reply)),
        }
    }
}

#[async_trait]
impl QueueClient for BeanstalkClient {
    async fn watch(&mut self, tube: &str) -> Result<usize, QueueError> {
        validate_tube(tube)?;
        self.watch_list_call(&format!("watch {tube}")).await
    }

    async fn ignore(&mut self, tube: &str) -> Result<usize, QueueError> {
        validate_tube(tube)?;
        self.watch_list_call(&format!("ignore {tube}")).await
    }

    async fn reserve(&mut self) -> Result<Job, QueueError> {
        let command = "reserve";
        let reply = self.call(command, None).await?;
        if reply == "DEADLINE_SOON" {
            return Err(QueueError::DeadlineSoon);
        }
        let mut parts = reply.split(' ');
        match parts.next() {
            Some("RESERVED") => {
                let id: u64 = parse_field(command, &reply, parts.next())?;
                let len: usize = parse_field(command, &reply, parts.next())?;
                let body = self.read_body(command, &reply, len).await?;
                Ok(Job { id, body })
            }
            _ => Err(unexpected(command, &reply)),
        }
    }

    async fn delete(&mut self, job: &Job) -> Result<(), QueueError> {
        let command = format!("delete {}", job.id);
        match self.call(&command, None).await?.as_str() {
            "DELETED" => Ok(()),
            "NOT_FOUND" => Err(QueueError::NotFound(job.id)),
            other => Err(unexpected(&command, other)),
        }
    }

    async fn bury(&mut self, job: &Job, priority: u32) -> Result<(), QueueError> {
        let command = format!("bury {} {priority}", job.id);
        match self.call(&command, None).await?.as_str() {
            "BURIED" => Ok(()),
            "NOT_FOUND" => Err(QueueError::NotFound(job.id)),
            other => Err(unexpected(&command, other)),
        }
    }
}

fn validate_tube(tube: &str) -> Result<(), QueueError> {
    let valid_char =
        |c: char| c.is_ascii_alphanumeric() || "-+/;.$_()".contains(c);
    if tube.is_empty()
        || tube.len() > MAX_TUBE_NAME
        || tube.starts_with('-')
        || !tube.chars().all(valid_char)
    {
        return Err(QueueError::InvalidTube(tube.to_string()));
    }
    Ok(())
}

fn parse_field<T: FromStr>(command: &str, reply: &str, field: Option<&str>) -> Result<T, QueueError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| unexpected(command, reply))
}

fn unexpected(command: &str, reply: &str) -> QueueError {
    QueueError::Protocol {
        command: command.to_string(),
        reply: reply.to_string(),
    }
}
