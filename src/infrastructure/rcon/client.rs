use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Packet type sent to log in
pub const SERVERDATA_AUTH: i32 = 3;
/// Packet type the server answers a login with
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Packet type carrying a console command
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Packet type carrying command output
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Largest accepted value of the length field
pub const MAX_PACKET_SIZE: usize = 4096;
/// Smallest valid value of the length field (id, type, two NULs)
pub const MIN_PACKET_SIZE: usize = 10;

/// Remote console related errors
#[derive(Debug, Error)]
pub enum RconError {
    #[error("connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("authentication rejected")]
    AuthRejected,

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet of {size} bytes exceeds the 4096 byte limit")]
    PacketTooLarge { size: usize },

    #[error("malformed packet with length {size}")]
    MalformedPacket { size: i32 },

    #[error("unexpected packet type {kind} (id {id})")]
    UnexpectedPacket { kind: i32, id: i32 },
}

/// One length-prefixed console packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Value of the length field: everything after it
    pub fn size(&self) -> usize {
        MIN_PACKET_SIZE + self.body.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>, RconError> {
        let size = self.size();
        if size > MAX_PACKET_SIZE {
            return Err(RconError::PacketTooLarge { size });
        }

        let mut buf = Vec::with_capacity(size + 4);
        buf.extend_from_slice(&(size as i32).to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.encode()?;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let raw_size = reader.read_i32_le().await?;
        let size = usize::try_from(raw_size)
            .ok()
            .filter(|size| (MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(size))
            .ok_or(RconError::MalformedPacket { size: raw_size })?;

        let mut buf = vec![0u8; size];
        reader.read_exact(&mut buf).await?;

        let id = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        // Body runs up to the first NUL of the terminator
        let body = &buf[8..size - 2];
        let body = match body.iter().position(|&b| b == 0) {
            Some(end) => &body[..end],
            None => body,
        };

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

/// Authenticated remote console session
#[derive(Debug)]
pub struct RconClient<S = TcpStream> {
    stream: S,
    next_id: i32,
}

impl RconClient<TcpStream> {
    /// Dial `address` and log in with `password`
    pub async fn connect(address: &str, password: &str) -> Result<Self, RconError> {
        debug!(address, "connecting to remote console");
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| RconError::Connect {
                address: address.to_string(),
                source,
            })?;
        Self::authenticate(stream, password).await
    }
}

impl<S> RconClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Log in over an already connected stream
    pub async fn authenticate(stream: S, password: &str) -> Result<Self, RconError> {
        let mut client = Self { stream, next_id: 1 };
        let id = client.next_request_id();
        Packet::new(id, SERVERDATA_AUTH, password)
            .write_to(&mut client.stream)
            .await?;

        loop {
            let packet = Packet::read_from(&mut client.stream).await?;
            match packet.kind {
                // Some servers send an empty value packet ahead of the auth response
                SERVERDATA_RESPONSE_VALUE => continue,
                SERVERDATA_AUTH_RESPONSE if packet.id == -1 => return Err(RconError::AuthRejected),
                SERVERDATA_AUTH_RESPONSE if packet.id == id => return Ok(client),
                kind => return Err(RconError::UnexpectedPacket { kind, id: packet.id }),
            }
        }
    }

    /// Run a console command and return its output
    pub async fn execute(&mut self, command: &str) -> Result<String, RconError> {
        let id = self.next_request_id();
        trace!(id, command, "rcon exec");
        Packet::new(id, SERVERDATA_EXECCOMMAND, command)
            .write_to(&mut self.stream)
            .await?;

        loop {
            let packet = Packet::read_from(&mut self.stream).await?;
            match packet.kind {
                SERVERDATA_RESPONSE_VALUE if packet.id == id => return Ok(packet.body),
                // Stale reply to an earlier request
                SERVERDATA_RESPONSE_VALUE => continue,
                kind => return Err(RconError::UnexpectedPacket { kind, id: packet.id }),
            }
        }
    }

    /// Shut down the write half of the connection
    pub async fn close(mut self) -> Result<(), RconError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn next_request_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if self.next_id == i32::MAX { 1 } else { self.next_id + 1 };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    async fn reply(server: &mut DuplexStream, id: i32, kind: i32, body: &str) {
        Packet::new(id, kind, body).write_to(server).await.unwrap();
    }

    #[test]
    fn test_encode_layout() {
        let bytes = Packet::new(7, SERVERDATA_EXECCOMMAND, "list").encode().unwrap();

        assert_eq!(&bytes[0..4], &14i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
        assert_eq!(&bytes[12..16], b"list");
        assert_eq!(&bytes[16..], &[0, 0]);
    }

    #[test]
    fn test_encode_rejects_oversized_body() {
        let body = "x".repeat(MAX_PACKET_SIZE);
        let result = Packet::new(1, SERVERDATA_EXECCOMMAND, body).encode();
        assert!(matches!(result, Err(RconError::PacketTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_read_rejects_short_length() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&4i32.to_le_bytes()).await.unwrap();
        server.write_all(&[0; 4]).await.unwrap();

        let result = Packet::read_from(&mut client).await;
        assert!(matches!(result, Err(RconError::MalformedPacket { size: 4 })));
    }

    #[tokio::test]
    async fn test_read_reports_negative_length() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&(-7i32).to_le_bytes()).await.unwrap();

        let error = Packet::read_from(&mut client).await.unwrap_err();
        assert!(matches!(error, RconError::MalformedPacket { size: -7 }));
        assert_eq!(error.to_string(), "malformed packet with length -7");
    }

    #[tokio::test]
    async fn test_authenticate_skips_empty_value_packet() {
        let (client, mut server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            let auth = Packet::read_from(&mut server).await.unwrap();
            assert_eq!(auth.kind, SERVERDATA_AUTH);
            assert_eq!(auth.body, "secret");
            reply(&mut server, auth.id, SERVERDATA_RESPONSE_VALUE, "").await;
            reply(&mut server, auth.id, SERVERDATA_AUTH_RESPONSE, "").await;

            let exec = Packet::read_from(&mut server).await.unwrap();
            assert_eq!(exec.body, "say hi");
            reply(&mut server, exec.id, SERVERDATA_RESPONSE_VALUE, "ok").await;
        });

        let mut rcon = RconClient::authenticate(client, "secret").await.unwrap();
        assert_eq!(rcon.execute("say hi").await.unwrap(), "ok");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let (client, mut server) = duplex(1024);

        tokio::spawn(async move {
            Packet::read_from(&mut server).await.unwrap();
            reply(&mut server, -1, SERVERDATA_AUTH_RESPONSE, "").await;
        });

        let result = RconClient::authenticate(client, "wrong").await;
        assert!(matches!(result, Err(RconError::AuthRejected)));
    }

    #[tokio::test]
    async fn test_execute_on_closed_connection_fails() {
        let (client, mut server) = duplex(1024);

        let server_task = tokio::spawn(async move {
            let auth = Packet::read_from(&mut server).await.unwrap();
            reply(&mut server, auth.id, SERVERDATA_AUTH_RESPONSE, "").await;
            drop(server);
        });

        let mut rcon = RconClient::authenticate(client, "secret").await.unwrap();
        server_task.await.unwrap();

        let result = rcon.execute("restart").await;
        assert!(matches!(result, Err(RconError::Io(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = RconClient::connect(&address, "secret").await;
        assert!(matches!(result, Err(RconError::Connect { .. })));
    }
}
