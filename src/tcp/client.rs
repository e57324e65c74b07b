use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::ack::Ack;
use crate::builder::FrameBuilder;
use crate::config::ClientConfig;
use crate::message::{Login, Message};
use crate::types::{Frame, Gt06Error, MessageKind, SerialNumber};
use crate::Gt06FrameCodec as Codec;

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal-side connection to a collection server.
///
/// Generic over the stream so tests can drive it with in-memory I/O.
pub struct Gt06TcpClient<S = TcpStream> {
    framed: Framed<S, Codec>,
    builder: FrameBuilder,
    next_serial: SerialNumber,
    response_timeout: Duration,
}

impl Gt06TcpClient<TcpStream> {
    /// Connect to the specified address
    pub async fn connect(addr: &str) -> Result<Self, Gt06Error> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to collection server {}", addr);
        Ok(Self::from_stream(stream))
    }

    /// Connect using the address, serial and timeouts of `config`
    pub async fn connect_with_config(config: &ClientConfig) -> Result<Self, Gt06Error> {
        config.validate()?;
        let stream = timeout(
            config.connect_timeout(),
            TcpStream::connect(&config.server_addr),
        )
        .await
        .map_err(|_| Gt06Error::Timeout)??;
        info!("Connected to collection server {}", config.server_addr);

        Ok(Self::from_stream(stream)
            .with_first_serial(config.first_serial)
            .with_response_timeout(config.response_timeout()))
    }

    pub fn peer_addr(&self) -> Result<std::net::SocketAddr, Gt06Error> {
        self.framed.get_ref().peer_addr().map_err(Gt06Error::Io)
    }
}

impl<S> Gt06TcpClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_stream(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, Codec::default()),
            builder: FrameBuilder::new(),
            next_serial: 1,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_builder(mut self, builder: FrameBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_first_serial(mut self, serial: SerialNumber) -> Self {
        self.next_serial = serial;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Serial the next call to [`send`](Self::send) will use
    pub fn next_serial(&self) -> SerialNumber {
        self.next_serial
    }

    /// Send a message under the next serial number and return that serial
    pub async fn send(&mut self, message: &Message) -> Result<SerialNumber, Gt06Error> {
        let serial = self.next_serial;
        self.next_serial = serial.wrapping_add(1);
        self.send_with_serial(message, serial).await?;
        Ok(serial)
    }

    pub async fn send_with_serial(
        &mut self,
        message: &Message,
        serial: SerialNumber,
    ) -> Result<(), Gt06Error> {
        let bytes = self.builder.build(message, serial)?;
        self.framed.send(bytes).await?;
        debug!("Sent {:?} frame, serial {}", message.kind(), serial);
        Ok(())
    }

    pub async fn send_frame(&mut self, frame: Frame) -> Result<(), Gt06Error> {
        let kind = frame.kind;
        self.framed.send(frame).await?;
        debug!("Sent {:?} frame", kind);
        Ok(())
    }

    /// Receive the next frame, `None` once the server closed the connection
    pub async fn recv(&mut self) -> Result<Option<Frame>, Gt06Error> {
        self.framed.next().await.transpose()
    }

    /// Wait for a single response within the response timeout
    pub async fn recv_ack(&mut self) -> Result<Ack, Gt06Error> {
        match timeout(self.response_timeout, self.framed.next()).await {
            Err(_) => Err(Gt06Error::Timeout),
            Ok(None) => Err(Gt06Error::ConnectionClosed),
            Ok(Some(frame)) => Ok(Ack::from_frame(&frame?)),
        }
    }

    /// Send the login frame and require the server to acknowledge it
    pub async fn login(&mut self, login: &Login) -> Result<Ack, Gt06Error> {
        let serial = self.send(&Message::Login(*login)).await?;
        let ack = self.recv_ack().await?;
        if !ack.acknowledges(MessageKind::Login) {
            warn!("Login serial {} answered with {:?}", serial, ack.kind);
            return Err(Gt06Error::LoginRejected { got: ack.kind });
        }
        info!("Login acknowledged for device {}", login.identity);
        Ok(ack)
    }

    /// Flush and close the connection
    pub async fn close(mut self) -> Result<(), Gt06Error> {
        SinkExt::<Frame>::close(&mut self.framed).await?;
        info!("Connection closed");
        Ok(())
    }
}
