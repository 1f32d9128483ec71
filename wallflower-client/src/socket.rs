//! Thin wrapper over the client side of a tokio-tungstenite WebSocket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

/// Close code reported when the peer closed without a close frame.
pub(crate) const CLOSE_ABNORMAL: u16 = 1006;

/// Close code reported when a close frame carried no code.
const CLOSE_NO_STATUS: u16 = 1005;

/// Inbound socket events the connection layer cares about.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    Text(String),
    Closed { code: u16, reason: String },
}

pub(crate) struct Socket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Socket {
    /// Opens a WebSocket to `url`, carrying the session cookie (and the
    /// offered subprotocols, when any) on the upgrade request.
    pub async fn connect(
        url: &str,
        cookie: &str,
        protocols: &[String],
    ) -> Result<Self, ClientError> {
        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            COOKIE,
            HeaderValue::from_str(cookie)
                .map_err(|_| ClientError::InvalidCookie(cookie.to_owned()))?,
        );
        if !protocols.is_empty() {
            let offered = protocols.join(", ");
            request.headers_mut().insert(
                SEC_WEBSOCKET_PROTOCOL,
                HeaderValue::from_str(&offered)
                    .map_err(|_| ClientError::InvalidCookie(offered.clone()))?,
            );
        }
        let (inner, _response) = connect_async(request).await?;
        Ok(Self { inner })
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), ClientError> {
        self.inner.send(Message::text(text)).await?;
        Ok(())
    }

    /// Next inbound event, or `None` once the stream has finished.
    ///
    /// Binary frames holding UTF-8 are surfaced as text (the host frames
    /// everything as JSON text, but some intermediaries re-frame); ping
    /// and pong are answered by the library and skipped here.
    pub async fn next(&mut self) -> Option<Result<SocketEvent, ClientError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(SocketEvent::Text(text.to_string()))),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(SocketEvent::Text(text))),
                    Err(_) => tracing::debug!("ignoring non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (frame.code.into(), frame.reason.to_string()),
                        None => (CLOSE_NO_STATUS, String::new()),
                    };
                    return Some(Ok(SocketEvent::Closed { code, reason }));
                }
                Ok(_) => {}
                Err(error) => return Some(Err(ClientError::WebSocket(error))),
            }
        }
    }

    /// Starts the close handshake. The stream still has to be polled to
    /// completion afterwards.
    pub async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if let Err(error) = self.inner.close(Some(frame)).await {
            tracing::debug!(error = %error, "close frame not delivered");
        }
    }
}
