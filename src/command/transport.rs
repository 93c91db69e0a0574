//! Length-prefixed TCP framing
//!
//! Each frame is a big-endian u32 byte length followed by the bytes. A
//! request is one frame carrying the JSON envelope; a response is one
//! frame, or two (header + pixels) when a frame fetch succeeds. The
//! dispatcher never sees the framing.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::capture::backend::CaptureBackend;
use crate::command::protocol::{Response, PONG};
use crate::command::CommandDispatcher;

/// Upper bound on an inbound frame. Requests are small JSON envelopes;
/// anything near this is a corrupt or hostile length prefix, and the
/// prefix must never size an allocation on its own.
const MAX_REQUEST_LEN: usize = 4 * 1024 * 1024;

/// Read one length-prefixed frame. `None` on clean end-of-stream.
async fn read_frame<S>(stream: &mut S) -> std::io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_REQUEST_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("request frame of {len} bytes exceeds {MAX_REQUEST_LEN}"),
        ));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn write_frame<S>(stream: &mut S, payload: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(payload).await
}

async fn write_response<S>(stream: &mut S, response: &Response) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    match response {
        Response::Json(body) => write_frame(stream, body.as_bytes()).await?,
        Response::Empty => write_frame(stream, &[]).await?,
        Response::Pong => write_frame(stream, PONG.as_bytes()).await?,
        Response::FramePayload { header, pixels } => {
            write_frame(stream, header.as_bytes()).await?;
            write_frame(stream, pixels).await?;
        }
    }
    stream.flush().await
}

/// Serve the request/response loop until an `exit` command is processed.
///
/// Connections are handled one at a time - the protocol is strictly
/// synchronous, so there is nothing to gain from concurrent clients.
pub async fn serve<B: CaptureBackend>(
    listener: TcpListener,
    mut dispatcher: CommandDispatcher<B>,
) -> std::io::Result<()> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        info!(%peer, "client connected");

        loop {
            let raw = match read_frame(&mut stream).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(%peer, "client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(%peer, error = %e, "read failed, dropping connection");
                    break;
                }
            };

            // Invalid UTF-8 gets the same ping treatment as an
            // undecodable envelope
            let dispatched = match std::str::from_utf8(&raw) {
                Ok(text) => dispatcher.handle(text),
                Err(_) => {
                    warn!(%peer, "non-UTF-8 request");
                    dispatcher.handle("")
                }
            };

            if let Err(e) = write_response(&mut stream, &dispatched.response).await {
                warn!(%peer, error = %e, "write failed, dropping connection");
                break;
            }

            if dispatched.exit {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"{\"MessageId\":\"x\"}").await.unwrap();
        let frame = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(frame, b"{\"MessageId\":\"x\"}");
    }

    #[tokio::test]
    async fn clean_eof_reads_as_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_refused() {
        // a hostile prefix must be rejected before it sizes a buffer
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn frame_payload_writes_two_frames() {
        let (mut a, mut b) = tokio::io::duplex(256);
        let response = Response::FramePayload {
            header: "{\"Result\":true}".into(),
            pixels: bytes::Bytes::from_static(&[1, 2, 3, 4]),
        };
        write_response(&mut a, &response).await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"{\"Result\":true}");
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), [1, 2, 3, 4]);
    }
}
