//! Wire protocol constants and the minimal frame codec shared by both
//! Hub endpoints.
//!
//! Both the frontend and the backend speak the same tiny framing: the
//! first read after accept is the service-name frame (one buffer read, no
//! reassembly); everything the control channel carries afterwards is a
//! single sentinel byte or an ancillary descriptor message, never
//! arbitrary-length data. Keeping every on-the-wire byte value in one
//! module means a future edit cannot silently drift the wire contract
//! between the two listeners.

use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt};
use std::io;

/// Default size of the one-shot buffer used to read a service-name frame.
pub const FRAME_BUF_SIZE: usize = 4096;

/// Registration acknowledged (backend -> server).
pub const ACK_REGISTERED: u8 = b'+';

/// Liveness probe sent by the Hub down a control channel (backend -> server).
pub const PROBE_BYTE: u8 = b'!';

/// Payload byte accompanying each fd transfer (frontend path -> server).
pub const FD_PAYLOAD_BYTE: u8 = b'1';

/// Frontend error: the requested name has no live registration.
pub const ERR_SERVICE_NOT_FOUND: &[u8] = b"-Service not found\r\n";

/// Backend error: the requested name already has a live control connection.
pub const ERR_SERVICE_ALREADY_EXISTS: &[u8] = b"-Service already exists\r\n";

/// Read one frame from `stream`: a single buffer read, trailing newline not
/// required, no reassembly across reads. An empty read (`Ok(0)`) means EOF
/// and is surfaced as `Ok(None)`; the frame itself is returned verbatim,
/// including any trailing bytes the caller wrote past the logical name.
pub async fn read_frame<S>(stream: &mut S) -> io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let buf = vec![0u8; FRAME_BUF_SIZE];
    let BufResult(res, mut buf) = stream.read(buf).await;
    let n = res?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_the_wire_contract() {
        assert_eq!(ACK_REGISTERED, 0x2B);
        assert_eq!(PROBE_BYTE, 0x21);
        assert_eq!(FD_PAYLOAD_BYTE, 0x31);
        assert_eq!(ERR_SERVICE_NOT_FOUND, b"-Service not found\r\n");
        assert_eq!(ERR_SERVICE_ALREADY_EXISTS, b"-Service already exists\r\n");
    }

    async fn pair() -> (compio::net::UnixStream, compio::net::UnixStream) {
        let path =
            std::env::temp_dir().join(format!("rhub-wire-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = compio::net::UnixListener::bind(&path).await.unwrap();

        let accept_handle = compio::runtime::spawn(async move {
            let (stream, _addr) = listener.accept().await.unwrap();
            stream
        });
        compio::time::sleep(std::time::Duration::from_millis(10)).await;

        let client = compio::net::UnixStream::connect(&path).await.unwrap();
        let server = accept_handle.await.unwrap();
        let _ = std::fs::remove_file(&path);
        (client, server)
    }

    #[compio::test]
    async fn read_frame_returns_short_read_as_whole_frame() {
        use compio::io::AsyncWriteExt;

        let (mut client, mut server) = pair().await;
        client.write_all(b"server0".to_vec()).await.0.unwrap();
        let frame = read_frame(&mut server).await.unwrap();
        assert_eq!(frame, Some(b"server0".to_vec()));
    }

    #[compio::test]
    async fn read_frame_empty_is_eof() {
        let (client, mut server) = pair().await;
        drop(client);
        let frame = read_frame(&mut server).await.unwrap();
        assert_eq!(frame, None);
    }
}
