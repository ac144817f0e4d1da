//! Minimal RFB 3.8 client, sufficient to type keystrokes at a guest console.

use super::auth;
use crate::error::{ForgeError, ForgeResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const PROTO_VERSION: &[u8; 12] = b"RFB 003.008\n";

const SECURITY_NONE: u8 = 1;
const SECURITY_VNC_AUTH: u8 = 2;

/// Cap on server-supplied string lengths, to bound reads from a
/// misbehaving peer.
const MAX_SERVER_STRING: u32 = 4096;

/// An authenticated RFB session in client-to-server event mode.
pub struct VncClient {
    stream: TcpStream,
    desktop_name: String,
}

impl VncClient {
    /// Perform the RFB handshake over an established stream.
    ///
    /// When `password` is set, VNC password authentication is required and
    /// negotiated; otherwise the no-authentication security type is used.
    /// The session is opened shared, so the hypervisor's own display stays
    /// usable. Any failure here is fatal to the provisioning run.
    pub async fn handshake(stream: TcpStream, password: Option<&str>) -> ForgeResult<Self> {
        let mut stream = stream;

        let mut version = [0u8; 12];
        stream.read_exact(&mut version).await.map_err(|e| {
            ForgeError::Protocol(format!("reading server protocol version: {e}"))
        })?;
        if !version.starts_with(b"RFB ") {
            return Err(ForgeError::Protocol(
                "endpoint is not an RFB server".to_string(),
            ));
        }
        let (major, minor) = parse_version(&version)?;
        if (major, minor) < (3, 8) {
            return Err(ForgeError::Protocol(format!(
                "unsupported RFB protocol version {major}.{minor}, need at least 3.8"
            )));
        }
        stream.write_all(PROTO_VERSION).await?;

        Self::negotiate_security(&mut stream, password).await?;

        // ClientInit: request a shared session.
        stream.write_u8(1).await?;

        // ServerInit: framebuffer geometry and pixel format are irrelevant
        // for key injection, only the desktop name is kept.
        let _width = stream.read_u16().await?;
        let _height = stream.read_u16().await?;
        let mut pixel_format = [0u8; 16];
        stream.read_exact(&mut pixel_format).await?;
        let desktop_name = read_server_string(&mut stream).await?;

        Ok(Self {
            stream,
            desktop_name,
        })
    }

    async fn negotiate_security(
        stream: &mut TcpStream,
        password: Option<&str>,
    ) -> ForgeResult<()> {
        let count = stream.read_u8().await?;
        if count == 0 {
            let reason = read_server_string(stream).await?;
            return Err(ForgeError::Protocol(format!(
                "server refused connection: {reason}"
            )));
        }

        let mut types = vec![0u8; count as usize];
        stream.read_exact(&mut types).await?;

        match password {
            Some(secret) => {
                if !types.contains(&SECURITY_VNC_AUTH) {
                    return Err(ForgeError::Protocol(
                        "server does not offer VNC password authentication".to_string(),
                    ));
                }
                stream.write_u8(SECURITY_VNC_AUTH).await?;

                let mut challenge = [0u8; 16];
                stream.read_exact(&mut challenge).await?;
                let response = auth::encrypt_challenge(secret, &challenge);
                stream.write_all(&response).await?;
            }
            None => {
                if !types.contains(&SECURITY_NONE) {
                    return Err(ForgeError::Protocol(
                        "server requires authentication but no VNC password is configured"
                            .to_string(),
                    ));
                }
                stream.write_u8(SECURITY_NONE).await?;
            }
        }

        let result = stream.read_u32().await?;
        if result != 0 {
            let reason = read_server_string(stream)
                .await
                .unwrap_or_else(|_| "no reason given".to_string());
            return Err(ForgeError::Protocol(format!(
                "VNC authentication failed: {reason}"
            )));
        }

        Ok(())
    }

    /// Desktop name announced by the server.
    pub fn desktop_name(&self) -> &str {
        &self.desktop_name
    }

    /// Send a KeyEvent message (type 4).
    pub async fn key_event(&mut self, keysym: u32, down: bool) -> ForgeResult<()> {
        let mut message = [0u8; 8];
        message[0] = 4;
        message[1] = down as u8;
        message[4..8].copy_from_slice(&keysym.to_be_bytes());

        self.stream
            .write_all(&message)
            .await
            .map_err(|e| ForgeError::Protocol(format!("sending key event: {e}")))?;
        Ok(())
    }
}

fn parse_version(version: &[u8; 12]) -> ForgeResult<(u32, u32)> {
    let text = std::str::from_utf8(&version[4..11])
        .map_err(|_| ForgeError::Protocol("malformed RFB version banner".to_string()))?;
    let (major, minor) = text
        .split_once('.')
        .ok_or_else(|| ForgeError::Protocol("malformed RFB version banner".to_string()))?;
    let major = major
        .parse()
        .map_err(|_| ForgeError::Protocol("malformed RFB version banner".to_string()))?;
    let minor = minor
        .parse()
        .map_err(|_| ForgeError::Protocol("malformed RFB version banner".to_string()))?;
    Ok((major, minor))
}

async fn read_server_string(stream: &mut TcpStream) -> ForgeResult<String> {
    let len = stream.read_u32().await?;
    if len > MAX_SERVER_STRING {
        return Err(ForgeError::Protocol(format!(
            "server string length {len} exceeds limit"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
