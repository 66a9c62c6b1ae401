//! IPC (Inter-Process Communication) via Unix sockets
//!
//! Provides message-based communication between the CLI and the daemon.
//! Uses length-prefixed JSON over Unix domain sockets.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

mod messages;
pub use messages::{Request, Response, StatusSnapshot};

use crate::constants;

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    let dir = match std::env::var("XDG_RUNTIME_DIR") {
        Ok(runtime_dir) => PathBuf::from(runtime_dir),
        Err(_) => dirs::cache_dir()
            .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?,
    };
    Ok(dir
        .join(constants::config::APP_DIR)
        .join(constants::config::SOCKET_FILENAME))
}

/// Client connection to the daemon
pub struct Client {
    pub(crate) stream: UnixStream,
}

impl Client {
    /// Connect to specific socket path
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to daemon at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send_request(&mut self, req: &Request) -> Result<()> {
        write_message(&mut self.stream, req)
    }

    /// Receive response from the daemon (blocking)
    pub fn recv_response(&mut self) -> Result<Response> {
        read_message(&mut self.stream)
    }

    /// Send request and wait for response (convenience method)
    pub fn request(&mut self, req: Request) -> Result<Response> {
        self.send_request(&req)?;
        self.recv_response()
    }
}

/// Server listener for the daemon
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl Server {
    /// Create server and bind to specific socket path
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        // Create directory if needed
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Refuse to steal the socket from a live daemon
        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                return Err(anyhow!("Daemon already running at {}", socket_path.display()));
            }
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        // Set permissions to 0700 (owner only)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<Client> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("Failed to accept IPC connection")?;
        Ok(Client { stream })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Clean up socket file
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write length-prefixed message to stream
pub(crate) fn write_message<T: Serialize>(stream: &mut impl Write, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;

    // Write length prefix (u32 little-endian)
    let len = u32::try_from(json.len()).context("Message length exceeds u32")?;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;

    stream
        .write_all(&json)
        .context("Failed to write message payload")?;

    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
pub(crate) fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut impl Read) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > constants::ipc::MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Message too large: {} bytes (max: {})",
            len,
            constants::ipc::MAX_MESSAGE_SIZE
        ));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
