//! Face Mesh landmark receiver
//!
//! Receives JSON-over-UDP packets from the Python tracker helper. One
//! datagram carries one camera frame:
//!
//! ```json
//! {"faces": [[{"x": 0.51, "y": 0.42, "z": -0.03}, ...]], "timestamp_ms": 1234}
//! ```

use std::net::{SocketAddr, UdpSocket};

use crate::config::MediaPipeConfig;
use crate::error::{FacespriteError, TrackingError};
use crate::tracking::landmarks::FrameDelivery;

/// Parse one tracker datagram
pub fn parse_packet(bytes: &[u8]) -> Result<FrameDelivery, FacespriteError> {
    serde_json::from_slice(bytes)
        .map_err(|e| TrackingError::Parse(format!("JSON parse error: {}", e)).into())
}

/// Sends preview toggles back to the tracker helper.
///
/// The camera lives in the helper process, so the raw feed is shown there in
/// its own window. Datagrams are fire-and-forget; a helper that is not
/// running simply never sees them.
pub struct TrackerControl {
    socket: UdpSocket,
    target: String,
}

impl TrackerControl {
    pub fn new(config: &MediaPipeConfig) -> Result<Self, FacespriteError> {
        let socket = UdpSocket::bind((config.listen_address.as_str(), 0)).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind control socket: {}", e))
        })?;

        Ok(Self {
            socket,
            target: format!("{}:{}", config.listen_address, config.control_port),
        })
    }

    /// Show or hide the helper's camera preview window
    pub fn set_preview(&self, visible: bool) -> Result<(), FacespriteError> {
        let message = serde_json::json!({ "preview": visible }).to_string();
        self.socket
            .send_to(message.as_bytes(), &self.target)
            .map_err(|e| {
                TrackingError::Receiver(format!("Failed to send to {}: {}", self.target, e))
            })?;
        tracing::debug!("Tracker preview -> {}", visible);
        Ok(())
    }
}

/// Landmark receiver over UDP
pub struct MpReceiver {
    config: MediaPipeConfig,
    socket: Option<UdpSocket>,
    frames_received: u64,
}

impl MpReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &MediaPipeConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            frames_received: 0,
        }
    }

    /// Bind the UDP socket
    pub fn start(&mut self) -> Result<(), FacespriteError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackingError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        tracing::info!("Landmark receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Bound address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Read one pending frame, if any (non-blocking)
    pub fn poll(&mut self) -> Result<Option<FrameDelivery>, FacespriteError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut buf = [0u8; 65536];

        match socket.recv(&mut buf) {
            Ok(size) if size > 0 => {
                let delivery = parse_packet(&buf[..size])?;
                self.frames_received += 1;
                Ok(Some(delivery))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TrackingError::Receiver(format!("Receive error: {}", e)).into()),
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("Landmark receiver stopped");
    }
}
