//! Tracker subprocess manager
//!
//! Launches the Python Face Mesh helper as a child process, killed on drop.

use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;

use crate::config::MediaPipeConfig;
use crate::error::{FacespriteError, TrackingError};

/// Manages a Face Mesh tracker subprocess
pub struct MpSubprocess {
    child: Option<Child>,
    config: MediaPipeConfig,
}

impl MpSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &MediaPipeConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
        }
    }

    /// Command-line arguments passed to the tracker script
    pub fn args(&self) -> Vec<String> {
        let c = &self.config;
        let mut args = vec![
            c.tracker_script.clone(),
            "--ip".to_string(),
            c.listen_address.clone(),
            "--port".to_string(),
            c.port.to_string(),
            "--control-port".to_string(),
            c.control_port.to_string(),
            "--capture".to_string(),
            c.camera_device.to_string(),
            "--width".to_string(),
            c.capture_width.to_string(),
            "--height".to_string(),
            c.capture_height.to_string(),
            "--fps".to_string(),
            c.capture_fps.to_string(),
            "--max-num-faces".to_string(),
            c.max_num_faces.to_string(),
            "--min-detection-confidence".to_string(),
            c.min_detection_confidence.to_string(),
            "--min-tracking-confidence".to_string(),
            c.min_tracking_confidence.to_string(),
        ];
        if c.refine_landmarks {
            args.push("--refine-landmarks".to_string());
        }
        args
    }

    /// Launch the tracker subprocess
    pub fn start(&mut self) -> Result<(), FacespriteError> {
        if self.is_running() {
            return Ok(());
        }

        let child = Command::new("python3")
            .args(self.args())
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| {
                TrackingError::Subprocess(format!(
                    "Failed to launch tracker at '{}': {}",
                    self.config.tracker_script, e
                ))
            })?;

        tracing::info!(
            "Tracker subprocess started (pid: {:?}, camera: {}, port: {})",
            child.id(),
            self.config.camera_device,
            self.config.port,
        );

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Tracker subprocess exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check tracker subprocess status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping tracker subprocess (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

/// Wait out the restart delay, giving up early on shutdown.
///
/// Returns `false` when shutdown was signalled before the delay elapsed.
pub async fn wait_restart_delay(delay: Duration, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown_rx.recv() => false,
    }
}

/// Check if the `mediapipe` Python package is importable
pub fn check_mediapipe_available() -> bool {
    match std::process::Command::new("python3")
        .args(["-c", "import mediapipe"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_carry_face_mesh_options() {
        let sp = MpSubprocess::new(&MediaPipeConfig::default());
        let args = sp.args();

        assert_eq!(args[0], "scripts/face_mesh_tracker.py");
        let value = |flag: &str| {
            let i = args.iter().position(|a| a == flag).unwrap();
            args[i + 1].clone()
        };
        assert_eq!(value("--port"), "12346");
        assert_eq!(value("--control-port"), "12347");
        assert_eq!(value("--max-num-faces"), "1");
        assert_eq!(value("--min-detection-confidence"), "0.5");
        assert_eq!(value("--width"), "640");
        assert!(args.contains(&"--refine-landmarks".to_string()));
    }

    #[test]
    fn test_not_running_before_start() {
        let mut sp = MpSubprocess::new(&MediaPipeConfig::default());
        assert!(!sp.is_running());
    }

    #[tokio::test]
    async fn test_restart_delay_yields_to_shutdown() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let waited = tokio::time::timeout(
            Duration::from_secs(1),
            wait_restart_delay(Duration::from_secs(60), &mut rx),
        )
        .await;

        assert_eq!(waited, Ok(false));
    }

    #[tokio::test]
    async fn test_restart_delay_elapses() {
        let (_tx, mut rx) = broadcast::channel::<()>(1);
        assert!(wait_restart_delay(Duration::from_millis(10), &mut rx).await);
    }
}
