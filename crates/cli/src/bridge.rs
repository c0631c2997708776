//! UDP bridges onto the controller's message channels
//!
//! The controller and the heartbeat responder run on plain threads and only
//! see `mpsc` channels of raw payloads. These tasks move datagrams between
//! the network and those channels until shutdown is signalled.

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Largest control or heartbeat datagram accepted
const MAX_DATAGRAM: usize = 1024;

/// Forward every control datagram to the controller
///
/// Returns when shutdown is signalled or the controller hangs up. Dropping
/// `commands` on return closes the controller's channel.
pub async fn control_bridge(
    socket: UdpSocket,
    commands: mpsc::Sender<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut forwarded = 0u64;
    info!(addr = ?socket.local_addr().ok(), "control bridge listening");

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, peer) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "control receive failed");
                        continue;
                    }
                };
                debug!(%peer, bytes = n, "control message");
                if commands.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    warn!("controller hung up");
                    break;
                }
                forwarded += 1;
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(forwarded, "control bridge exiting");
    forwarded
}

/// Relay heartbeat probes to the responder and its replies back to the sender
///
/// Probes are handled one at a time so every reply goes to the peer whose
/// probe produced it.
pub async fn heartbeat_bridge(
    socket: UdpSocket,
    probes: mpsc::Sender<Bytes>,
    mut replies: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut answered = 0u64;
    info!(addr = ?socket.local_addr().ok(), "heartbeat bridge listening");

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, peer) = match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "heartbeat receive failed");
                        continue;
                    }
                };
                if probes.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
                let Some(reply) = replies.recv().await else {
                    break;
                };
                if let Err(e) = socket.send_to(&reply, peer).await {
                    warn!(%peer, error = %e, "heartbeat reply failed");
                    continue;
                }
                trace!(%peer, bytes = reply.len(), "heartbeat answered");
                answered += 1;
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!(answered, "heartbeat bridge exiting");
    answered
}

/// Tell every bridge to exit
///
/// Returns false when no bridge was still listening.
pub fn signal_shutdown(shutdown: &watch::Sender<bool>) -> bool {
    if shutdown.send(true).is_err() {
        debug!("bridges already exited");
        return false;
    }
    true
}
