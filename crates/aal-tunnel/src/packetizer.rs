//! Packetize/Depacketize: the two halves of one tunneled stream's worker
//! pair. A `Packetize` thread chunks a local stream's bytes into
//! PASSTHROUGH proxy packets; a `Depacketize` thread applies PASSTHROUGH/
//! CONNECT/DISCONNECT packets addressed to this stream back onto the
//! local socket.

use aal_codec::proxy::{ProxyPacket, ProxyPacketType, MAX_PASSTHROUGH_DATA_LEN};
use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Packetizes a stream's outgoing bytes into PASSTHROUGH proxy packets and
/// pushes them to `pkt_write_tx`. Exits as soon as the underlying socket
/// handler stops running.
pub struct Packetize {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Packetize {
    pub fn spawn(
        stream_read_rx: Receiver<Vec<u8>>,
        sock_is_running: Arc<AtomicBool>,
        pkt_write_tx: Sender<ProxyPacket>,
        src_port: u16,
        dest_port: u16,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name(format!("packetize-{src_port}-{dest_port}"))
            .spawn(move || {
                loop {
                    if !sock_is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    match stream_read_rx.recv_timeout(POLL_TIMEOUT) {
                        Ok(data) => send_passthrough(&pkt_write_tx, src_port, dest_port, &data),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .expect("failed to spawn packetize thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn send_passthrough(tx: &Sender<ProxyPacket>, src: u16, dest: u16, data: &[u8]) {
    for chunk in data.chunks(MAX_PASSTHROUGH_DATA_LEN) {
        let _ = tx.send(ProxyPacket::passthrough(src, dest, Bytes::copy_from_slice(chunk)));
    }
}

/// Depacketizes proxy packets addressed to this stream and writes their
/// PASSTHROUGH payload to the local socket's write queue. Exits (and
/// records that it did so) the moment a DISCONNECT packet arrives.
pub struct Depacketize {
    pkt_tx: Sender<ProxyPacket>,
    running: Arc<AtomicBool>,
    got_disconnect: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Depacketize {
    pub fn spawn(stream_write_tx: Sender<Vec<u8>>, sock_is_running: Arc<AtomicBool>) -> Self {
        let (pkt_tx, pkt_rx) = bounded::<ProxyPacket>(256);
        let running = Arc::new(AtomicBool::new(true));
        let got_disconnect = Arc::new(AtomicBool::new(false));

        let thread_running = running.clone();
        let thread_disconnect = got_disconnect.clone();
        let handle = thread::Builder::new()
            .name("depacketize".into())
            .spawn(move || {
                loop {
                    if !sock_is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    match pkt_rx.recv_timeout(POLL_TIMEOUT) {
                        Ok(pkt) => match pkt.ty {
                            ProxyPacketType::Passthrough => {
                                if !pkt.payload.is_empty() {
                                    let _ = stream_write_tx.send(pkt.payload.to_vec());
                                }
                            }
                            ProxyPacketType::Connect => continue,
                            ProxyPacketType::Disconnect => {
                                thread_disconnect.store(true, Ordering::SeqCst);
                                break;
                            }
                            _ => continue,
                        },
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .expect("failed to spawn depacketize thread");

        Self {
            pkt_tx,
            running,
            got_disconnect,
            handle: Some(handle),
        }
    }

    /// Queues a packet addressed to this stream for depacketizing.
    pub fn send(&self, pkt: ProxyPacket) {
        let _ = self.pkt_tx.send(pkt);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn got_disconnect_pkt(&self) -> bool {
        self.got_disconnect.load(Ordering::SeqCst)
    }

    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packetize_chunks_large_payloads_at_max_passthrough_len() {
        let (stream_tx, stream_rx) = bounded::<Vec<u8>>(8);
        let (pkt_tx, pkt_rx) = bounded::<ProxyPacket>(8);
        let running = Arc::new(AtomicBool::new(true));

        let p = Packetize::spawn(stream_rx, running.clone(), pkt_tx, 10, 20);
        let data = vec![0xAB; MAX_PASSTHROUGH_DATA_LEN + 10];
        stream_tx.send(data.clone()).unwrap();

        let first = pkt_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = pkt_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.payload.len(), MAX_PASSTHROUGH_DATA_LEN);
        assert_eq!(second.payload.len(), 10);

        running.store(false, Ordering::SeqCst);
        p.join();
    }

    #[test]
    fn depacketize_forwards_passthrough_and_stops_on_disconnect() {
        let (stream_tx, stream_rx) = bounded::<Vec<u8>>(8);
        let running = Arc::new(AtomicBool::new(true));
        let d = Depacketize::spawn(stream_tx, running.clone());

        d.send(ProxyPacket::passthrough(1, 2, Bytes::from_static(b"hi")));
        let forwarded = stream_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(forwarded, b"hi");

        assert!(!d.got_disconnect_pkt());
        d.send(ProxyPacket::disconnect(1, 2));
        std::thread::sleep(Duration::from_millis(700));
        assert!(d.got_disconnect_pkt());
        assert!(!d.is_running());

        running.store(false, Ordering::SeqCst);
        d.join();
    }
}
