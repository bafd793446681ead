//! The framed socket handler: owns one `TcpStream`, pumps bytes in both
//! directions through bounded queues via a reader and a writer OS thread.
//!
//! `is_running()` flips to `false`, and the optional exit callback fires
//! exactly once, the moment either thread observes a closed socket or a
//! persistent I/O error. Both directions are independent: a write failure
//! does not wait on the reader to notice, and vice versa.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 4096;

pub type ExitCallback = Arc<dyn Fn() + Send + Sync>;

/// A running framed socket handler. Cloning shares the same underlying
/// queues and running flag.
#[derive(Clone)]
pub struct SockHandler {
    read_rx: Receiver<Vec<u8>>,
    write_tx: Sender<Vec<u8>>,
    running: Arc<AtomicBool>,
    peer_port: u16,
}

impl SockHandler {
    /// Spawns the reader and writer threads over `stream` and returns a
    /// handle immediately; the handler starts running before this call
    /// returns.
    pub fn spawn(stream: TcpStream, exit_callback: Option<ExitCallback>) -> std::io::Result<Self> {
        let peer_port = stream.peer_addr().map(|a| a.port()).unwrap_or(0);
        let running = Arc::new(AtomicBool::new(true));
        let cb_fired = Arc::new(AtomicBool::new(false));

        let (read_tx, read_rx) = bounded::<Vec<u8>>(256);
        let (write_tx, write_rx) = bounded::<Vec<u8>>(256);

        let reader_stream = stream.try_clone()?;
        let writer_stream = stream;

        let reader_running = running.clone();
        let reader_cb = exit_callback.clone();
        let reader_fired = cb_fired.clone();
        thread::Builder::new()
            .name("sockhandler-reader".into())
            .spawn(move || reader_loop(reader_stream, read_tx, reader_running, reader_cb, reader_fired))
            .expect("failed to spawn sockhandler reader thread");

        let writer_running = running.clone();
        let writer_cb = exit_callback;
        let writer_fired = cb_fired;
        thread::Builder::new()
            .name("sockhandler-writer".into())
            .spawn(move || writer_loop(writer_stream, write_rx, writer_running, writer_cb, writer_fired))
            .expect("failed to spawn sockhandler writer thread");

        Ok(Self {
            read_rx,
            write_tx,
            running,
            peer_port,
        })
    }

    pub fn get_read_q(&self) -> Receiver<Vec<u8>> {
        self.read_rx.clone()
    }

    pub fn get_write_q(&self) -> Sender<Vec<u8>> {
        self.write_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }
}

fn fire_once(fired: &AtomicBool, cb: &Option<ExitCallback>) {
    if fired.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(cb) = cb {
        cb();
    }
}

fn reader_loop(
    mut stream: TcpStream,
    tx: Sender<Vec<u8>>,
    running: Arc<AtomicBool>,
    exit_callback: Option<ExitCallback>,
    fired: Arc<AtomicBool>,
) {
    stream
        .set_read_timeout(Some(POLL_TIMEOUT))
        .expect("setting read timeout should not fail on a live socket");
    let mut buf = [0u8; READ_CHUNK];
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match stream.read(&mut buf) {
            Ok(0) => break, // peer closed
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(_) => break,
        }
    }
    running.store(false, Ordering::SeqCst);
    let _ = stream.shutdown(Shutdown::Both);
    fire_once(&fired, &exit_callback);
}

fn writer_loop(
    mut stream: TcpStream,
    rx: Receiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    exit_callback: Option<ExitCallback>,
    fired: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(data) => {
                if stream.write_all(&data).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    running.store(false, Ordering::SeqCst);
    let _ = stream.shutdown(Shutdown::Both);
    fire_once(&fired, &exit_callback);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn pumps_bytes_written_on_the_peer_to_the_read_queue() {
        let (mut client, server) = loopback_pair();
        let handler = SockHandler::spawn(server, None).unwrap();
        client.write_all(b"hello").unwrap();

        let data = handler.get_read_q().recv_timeout(StdDuration::from_secs(2)).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn pumps_bytes_sent_to_the_write_queue_to_the_peer() {
        let (mut client, server) = loopback_pair();
        let handler = SockHandler::spawn(server, None).unwrap();
        handler.get_write_q().send(b"world".to_vec()).unwrap();

        let mut buf = [0u8; 5];
        client.set_read_timeout(Some(StdDuration::from_secs(2))).unwrap();
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn closing_the_peer_stops_the_handler_and_fires_exit_callback_once() {
        let (client, server) = loopback_pair();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handler = SockHandler::spawn(server, Some(Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();

        drop(client);
        std::thread::sleep(StdDuration::from_millis(800));
        assert!(!handler.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
