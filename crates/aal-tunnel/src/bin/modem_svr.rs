//! `modem-svr` — owns the Iridium RUDICS modem, dials it up, and relays
//! bytes between the modem and the one local client (`svr-proxy`) that
//! connects to its client port.

use aal_common::config::MODEM_SVR_PORTS;
use aal_tunnel::modemlink::{ModemLink, RudicsSerialLink, SimulatedModemLink};
use aal_tunnel::SockHandler;
use clap::Parser;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

type SharedLink = Arc<Mutex<Box<dyn ModemLink>>>;

#[derive(Parser)]
struct Cli {
    /// Device path of the Iridium RUDICS modem, e.g. /dev/ttyUSB0. Required
    /// unless --simulate is set.
    #[arg(long)]
    serial_path: Option<String>,

    #[arg(long, default_value_t = 115200)]
    baud: u32,

    #[arg(long, default_value_t = MODEM_SVR_PORTS.console_port())]
    client_port: u16,

    #[arg(long, default_value_t = MODEM_SVR_PORTS.rpc_port())]
    rpc_port: u16,

    /// Seconds of modem-read inactivity before the link is torn down and
    /// redialed, matching the original's `rx_data_timeout`.
    #[arg(long, default_value_t = 90)]
    rx_data_timeout_s: u64,

    #[arg(long, default_value_t = 5)]
    dial_retry_s: u64,

    /// Run against an in-process simulated modem instead of real hardware.
    #[arg(long, default_value_t = false)]
    simulate: bool,

    #[arg(long, default_value = "89014103211118510720")]
    simulated_iccid: String,
}

fn build_link(cli: &Cli) -> std::io::Result<Box<dyn ModemLink>> {
    if cli.simulate {
        let (link, mut remote) = SimulatedModemLink::pair(&cli.simulated_iccid)?;
        thread::Builder::new()
            .name("simulated-modem-echo".into())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match remote.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if remote.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                            ) =>
                        {
                            continue
                        }
                        Err(_) => break,
                    }
                }
            })
            .expect("failed to spawn simulated modem echo thread");
        Ok(Box::new(link))
    } else {
        let path = cli
            .serial_path
            .clone()
            .expect("--serial-path is required unless --simulate is set");
        Ok(Box::new(RudicsSerialLink::open(
            &path,
            cli.baud,
            Duration::from_secs(5),
        )?))
    }
}

/// Keeps the modem dialed, redialing with a fixed backoff whenever it drops.
fn dial_loop(link: SharedLink, iccid: Arc<Mutex<String>>, retry: Duration) {
    loop {
        let connected = link.lock().expect("modem link lock poisoned").is_connected();
        if connected {
            thread::sleep(retry);
            continue;
        }
        tracing::info!("dialing modem");
        let dialed = link.lock().expect("modem link lock poisoned").dial();
        if dialed {
            let id = link.lock().expect("modem link lock poisoned").iccid();
            *iccid.lock().expect("iccid lock poisoned") = id;
            tracing::info!("modem link up");
        } else {
            tracing::warn!(retry_s = retry.as_secs(), "dial failed, retrying");
            thread::sleep(retry);
        }
    }
}

/// Pumps bytes modem -> current client (if any), tearing the link down
/// after `rx_timeout` of silence.
fn modem_reader_loop(
    link: SharedLink,
    client_write_tx: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    last_activity: Arc<Mutex<Instant>>,
    rx_timeout: Duration,
) {
    let mut buf = [0u8; 4096];
    loop {
        let connected = link.lock().expect("modem link lock poisoned").is_connected();
        if !connected {
            thread::sleep(Duration::from_millis(200));
            continue;
        }
        if last_activity.lock().expect("activity lock poisoned").elapsed() > rx_timeout {
            tracing::warn!("rx inactivity timeout, hanging up modem");
            link.lock().expect("modem link lock poisoned").hangup();
            continue;
        }
        let read_result = link.lock().expect("modem link lock poisoned").read(&mut buf);
        match read_result {
            Ok(0) => continue,
            Ok(n) => {
                *last_activity.lock().expect("activity lock poisoned") = Instant::now();
                if let Some(tx) = client_write_tx.lock().expect("client tx lock poisoned").as_ref() {
                    let _ = tx.send(buf[..n].to_vec());
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(e) => {
                tracing::warn!(error = %e, "modem read error, hanging up");
                link.lock().expect("modem link lock poisoned").hangup();
            }
        }
    }
}

/// Pumps bytes queued by the current client onto the modem.
fn modem_writer_loop(link: SharedLink, to_modem_rx: crossbeam_channel::Receiver<Vec<u8>>) {
    loop {
        match to_modem_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(data) => {
                if link
                    .lock()
                    .expect("modem link lock poisoned")
                    .write_all(&data)
                    .is_err()
                {
                    tracing::warn!("modem write failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn main() -> anyhow::Result<()> {
    aal_common::logging::init("modem-svr");
    let cli = Cli::parse();

    let link: SharedLink = Arc::new(Mutex::new(build_link(&cli)?));
    let iccid = Arc::new(Mutex::new(String::new()));
    let client_write_tx: Arc<Mutex<Option<Sender<Vec<u8>>>>> = Arc::new(Mutex::new(None));
    let last_activity = Arc::new(Mutex::new(Instant::now()));
    let (to_modem_tx, to_modem_rx) = unbounded::<Vec<u8>>();

    {
        let link = link.clone();
        let iccid = iccid.clone();
        let retry = Duration::from_secs(cli.dial_retry_s);
        thread::Builder::new()
            .name("modem-dial".into())
            .spawn(move || dial_loop(link, iccid, retry))
            .expect("failed to spawn dial thread");
    }
    {
        let link = link.clone();
        let client_write_tx = client_write_tx.clone();
        let last_activity = last_activity.clone();
        let rx_timeout = Duration::from_secs(cli.rx_data_timeout_s);
        thread::Builder::new()
            .name("modem-reader".into())
            .spawn(move || modem_reader_loop(link, client_write_tx, last_activity, rx_timeout))
            .expect("failed to spawn modem reader thread");
    }
    {
        let link = link.clone();
        thread::Builder::new()
            .name("modem-writer".into())
            .spawn(move || modem_writer_loop(link, to_modem_rx))
            .expect("failed to spawn modem writer thread");
    }
    {
        let iccid = iccid.clone();
        let addr: SocketAddr = ([127, 0, 0, 1], cli.rpc_port).into();
        thread::Builder::new()
            .name("modem-svr-rpc".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build rpc runtime");
                rt.block_on(async move {
                    let server = aal_rpc::RpcServer::new().method("get_iccid", move |_| {
                        let iccid = iccid.clone();
                        async move { Ok(serde_json::json!(*iccid.lock().expect("iccid lock poisoned"))) }
                    });
                    if let Err(e) = server.serve(addr).await {
                        tracing::error!(error = %e, "rpc server exited");
                    }
                });
            })
            .expect("failed to spawn rpc thread");
    }

    let listener = TcpListener::bind(("127.0.0.1", cli.client_port))?;
    tracing::info!(port = cli.client_port, "accepting client connections");
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        tracing::info!("client connected");
        let running = Arc::new(AtomicBool::new(true));
        let sock_running = running.clone();
        let exit_cb: aal_tunnel::sockhandler::ExitCallback =
            Arc::new(move || sock_running.store(false, Ordering::SeqCst));
        let sock = match SockHandler::spawn(stream, Some(exit_cb)) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn client socket handler");
                continue;
            }
        };
        *client_write_tx.lock().expect("client tx lock poisoned") = Some(sock.get_write_q());

        let read_q = sock.get_read_q();
        let forward_tx = to_modem_tx.clone();
        while running.load(Ordering::SeqCst) {
            match read_q.recv_timeout(Duration::from_millis(500)) {
                Ok(data) => {
                    let _ = forward_tx.send(data);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        *client_write_tx.lock().expect("client tx lock poisoned") = None;
        tracing::info!("client disconnected");
    }
    Ok(())
}
