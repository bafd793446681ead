//! `svr-proxy` — the on-site end of the RUDICS tunnel. Keeps a connection
//! to `modem-svr`'s client port, demultiplexes Proxy Packets from it into
//! local TCP streams, and remultiplexes their replies back.

use aal_codec::proxy::{ProxyPacket, ProxyPacketType};
use aal_codec::CodecError;
use aal_common::config::{SVR_PROXY_PORTS, MODEM_SVR_PORTS};
use aal_tunnel::flags::LinkFlags;
use aal_tunnel::packetizer::{Depacketize, Packetize};
use aal_tunnel::sockhandler::ExitCallback;
use aal_tunnel::xfer::TransferActivity;
use aal_tunnel::SockHandler;
use bytes::{Buf, BytesMut};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    modem_svr_host: String,

    #[arg(long, default_value_t = MODEM_SVR_PORTS.console_port())]
    modem_svr_port: u16,

    #[arg(long, default_value_t = MODEM_SVR_PORTS.rpc_port())]
    modem_svr_rpc_port: u16,

    #[arg(long, default_value_t = SVR_PROXY_PORTS.rpc_port())]
    rpc_port: u16,

    #[arg(long, default_value_t = 5)]
    reconnect_retry_s: u64,

    #[arg(long, default_value_t = 10)]
    rpc_transport_timeout_s: u64,

    #[arg(long, default_value = "/var/log/connect_time")]
    connect_flag_file: String,

    #[arg(long, default_value = "/var/log/disconnect_time")]
    disconnect_flag_file: String,
}

type StreamKey = (u16, u16);

/// One locally-terminated end of a tunneled stream: the depacketizer that
/// applies inbound packets to it, and the packetizer handle to join on
/// teardown.
struct StreamWorker {
    depacketize: Depacketize,
    packetize_running: Arc<AtomicBool>,
}

struct Dispatcher {
    outgoing_tx: Sender<ProxyPacket>,
    streams: Mutex<HashMap<StreamKey, StreamWorker>>,
    xfer: TransferActivity,
    modem_svr: aal_rpc::ModemSvrClient,
}

impl Dispatcher {
    fn handle(&self, pkt: ProxyPacket) {
        match pkt.ty {
            ProxyPacketType::Ping => {
                let _ = self.outgoing_tx.send(ProxyPacket::ping());
            }
            ProxyPacketType::IccidReq => {
                self.xfer.mark_now();
                let iccid = self.modem_svr.get_iccid();
                let _ = self.outgoing_tx.send(ProxyPacket::iccid(&iccid));
            }
            ProxyPacketType::Connect => {
                self.xfer.mark_now();
                self.handle_connect(pkt);
            }
            ProxyPacketType::Passthrough => {
                self.xfer.mark_now();
                let key = pkt.stream_key();
                let streams = self.streams.lock().expect("streams lock poisoned");
                if let Some(worker) = streams.get(&key) {
                    worker.depacketize.send(pkt);
                }
                // Unknown key: silently dropped, matching the original.
            }
            ProxyPacketType::Disconnect => {
                self.xfer.mark_now();
                let key = pkt.stream_key();
                let mut streams = self.streams.lock().expect("streams lock poisoned");
                if let Some(worker) = streams.remove(&key) {
                    worker.depacketize.send(pkt);
                    worker.packetize_running.store(false, Ordering::SeqCst);
                }
            }
            ProxyPacketType::Iccid => {}
        }
    }

    fn handle_connect(&self, pkt: ProxyPacket) {
        let key = pkt.stream_key();
        let (src_port, dest_port) = key;
        match TcpStream::connect(("127.0.0.1", dest_port)) {
            Ok(stream) => {
                tracing::info!(src_port, dest_port, "opened local stream for tunneled connect");
                let running = Arc::new(AtomicBool::new(true));
                let cb_running = running.clone();
                let exit_cb: ExitCallback = Arc::new(move || cb_running.store(false, Ordering::SeqCst));
                let sock = match SockHandler::spawn(stream, Some(exit_cb)) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to spawn local stream handler");
                        let _ = self.outgoing_tx.send(ProxyPacket::disconnect(src_port, dest_port));
                        return;
                    }
                };

                let depacketize = Depacketize::spawn(sock.get_write_q(), running.clone());
                let packetize_running = Arc::new(AtomicBool::new(true));
                Packetize::spawn(
                    sock.get_read_q(),
                    running,
                    self.outgoing_tx.clone(),
                    src_port,
                    dest_port,
                );

                let mut streams = self.streams.lock().expect("streams lock poisoned");
                streams.insert(
                    key,
                    StreamWorker {
                        depacketize,
                        packetize_running,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(dest_port, error = %e, "local connect failed, refusing tunnel");
                let _ = self.outgoing_tx.send(ProxyPacket::disconnect(src_port, dest_port));
            }
        }
    }
}

/// Reads complete Proxy Packets off `read_q`, growing a decode buffer as
/// chunks arrive.
fn read_packets(read_q: &Receiver<Vec<u8>>, buf: &mut BytesMut) -> Option<Vec<ProxyPacket>> {
    match read_q.recv_timeout(Duration::from_millis(500)) {
        Ok(chunk) => {
            buf.extend_from_slice(&chunk);
            let mut packets = Vec::new();
            loop {
                let mut reader = &buf[..];
                match ProxyPacket::decode(&mut reader) {
                    Ok(pkt) => {
                        let consumed = buf.len() - reader.remaining();
                        buf.advance(consumed);
                        packets.push(pkt);
                    }
                    Err(CodecError::Incomplete { .. }) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping malformed frame");
                        buf.clear();
                        break;
                    }
                }
            }
            Some(packets)
        }
        Err(RecvTimeoutError::Timeout) => Some(Vec::new()),
        Err(RecvTimeoutError::Disconnected) => None,
    }
}

fn run_connection(tunnel: TcpStream, link_flags: LinkFlags, xfer: TransferActivity, modem_svr: aal_rpc::ModemSvrClient) {
    let _ = link_flags.touch_connect();
    let running = Arc::new(AtomicBool::new(true));
    let cb_running = running.clone();
    let exit_cb: ExitCallback = Arc::new(move || cb_running.store(false, Ordering::SeqCst));
    let sock = match SockHandler::spawn(tunnel, Some(exit_cb)) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to spawn tunnel socket handler");
            return;
        }
    };

    let (outgoing_tx, outgoing_rx) = unbounded::<ProxyPacket>();
    let dispatcher = Arc::new(Dispatcher {
        outgoing_tx,
        streams: Mutex::new(HashMap::new()),
        xfer,
        modem_svr,
    });

    {
        let write_q = sock.get_write_q();
        let running = running.clone();
        thread::Builder::new()
            .name("svr-proxy-writer".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    match outgoing_rx.recv_timeout(Duration::from_millis(500)) {
                        Ok(pkt) => {
                            let mut encoded = BytesMut::new();
                            pkt.encode(&mut encoded);
                            let _ = write_q.send(encoded.to_vec());
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .expect("failed to spawn svr-proxy writer thread");
    }

    let read_q = sock.get_read_q();
    let mut decode_buf = BytesMut::new();
    while sock.is_running() {
        match read_packets(&read_q, &mut decode_buf) {
            Some(packets) => {
                for pkt in packets {
                    dispatcher.handle(pkt);
                }
            }
            None => break,
        }
    }

    // Tunnel lost: tear every worker down without sending further
    // DISCONNECTs, matching the original.
    let mut streams = dispatcher.streams.lock().expect("streams lock poisoned");
    for (_, worker) in streams.drain() {
        worker.packetize_running.store(false, Ordering::SeqCst);
    }
    drop(streams);
    let _ = link_flags.touch_disconnect();
}

fn main() -> anyhow::Result<()> {
    aal_common::logging::init("svr-proxy");
    let cli = Cli::parse();

    let link_flags = LinkFlags::new(cli.connect_flag_file.clone().into(), cli.disconnect_flag_file.clone().into());
    let xfer = TransferActivity::new();

    {
        let xfer = xfer.clone();
        let addr: SocketAddr = ([127, 0, 0, 1], cli.rpc_port).into();
        thread::Builder::new()
            .name("svr-proxy-rpc".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build rpc runtime");
                rt.block_on(async move {
                    let server = aal_rpc::RpcServer::new().method("time_of_last_data_xfer", move |_| {
                        let xfer = xfer.clone();
                        async move {
                            let datetime: chrono::DateTime<chrono::Utc> = xfer.last().into();
                            Ok(serde_json::json!(datetime.to_rfc3339()))
                        }
                    });
                    if let Err(e) = server.serve(addr).await {
                        tracing::error!(error = %e, "rpc server exited");
                    }
                });
            })
            .expect("failed to spawn rpc thread");
    }

    let retry = Duration::from_secs(cli.reconnect_retry_s);
    loop {
        match TcpStream::connect((cli.modem_svr_host.as_str(), cli.modem_svr_port)) {
            Ok(stream) => {
                tracing::info!("connected to modem-svr");
                let modem_svr = aal_rpc::ModemSvrClient::new(
                    format!("http://{}:{}", cli.modem_svr_host, cli.modem_svr_rpc_port),
                    Duration::from_secs(cli.rpc_transport_timeout_s),
                );
                run_connection(stream, link_flags.clone(), xfer.clone(), modem_svr);
                tracing::warn!("lost connection to modem-svr, reconnecting");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to modem-svr, retrying");
            }
        }
        thread::sleep(retry);
    }
}
