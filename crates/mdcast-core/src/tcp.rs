//! TCP broadcast server for the network distribution path.
//!
//! One listening endpoint on loopback; every connected client receives every
//! broadcast line, newline-terminated. There is no handshake and no inbound
//! protocol — anything a client sends is discarded by a one-byte read probe
//! whose only job is noticing EOF/reset so the client can be pruned.
//!
//! # Architecture
//!
//! ```text
//! broadcast(line)  ──► clients map (mutex) ──► per-client channel ──► session task ──► socket
//! accept task      ──► tune socket, insert client, spawn session
//! session task     ──► select { outbound line | read probe | shutdown }
//! ```
//!
//! `broadcast` may be called from any thread; it pushes the line onto each
//! live client's channel and returns without waiting for transmission. A slow
//! client accumulates bytes in its channel and the kernel send buffer — there
//! is no backpressure toward the producer. Per-client failures (write error,
//! EOF, reset) end only that client's session; accept errors are logged and
//! the loop continues.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::MdcastError;

/// Send/receive buffer size applied to each accepted client socket.
const CLIENT_SOCK_BUF_BYTES: libc::c_int = 64 * 1024;

type ClientMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Arc<str>>>>>;

fn net_err(what: &str, e: std::io::Error) -> MdcastError {
    MdcastError::Net(format!("{what}: {e}"))
}

/// Cheap, cloneable sender side of the broadcast server.
///
/// Lets the producer's blocking generation loop broadcast without owning the
/// server (which also holds the accept task and shutdown signal).
#[derive(Clone)]
pub struct BroadcastHandle {
    clients: ClientMap,
}

impl BroadcastHandle {
    /// Queue `line` (a `\n` is appended) for delivery to every connected
    /// client. Never blocks on I/O; callable from any thread.
    ///
    /// Clients whose session has already ended are pruned in place.
    pub fn broadcast(&self, line: &str) {
        let msg: Arc<str> = format!("{line}\n").into();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.retain(|id, tx| {
            let alive = tx.send(Arc::clone(&msg)).is_ok();
            if !alive {
                debug!("[client-{id}] gone, pruned on broadcast");
            }
            alive
        });
    }

    /// Number of clients currently registered.
    ///
    /// A freshly disconnected client may linger until its session task or the
    /// next broadcast prunes it.
    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Broadcast TCP server: accepts clients and fans lines out to all of them.
pub struct BroadcastServer {
    handle: BroadcastHandle,
    local_addr: SocketAddr,
    accept_task: tokio::task::JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl BroadcastServer {
    /// Bind `127.0.0.1:port` (with `SO_REUSEADDR`) and start accepting.
    ///
    /// Pass port `0` to let the OS pick one; see [`BroadcastServer::local_addr`].
    pub async fn start(port: u16) -> Result<Self, MdcastError> {
        let socket = TcpSocket::new_v4().map_err(|e| net_err("socket", e))?;
        socket.set_reuseaddr(true).map_err(|e| net_err("set_reuseaddr", e))?;
        socket
            .bind(SocketAddr::from(([127, 0, 0, 1], port)))
            .map_err(|e| net_err("bind", e))?;
        let listener = socket.listen(128).map_err(|e| net_err("listen", e))?;
        let local_addr = listener.local_addr().map_err(|e| net_err("local_addr", e))?;

        let clients: ClientMap = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept_task =
            tokio::spawn(accept_loop(listener, Arc::clone(&clients), shutdown_rx));

        info!("broadcast server listening on {local_addr}");
        Ok(Self { handle: BroadcastHandle { clients }, local_addr, accept_task, shutdown_tx })
    }

    /// A cloneable handle for broadcasting from other threads.
    pub fn handle(&self) -> BroadcastHandle {
        self.handle.clone()
    }

    /// See [`BroadcastHandle::broadcast`].
    pub fn broadcast(&self, line: &str) {
        self.handle.broadcast(line);
    }

    /// See [`BroadcastHandle::client_count`].
    pub fn client_count(&self) -> usize {
        self.handle.client_count()
    }

    /// The bound address (useful when started with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, end every client session, and wait for the accept
    /// task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.accept_task.await;
        // Dropping the senders ends any session still waiting on its channel.
        self.handle.clients.lock().unwrap_or_else(|e| e.into_inner()).clear();
        info!("broadcast server stopped");
    }
}

async fn accept_loop(listener: TcpListener, clients: ClientMap, shutdown_rx: watch::Receiver<bool>) {
    let next_id = AtomicU64::new(0);
    let mut shutdown = shutdown_rx.clone();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("accept loop stopping");
                return;
            }
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    let id = next_id.fetch_add(1, Ordering::Relaxed);
                    register_client(id, peer, stream, &clients, shutdown_rx.clone());
                }
                Err(e) => {
                    // Transient (EMFILE, aborted handshake); keep accepting.
                    warn!("accept error: {e}");
                }
            }
        }
    }
}

fn register_client(
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    clients: &ClientMap,
    shutdown_rx: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("[client-{id}] TCP_NODELAY failed: {e}");
    }
    tune_socket_buffers(id, stream.as_raw_fd());

    let (tx, rx) = mpsc::unbounded_channel();
    let active = {
        let mut map = clients.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(id, tx);
        map.len()
    };
    info!("[client-{id}] connected from {peer} ({active} active)");

    tokio::spawn(client_session(id, stream, rx, Arc::clone(clients), shutdown_rx));
}

/// One task per client: forward broadcast lines, watch the read probe.
async fn client_session(
    id: u64,
    stream: TcpStream,
    mut rx: mpsc::UnboundedReceiver<Arc<str>>,
    clients: ClientMap,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut probe = [0u8; 1];

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(line) => {
                    if let Err(e) = write_half.write_all(line.as_bytes()).await {
                        warn!("[client-{id}] write error: {e}");
                        break;
                    }
                }
                // Sender dropped: the server shut down or pruned us.
                None => break,
            },
            probed = read_half.read(&mut probe) => match probed {
                Ok(0) => {
                    debug!("[client-{id}] peer closed");
                    break;
                }
                // Clients have nothing to say; discard and re-arm.
                Ok(_) => {}
                Err(e) => {
                    debug!("[client-{id}] reset: {e}");
                    break;
                }
            },
            _ = shutdown_rx.changed() => break,
        }
    }

    let remaining = {
        let mut map = clients.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&id);
        map.len()
    };
    info!("[client-{id}] disconnected ({remaining} active)");
}

fn tune_socket_buffers(id: u64, fd: RawFd) {
    for (opt, label) in [(libc::SO_SNDBUF, "SO_SNDBUF"), (libc::SO_RCVBUF, "SO_RCVBUF")] {
        let val: libc::c_int = CLIENT_SOCK_BUF_BYTES;
        // SAFETY: setsockopt with an int-sized option value on a live fd.
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &val as *const _ as *const libc::c_void,
                std::mem::size_of_val(&val) as libc::socklen_t,
            )
        };
        if ret != 0 {
            warn!("[client-{id}] {label} failed: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::{Duration, sleep, timeout};

    async fn wait_for_clients(server: &BroadcastServer, n: usize) {
        for _ in 0..400 {
            if server.client_count() == n {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("server never reached {n} clients (now {})", server.client_count());
    }

    async fn next(lines: &mut tokio::io::Lines<BufReader<TcpStream>>) -> String {
        timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("timed out waiting for line")
            .expect("read error")
            .expect("stream ended early")
    }

    #[tokio::test]
    async fn fans_out_to_all_clients_in_order() {
        let server = BroadcastServer::start(0).await.unwrap();
        let addr = server.local_addr();

        let mut readers = Vec::new();
        for _ in 0..3 {
            let stream = TcpStream::connect(addr).await.unwrap();
            readers.push(BufReader::new(stream).lines());
        }
        wait_for_clients(&server, 3).await;

        for i in 0..100 {
            server.broadcast(&format!("{{\"seq\":{i}}}"));
        }
        for lines in &mut readers {
            for i in 0..100 {
                assert_eq!(next(lines).await, format!("{{\"seq\":{i}}}"));
            }
        }
        server.shutdown().await;
    }

    #[tokio::test]
    async fn lines_arrive_newline_terminated() {
        let server = BroadcastServer::start(0).await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_clients(&server, 1).await;

        server.broadcast("hello");
        let mut buf = [0u8; 6];
        timeout(Duration::from_secs(5), stream.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"hello\n");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn survives_abrupt_client_disconnect() {
        let server = BroadcastServer::start(0).await.unwrap();
        let addr = server.local_addr();

        let mut readers = Vec::new();
        for _ in 0..3 {
            let stream = TcpStream::connect(addr).await.unwrap();
            readers.push(BufReader::new(stream).lines());
        }
        wait_for_clients(&server, 3).await;

        server.broadcast("one");
        for lines in &mut readers {
            assert_eq!(next(lines).await, "one");
        }

        // One client vanishes mid-stream.
        drop(readers.remove(0));
        wait_for_clients(&server, 2).await;

        server.broadcast("two");
        for lines in &mut readers {
            assert_eq!(next(lines).await, "two");
        }

        // And the server still accepts new connections.
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut late = BufReader::new(stream).lines();
        wait_for_clients(&server, 3).await;
        server.broadcast("three");
        assert_eq!(next(&mut late).await, "three");
        for lines in &mut readers {
            assert_eq!(next(lines).await, "three");
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn broadcast_with_no_clients_is_a_no_op() {
        let server = BroadcastServer::start(0).await.unwrap();
        server.broadcast("into the void");
        assert_eq!(server.client_count(), 0);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_client_sessions() {
        let server = BroadcastServer::start(0).await.unwrap();
        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        wait_for_clients(&server, 1).await;

        server.shutdown().await;
        let eof = timeout(Duration::from_secs(5), lines.next_line()).await.unwrap().unwrap();
        assert_eq!(eof, None);
    }
}
