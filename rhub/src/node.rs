//! A thin actor layer on top of one backend registration.
//!
//! One `Node` registers a single service name with the Hub; each inbound
//! connection the Hub hands off is an envelope addressed to a spawned
//! actor, demultiplexed by an opaque [`ActorId`] carried as the first
//! frame on the handed-off socket. The actor is resumed with the payload
//! and may reply on that same socket before it closes.
//!
//! This module has no retry policy, no supervision tree, and no
//! backpressure scheme beyond an unbounded per-actor mailbox — matching
//! the thin framing the rest of this crate gives its boundary adapters.

use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use hashbrown::HashMap;
use rhub_core::endpoint::{BackendPath, FrontendAddr};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::os::unix::io::FromRawFd;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::proto::{BackendConn, ControlEvent, FrontendConn};

/// Opaque actor address, scoped to one [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(u64);

impl ActorId {
    const WIRE_LEN: usize = 8;

    fn to_be_bytes(self) -> [u8; Self::WIRE_LEN] {
        self.0.to_be_bytes()
    }

    fn from_be_bytes(bytes: [u8; Self::WIRE_LEN]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

/// A message delivered to an actor: the payload plus the still-open socket
/// it arrived on, which the actor may write a reply to before dropping.
pub struct Envelope {
    pub payload: Vec<u8>,
    pub reply: TcpStream,
}

/// An actor's inbox. Cloning a `Node` and calling [`Node::spawn`] again
/// creates further, independent mailboxes.
pub struct Mailbox {
    id: ActorId,
    rx: flume::Receiver<Envelope>,
}

impl Mailbox {
    #[must_use]
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Wait for the next envelope addressed to this actor. Returns `None`
    /// only if the `Node` itself has been dropped.
    pub async fn recv(&self) -> Option<Envelope> {
        self.rx.recv_async().await.ok()
    }
}

type Inbox = HashMap<ActorId, flume::Sender<Envelope>>;

/// Registers one service name with the Hub and demultiplexes handed-off
/// connections to spawned actors by `ActorId`.
#[derive(Clone)]
pub struct Node {
    frontend: FrontendAddr,
    backend: BackendPath,
    name: Rc<Vec<u8>>,
    inboxes: Rc<RefCell<Inbox>>,
    next_id: Rc<Cell<u64>>,
}

impl Node {
    #[must_use]
    pub fn new(frontend: FrontendAddr, backend: BackendPath, name: impl Into<Vec<u8>>) -> Self {
        Self {
            frontend,
            backend,
            name: Rc::new(name.into()),
            inboxes: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Spawn `actor` with a fresh mailbox and return its address. The actor
    /// future is driven on the current single-threaded executor.
    pub fn spawn<F, Fut>(&self, actor: F) -> ActorId
    where
        F: FnOnce(Mailbox, Node) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let id = ActorId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let (tx, rx) = flume::unbounded();
        self.inboxes.borrow_mut().insert(id, tx);

        let mailbox = Mailbox { id, rx };
        compio::runtime::spawn(actor(mailbox, self.clone())).detach();
        id
    }

    /// Send `payload` to `target`. Waits up to `reply_window` for the
    /// receiving actor to write a reply on the same socket before closing
    /// it; returns `None` if nothing arrived in that window.
    ///
    /// # Errors
    ///
    /// Returns an error if the Hub rejects the registration lookup (this
    /// node's own name went away) or the underlying connect/IO fails.
    pub async fn send(
        &self,
        target: ActorId,
        payload: &[u8],
        reply_window: Duration,
    ) -> io::Result<Option<Vec<u8>>> {
        let mut stream = FrontendConn::connect(self.frontend.0, &self.name, reply_window).await?;

        let mut wire = Vec::with_capacity(ActorId::WIRE_LEN + payload.len());
        wire.extend_from_slice(&target.to_be_bytes());
        wire.extend_from_slice(payload);
        stream.write_all(wire).await.0?;

        let buf = vec![0u8; rhub_core::wire::FRAME_BUF_SIZE];
        let probed = rhub_core::timeout::with_timeout(reply_window, async {
            let compio::buf::BufResult(res, buf) = stream.read(buf).await;
            res.map(|n| (n, buf))
        })
        .await;

        match probed {
            Ok((0, _)) => Ok(None),
            Ok((n, buf)) => Ok(Some(buf[..n].to_vec())),
            Err(e) if rhub_core::timeout::is_timeout(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Register this node's service name with the Hub and dispatch handed
    /// off connections to spawned actors until the control connection is
    /// closed (deregistration) or an unrecoverable I/O error occurs.
    pub async fn run(&self) -> io::Result<()> {
        let ctrl = BackendConn::register(self.backend.as_path(), &self.name).await?;

        loop {
            match ctrl.recv_event().await? {
                None => return Ok(()),
                Some(ControlEvent::Probe) => continue,
                Some(ControlEvent::ClientFd(fd)) => {
                    // SAFETY: `fd` was just handed to us by the Hub over
                    // the control channel and is not owned elsewhere.
                    let stream = unsafe { TcpStream::from_raw_fd(fd) };
                    self.dispatch(stream).await;
                }
            }
        }
    }

    async fn dispatch(&self, mut stream: TcpStream) {
        let frame = match rhub_core::wire::read_frame(&mut stream).await {
            Ok(Some(frame)) if frame.len() >= ActorId::WIRE_LEN => frame,
            Ok(_) => {
                debug!("node: envelope frame too short to carry an actor id, dropping");
                return;
            }
            Err(e) => {
                debug!(error = %e, "node: failed to read envelope frame");
                return;
            }
        };

        let mut id_bytes = [0u8; ActorId::WIRE_LEN];
        id_bytes.copy_from_slice(&frame[..ActorId::WIRE_LEN]);
        let target = ActorId::from_be_bytes(id_bytes);
        let payload = frame[ActorId::WIRE_LEN..].to_vec();

        let sender = self.inboxes.borrow().get(&target).cloned();
        match sender {
            Some(sender) => {
                let _ = sender.send(Envelope {
                    payload,
                    reply: stream,
                });
            }
            None => {
                warn!(actor = target.0, "node: no actor registered for this id, dropping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compio::net::{TcpListener, TcpStream};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dummy_node(name: &str) -> Node {
        Node::new(
            FrontendAddr::parse("127.0.0.1:1").unwrap(),
            BackendPath::new("/tmp/rhub-node-test.sock").unwrap(),
            name.as_bytes().to_vec(),
        )
    }

    /// Simulate one Hub handoff: bind a loopback listener, connect a
    /// client that writes `wire_payload`, and return the accepted side as
    /// if it had just arrived from the Hub, plus the still-open client
    /// side for reading a reply.
    async fn simulate_handoff(wire_payload: Vec<u8>) -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_handle = compio::runtime::spawn(async move {
            let (stream, _addr) = listener.accept().await.unwrap();
            stream
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(wire_payload).await.0.unwrap();

        let accepted = accept_handle.await.unwrap();
        (accepted, client)
    }

    #[compio::test]
    async fn dispatch_routes_to_the_addressed_actor_and_reply_round_trips() {
        let node = dummy_node("actor-test");

        let received: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
        let received_in_actor = Rc::clone(&received);

        let actor_id = node.spawn(move |mailbox, _node| async move {
            if let Some(envelope) = mailbox.recv().await {
                *received_in_actor.borrow_mut() = Some(envelope.payload);
                let mut reply = envelope.reply;
                reply.write_all(b"pong".to_vec()).await.0.unwrap();
            }
        });

        let mut wire = actor_id.to_be_bytes().to_vec();
        wire.extend_from_slice(b"ping");
        let (accepted, mut client) = simulate_handoff(wire).await;

        node.dispatch(accepted).await;

        // Give the spawned actor a turn to run and write its reply.
        let mut got = Vec::new();
        loop {
            let buf = vec![0u8; 16];
            let compio::buf::BufResult(res, buf) = client.read(buf).await;
            let n = res.unwrap();
            if n == 0 {
                break;
            }
            got.extend_from_slice(&buf[..n]);
        }

        assert_eq!(got, b"pong");
        assert_eq!(received.borrow().as_deref(), Some(b"ping".as_slice()));
    }

    #[compio::test]
    async fn dispatch_to_unknown_actor_just_drops_the_connection() {
        let node = dummy_node("actor-test-unknown");

        let unused_id = ActorId(42);
        let mut wire = unused_id.to_be_bytes().to_vec();
        wire.extend_from_slice(b"hello");
        let (accepted, mut client) = simulate_handoff(wire).await;

        node.dispatch(accepted).await;

        let buf = vec![0u8; 16];
        let compio::buf::BufResult(res, _buf) = client.read(buf).await;
        assert_eq!(res.unwrap(), 0);
    }

    #[compio::test]
    async fn two_actors_on_one_node_do_not_cross_talk() {
        let node = dummy_node("two-actors");

        let a_seen: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
        let b_seen: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
        let a_seen_in = Rc::clone(&a_seen);
        let b_seen_in = Rc::clone(&b_seen);

        let actor_a = node.spawn(move |mailbox, _node| async move {
            if let Some(envelope) = mailbox.recv().await {
                *a_seen_in.borrow_mut() = Some(envelope.payload);
            }
        });
        let actor_b = node.spawn(move |mailbox, _node| async move {
            if let Some(envelope) = mailbox.recv().await {
                *b_seen_in.borrow_mut() = Some(envelope.payload);
            }
        });

        let mut wire_a = actor_a.to_be_bytes().to_vec();
        wire_a.extend_from_slice(b"for-a");
        let (accepted_a, _client_a) = simulate_handoff(wire_a).await;
        node.dispatch(accepted_a).await;

        let mut wire_b = actor_b.to_be_bytes().to_vec();
        wire_b.extend_from_slice(b"for-b");
        let (accepted_b, _client_b) = simulate_handoff(wire_b).await;
        node.dispatch(accepted_b).await;

        compio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(a_seen.borrow().as_deref(), Some(b"for-a".as_slice()));
        assert_eq!(b_seen.borrow().as_deref(), Some(b"for-b".as_slice()));
    }
}
