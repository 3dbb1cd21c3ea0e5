use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::protocol::{parse_frame, write_frame, Request, Response};
use crate::choice::Choice;
use crate::client::SnapshotStream;
use crate::error::{Error, ErrorKind, Result};
use crate::service::VoteApi;
use crate::snapshot::VoteCounts;

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Connection {
    async fn open(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read).lines(),
            write,
        })
    }

    async fn send(&mut self, request: &Request) -> Result<()> {
        write_frame(&mut self.write, request).await
    }

    async fn recv(&mut self) -> Result<Option<Response>> {
        match self.lines.next_line().await? {
            Some(line) => Ok(Some(parse_frame(&line)?)),
            None => Ok(None),
        }
    }

    async fn call(&mut self, request: &Request) -> Result<Response> {
        self.send(request).await?;
        match self.recv().await? {
            Some(response) => response.into_result(),
            None => Err(closed()),
        }
    }
}

fn closed() -> Error {
    Error::Io(std::io::ErrorKind::UnexpectedEof.into())
}

fn unexpected(response: Response) -> Error {
    Error::Remote {
        kind: ErrorKind::Internal,
        message: format!("unexpected response {response:?}"),
    }
}

/// [`VoteApi`] over TCP.
///
/// Requests share one connection, opened lazily and reopened on the next
/// call after a transport error.
///
/// # Examples
///
/// ```rust,no_run
/// use scrutinio::net::RemoteVoteApi;
/// use scrutinio::{Choice, VoteApi};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let api = RemoteVoteApi::new("127.0.0.1:7878".parse().unwrap());
/// api.cast_vote(Choice::Cat).await.unwrap();
/// println!("{}", api.vote_counts().await.unwrap());
/// # });
/// ```
pub struct RemoteVoteApi {
    addr: SocketAddr,
    conn: Mutex<Option<Connection>>,
}

impl RemoteVoteApi {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            conn: Mutex::new(None),
        }
    }

    /// The server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// One request/response exchange.
    ///
    /// The connection is taken out of the slot for the round trip and only
    /// put back once `expect` accepts the reply. A call dropped mid-flight
    /// or answered out of step leaves the slot empty; the next call
    /// reconnects.
    async fn call<T>(
        &self,
        request: Request,
        expect: impl FnOnce(Response) -> std::result::Result<T, Response>,
    ) -> Result<T> {
        let mut guard = self.conn.lock().await;
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => Connection::open(self.addr).await?,
        };
        match conn.call(&request).await {
            Ok(response) => match expect(response) {
                Ok(value) => {
                    *guard = Some(conn);
                    Ok(value)
                }
                Err(other) => {
                    tracing::debug!(
                        addr = %self.addr,
                        "dropping connection after unexpected response"
                    );
                    Err(unexpected(other))
                }
            },
            Err(err @ (Error::Io(_) | Error::Protocol(_))) => {
                tracing::debug!(addr = %self.addr, "dropping connection after transport error");
                Err(err)
            }
            Err(err) => {
                *guard = Some(conn);
                Err(err)
            }
        }
    }

    /// Opens a dedicated connection streaming live totals.
    ///
    /// The first snapshot is the server's current value.
    pub async fn subscribe(&self) -> Result<RemoteSubscription> {
        let mut conn = Connection::open(self.addr).await?;
        conn.send(&Request::Subscribe).await?;
        Ok(RemoteSubscription { conn })
    }
}

impl std::fmt::Debug for RemoteVoteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteVoteApi")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VoteApi for RemoteVoteApi {
    async fn cast_vote(&self, choice: Choice) -> Result<()> {
        let request = Request::CastVote {
            choice: choice.to_string(),
        };
        self.call(request, |response| match response {
            Response::Ok => Ok(()),
            other => Err(other),
        })
        .await
    }

    async fn vote_counts(&self) -> Result<VoteCounts> {
        self.call(Request::GetVoteCounts, |response| match response {
            Response::Counts { counts } => Ok(counts),
            other => Err(other),
        })
        .await
    }
}

/// Live totals pushed by a remote server.
pub struct RemoteSubscription {
    conn: Connection,
}

impl RemoteSubscription {
    /// Waits for the next pushed snapshot.
    ///
    /// Returns `Ok(None)` when the server closes the stream.
    pub async fn next(&mut self) -> Result<Option<VoteCounts>> {
        match self.conn.recv().await? {
            Some(Response::Counts { counts }) => Ok(Some(counts)),
            Some(other) => other.into_result().and_then(|r| Err(unexpected(r))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStream for RemoteSubscription {
    async fn next_snapshot(&mut self) -> Option<VoteCounts> {
        match self.next().await {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(error = %err, "live stream failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for RemoteSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSubscription").finish_non_exhaustive()
    }
}
