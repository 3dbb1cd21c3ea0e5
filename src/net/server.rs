use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use super::protocol::{parse_frame, write_frame, Request, Response};
use crate::error::{Error, Result};
use crate::service::VoteService;

/// TCP front-end for a [`VoteService`].
///
/// Each connection is served by its own task. Requests on one connection
/// are answered in order.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    service: Arc<VoteService>,
}

impl Server {
    /// Binds to `addr`. Port `0` picks a free port.
    pub async fn bind(addr: impl ToSocketAddrs, service: Arc<VoteService>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, service })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running until their peer closes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(%addr, "shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let service = Arc::clone(&self.service);
                    tokio::spawn(async move {
                        tracing::debug!(%peer, "connection opened");
                        match handle_connection(stream, service).await {
                            Ok(()) => tracing::debug!(%peer, "connection closed"),
                            Err(err) => tracing::debug!(%peer, error = %err, "connection dropped"),
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<VoteService>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match parse_frame::<Request>(&line) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "bad request");
                write_frame(&mut write, &Response::error(&err)).await?;
                continue;
            }
        };
        let response: Response = match request {
            Request::CastVote { choice } => service.cast_vote(&choice).await.into(),
            Request::GetVoteCounts => service.vote_counts().await.into(),
            Request::Subscribe => return push_totals(&service, lines, write).await,
        };
        write_frame(&mut write, &response).await?;
    }
    Ok(())
}

/// Streams live totals until either side goes away. Further input from the
/// client is ignored.
async fn push_totals<R>(
    service: &VoteService,
    mut lines: tokio::io::Lines<R>,
    mut write: OwnedWriteHalf,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut sub = service.subscribe();
    let counts = sub.current();
    write_frame(&mut write, &Response::Counts { counts }).await?;

    loop {
        tokio::select! {
            next = sub.next() => match next {
                Some(counts) => write_frame(&mut write, &Response::Counts { counts }).await?,
                None => return Ok(()),
            },
            line = lines.next_line() => match line {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(err) => return Err(Error::Io(err)),
            },
        }
    }
}
