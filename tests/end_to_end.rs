use std::sync::Arc;
use std::time::Duration;

use scrutinio::client::VoteClient;
use scrutinio::net::protocol::{parse_frame, Response};
use scrutinio::net::{RemoteVoteApi, Server};
use scrutinio::store::{FaultyStore, MemoryStore};
use scrutinio::{Choice, ErrorKind, ServiceConfig, VoteApi, VoteCounts, VoteService};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn serve(service: Arc<VoteService>) -> std::net::SocketAddr {
    let server = Server::bind("127.0.0.1:0", service).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_remote_voters() {
    let service = Arc::new(VoteService::in_memory());
    let addr = serve(Arc::clone(&service)).await;

    let mut handles = vec![];
    for i in 0..30 {
        handles.push(tokio::spawn(async move {
            let api = RemoteVoteApi::new(addr);
            api.cast_vote(Choice::ALL[i % 3]).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let api = RemoteVoteApi::new(addr);
    assert_eq!(api.vote_counts().await.unwrap(), VoteCounts::new(10, 10, 10));
}

async fn exchange(
    write: &mut OwnedWriteHalf,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    request: &str,
) -> Response {
    write.write_all(request.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();
    next_frame(lines).await
}

async fn next_frame(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Response {
    let line = timeout(WAIT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    parse_frame::<Response>(&line).unwrap()
}

#[tokio::test]
async fn test_raw_protocol_session() {
    let service = Arc::new(VoteService::in_memory());
    let addr = serve(service).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    let response = exchange(&mut write, &mut lines, r#"{"op":"cast_vote","choice":"cat"}"#).await;
    assert_eq!(response, Response::Ok);

    match exchange(&mut write, &mut lines, r#"{"op":"cast_vote","choice":"parrot"}"#).await {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::Validation),
        other => panic!("expected validation error, got {other:?}"),
    }
    match exchange(&mut write, &mut lines, r#"{"op":"tally"}"#).await {
        Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::BadRequest),
        other => panic!("expected bad_request, got {other:?}"),
    }

    let expected = Response::Counts {
        counts: VoteCounts::new(1, 0, 0),
    };
    let response = exchange(&mut write, &mut lines, r#"{"op":"get_vote_counts"}"#).await;
    assert_eq!(response, expected);

    // The push stream starts from whatever was last published and
    // catches up with the vote above.
    let mut frame = exchange(&mut write, &mut lines, r#"{"op":"subscribe"}"#).await;
    while frame != expected {
        assert!(matches!(frame, Response::Counts { .. }));
        frame = next_frame(&mut lines).await;
    }
}

#[tokio::test]
async fn test_remote_unavailable_rolls_back() {
    let store = Arc::new(FaultyStore::new(MemoryStore::new()));
    let service = Arc::new(VoteService::new(&ServiceConfig::default(), store.clone()).unwrap());
    let addr = serve(service).await;

    let client = VoteClient::new(Arc::new(RemoteVoteApi::new(addr)));
    client.refresh().await.unwrap();

    store.fail_writes();
    let call = client.vote(Choice::Cat);
    assert_eq!(client.displayed(), Some(VoteCounts::new(1, 0, 0)));
    let err = call.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(client.displayed(), Some(VoteCounts::default()));

    store.fail_reads();
    let err = client.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialRead);
    assert!(client.is_stale());
}

#[tokio::test]
async fn test_optimistic_client_over_tcp() {
    let service = Arc::new(VoteService::in_memory());
    for _ in 0..3 {
        service.cast_vote("cat").await.unwrap();
    }
    for _ in 0..5 {
        service.cast_vote("dog").await.unwrap();
    }
    let addr = serve(Arc::clone(&service)).await;

    let api = Arc::new(RemoteVoteApi::new(addr));
    let client = VoteClient::new(Arc::clone(&api));
    assert_eq!(client.refresh().await.unwrap(), VoteCounts::new(3, 5, 0));

    let call = client.vote(Choice::Dog);
    assert_eq!(client.displayed(), Some(VoteCounts::new(3, 6, 0)));
    call.await.unwrap().unwrap();

    // A vote from somebody else, then the push stream catches the client up.
    service.cast_vote("goldfish").await.unwrap();
    let follower = client.follow(api.subscribe().await.unwrap());

    timeout(WAIT, async {
        while client.displayed() != Some(VoteCounts::new(3, 6, 1)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client never saw the final totals");
    assert_eq!(client.total_votes(false), Some(9));
    follower.abort();
}
