//! Newline-delimited JSON frames.
//!
//! Every frame is one JSON object followed by `\n`. Requests are tagged by
//! `"op"`, responses by `"type"`:
//!
//! ```text
//! → {"op":"cast_vote","choice":"cat"}
//! ← {"type":"ok"}
//! → {"op":"get_vote_counts"}
//! ← {"type":"counts","counts":{"cat":1,"dog":0,"goldfish":0}}
//! → {"op":"cast_vote","choice":"parrot"}
//! ← {"type":"error","kind":"validation","message":"unknown choice `parrot`"}
//! ```

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, ErrorKind, Result};
use crate::snapshot::VoteCounts;

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Record one vote. The choice is validated by the server, so an
    /// unknown name gets a `validation` error rather than `bad_request`.
    CastVote { choice: String },
    /// Read the current totals.
    GetVoteCounts,
    /// Turn the connection into a push stream of totals.
    Subscribe,
}

/// A server response or push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Counts { counts: VoteCounts },
    Error { kind: ErrorKind, message: String },
}

impl Response {
    /// Error frame for `err`.
    pub fn error(err: &Error) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Turns an `error` frame into [`Error::Remote`].
    pub fn into_result(self) -> Result<Self> {
        match self {
            Response::Error { kind, message } => Err(Error::Remote { kind, message }),
            other => Ok(other),
        }
    }
}

impl From<Result<()>> for Response {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(err) => Response::error(&err),
        }
    }
}

impl From<Result<VoteCounts>> for Response {
    fn from(result: Result<VoteCounts>) -> Self {
        match result {
            Ok(counts) => Response::Counts { counts },
            Err(err) => Response::error(&err),
        }
    }
}

/// Serializes `frame` and writes it followed by a newline.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(frame)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Parses one line (without its newline).
pub fn parse_frame<T>(line: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(serde_json::from_str(line.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&Request::CastVote {
            choice: "cat".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"op":"cast_vote","choice":"cat"}"#);

        assert_eq!(
            serde_json::to_string(&Request::GetVoteCounts).unwrap(),
            r#"{"op":"get_vote_counts"}"#
        );
        assert_eq!(
            parse_frame::<Request>(r#"{"op":"subscribe"}"#).unwrap(),
            Request::Subscribe
        );
    }

    #[test]
    fn test_response_wire_format() {
        assert_eq!(serde_json::to_string(&Response::Ok).unwrap(), r#"{"type":"ok"}"#);

        let counts = Response::Counts {
            counts: VoteCounts::new(1, 0, 0),
        };
        assert_eq!(
            serde_json::to_string(&counts).unwrap(),
            r#"{"type":"counts","counts":{"cat":1,"dog":0,"goldfish":0}}"#
        );

        let err = Response::error(&Error::Validation {
            choice: "parrot".into(),
        });
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"type":"error","kind":"validation","message":"unknown choice `parrot`"}"#
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            parse_frame::<Request>("not json"),
            Err(Error::Protocol(_))
        ));
        assert!(parse_frame::<Request>(r#"{"op":"reset"}"#).is_err());
        assert!(parse_frame::<Request>(r#"{"op":"cast_vote"}"#).is_err());
    }

    #[test]
    fn test_error_frame_into_result() {
        let frame = Response::Error {
            kind: ErrorKind::Unavailable,
            message: "shard cats[2] unavailable".into(),
        };
        let err = frame.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_transient());

        assert_eq!(Response::Ok.into_result().unwrap(), Response::Ok);
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Response::Ok).await.unwrap();
        assert_eq!(buf, b"{\"type\":\"ok\"}\n");
    }
}
