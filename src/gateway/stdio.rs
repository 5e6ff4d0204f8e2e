//! Direct-pipe mode: newline-delimited JSON-RPC over a reader/writer pair.
//!
//! One implicit session with no id and no expiry. Every line is dispatched
//! as soon as it is read; EOF closes the handler. A line that is not valid
//! UTF-8 or exceeds the size cap is answered with an error and skipped.

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::gateway::dispatch::dispatch;
use crate::protocol::handler::SessionHandler;
use crate::protocol::jsonrpc::{parse_message, JsonRpcErrorObject, JsonRpcResponse, INVALID_REQUEST};

/// Outcome of reading one newline-terminated frame.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line,
    TooLong,
    Eof,
}

/// Serve one session until the reader hits EOF.
///
/// Lines longer than `max_line` bytes are discarded without being buffered.
pub async fn run_stdio<R, W>(
    mut reader: R,
    mut writer: W,
    handler: Arc<dyn SessionHandler>,
    max_line: usize,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!(max_line, "Direct-pipe session started");
    let result = serve(&mut reader, &mut writer, handler.as_ref(), max_line).await;

    if let Err(e) = handler.close() {
        tracing::warn!(error = %e, "Session teardown failed");
    }
    tracing::info!("Direct-pipe session closed");
    result
}

async fn serve<R, W>(reader: &mut R, writer: &mut W, handler: &dyn SessionHandler, max_line: usize) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let response = match read_frame(reader, &mut buf, max_line).await? {
            Frame::Eof => return Ok(()),
            Frame::TooLong => {
                tracing::warn!(max_line, "Rejected oversized message");
                Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcErrorObject::new(INVALID_REQUEST, format!("Message exceeds {max_line} bytes")),
                ))
            }
            Frame::Line => {
                let line = buf.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                match parse_message(line) {
                    Ok(request) => dispatch(handler, &request, "stdio").await,
                    Err(error) => {
                        tracing::debug!(code = error.code, "Rejected malformed message");
                        Some(JsonRpcResponse::failure(None, error))
                    }
                }
            }
        };

        if let Some(response) = response {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }
}

/// Read up to the next newline into `buf`, keeping at most `max` bytes.
///
/// An overlong line is drained through its newline and reported as
/// `Frame::TooLong`. A final line without a newline still counts.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overflow = false;
    let mut seen = false;
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (overflow, seen) {
                    (true, _) => Frame::TooLong,
                    (false, true) => Frame::Line,
                    (false, false) => Frame::Eof,
                });
            }
            seen = true;
            let (chunk, used, done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            if !overflow {
                if buf.len() + chunk.len() > max {
                    overflow = true;
                    buf.clear();
                } else {
                    buf.extend_from_slice(chunk);
                }
            }
            (used, done)
        };
        reader.consume(used);
        if done {
            return Ok(if overflow { Frame::TooLong } else { Frame::Line });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handler::testing::RecordingHandler;
    use crate::protocol::jsonrpc::PARSE_ERROR;
    use serde_json::Value;
    use std::io::Cursor;

    const MAX_LINE: usize = 1024;

    async fn run_bytes(input: &[u8], max_line: usize) -> (Vec<Value>, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let mut output = Vec::new();
        run_stdio(Cursor::new(input.to_vec()), &mut output, handler.clone(), max_line)
            .await
            .unwrap();
        let responses = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (responses, handler)
    }

    async fn run(input: &str) -> (Vec<Value>, Arc<RecordingHandler>) {
        run_bytes(input.as_bytes(), MAX_LINE).await
    }

    #[tokio::test]
    async fn answers_each_request_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"n":1}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"echo","params":{"n":2}}"#, "\n",
        );
        let (responses, handler) = run(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["n"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(handler.close_calls(), 1);
    }

    #[tokio::test]
    async fn malformed_lines_get_error_with_null_id() {
        let input = "not json\n[1,2]\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"echo\"}\n";
        let (responses, _) = run(input).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["error"]["code"], INVALID_REQUEST);
        assert_eq!(responses[2]["id"], 3);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_session() {
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"echo"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"echo"}"#);
        input.push(b'\n');

        let (responses, handler) = run_bytes(&input, MAX_LINE).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[1]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[2]["id"], 2);
        assert_eq!(handler.close_calls(), 1);
    }

    #[tokio::test]
    async fn oversized_line_is_rejected_and_skipped() {
        let long = format!(r#"{{"jsonrpc":"2.0","id":1,"method":"echo","params":{{"pad":"{}"}}}}"#, "x".repeat(200));
        let input = format!("{long}\n{{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"echo\"}}\n");

        let (responses, _) = run_bytes(input.as_bytes(), 64).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], INVALID_REQUEST);
        assert_eq!(responses[1]["id"], 2);
    }

    #[tokio::test]
    async fn last_line_without_newline_is_served() {
        let (responses, _) = run(r#"{"jsonrpc":"2.0","id":7,"method":"echo"}"#).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
    }

    #[tokio::test]
    async fn eof_closes_handler() {
        let (responses, handler) = run("").await;
        assert!(responses.is_empty());
        assert_eq!(handler.close_calls(), 1);
    }
}
