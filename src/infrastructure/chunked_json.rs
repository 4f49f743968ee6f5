// Chunked newline-delimited JSON streaming
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;

/// Stream each item as one JSON line.
pub fn chunked_json_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize,
{
    let byte_stream = stream.map(|item| serialize_line(&item));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn serialize_line<T: Serialize>(item: &T) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(item).map_err(std::io::Error::other)?;
    let mut chunk = BytesMut::with_capacity(json.len() + 1);
    chunk.put_slice(&json);
    chunk.put_u8(b'\n');
    Ok(chunk.freeze())
}

/// Forward watch updates until `done` says the stream is finished; the final value
/// is always sent.
pub fn stream_from_watch<T, F>(
    mut rx: tokio::sync::watch::Receiver<T>,
    done: F,
) -> impl IntoResponse
where
    T: Clone + Serialize + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    let stream = async_stream::stream! {
        loop {
            let current = rx.borrow_and_update().clone();
            let finished = done(&current);
            yield current;
            if finished || rx.changed().await.is_err() {
                break;
            }
        }
    };

    match chunked_json_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
