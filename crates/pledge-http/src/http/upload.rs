//! Streaming, cancelable file uploads.

use std::error::Error as _;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use pledge::{Promise, QueueId};

use super::client::HttpClient;
use super::response::HttpResponse;
use super::transfer::{CancelableReader, TransferHandle, is_cancellation};
use crate::error::{HttpError, into_pledge};

/// Stream `file_path`'s contents as the body of a `POST url`, returning a
/// `Promise<HttpResponse>`. Cancelling the chain aborts the upload between
/// chunks read from disk.
pub fn upload(
    client: &HttpClient,
    queue: QueueId,
    timeout: Option<std::time::Duration>,
    retry: u32,
    url: impl Into<String>,
    file_path: impl AsRef<Path>,
) -> Promise<HttpResponse> {
    let url = url.into();
    let file_path = file_path.as_ref().to_path_buf();
    let client = client.clone();
    let scheduler = client.scheduler().clone();

    Promise::new_cancelable(scheduler, queue, timeout, retry, move |resolve, reject, slot| {
        let (handle, cancelled, paused) = TransferHandle::new();
        slot.set(Arc::new(handle));

        match run_upload(&client, &url, &file_path, cancelled, paused) {
            Ok(response) => resolve(response),
            Err(err) => reject(err),
        }
    })
}

fn run_upload(
    client: &HttpClient,
    url: &str,
    file_path: &Path,
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
) -> pledge::Result<HttpResponse> {
    let file = std::fs::File::open(file_path).map_err(|e| into_pledge(HttpError::from(e)))?;
    let len = file.metadata().ok().map(|m| m.len());
    let reader = CancelableReader::new(file, cancelled, paused);

    let mut req = client.reqwest_client().post(url);
    if let Some(len) = len {
        req = req.header(reqwest::header::CONTENT_LENGTH, len);
    }
    req = req.body(reqwest::blocking::Body::new(reader));

    match req.send() {
        Ok(response) => HttpResponse::from_reqwest(response),
        Err(err) if err.is_body() && err.source().is_some_and(|s| downcast_cancel(s)) => {
            Err(pledge::Error::Cancelled)
        }
        Err(err) => Err(into_pledge(HttpError::from(err))),
    }
}

fn downcast_cancel(err: &(dyn std::error::Error + 'static)) -> bool {
    err.downcast_ref::<std::io::Error>().is_some_and(is_cancellation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge::ThreadPoolScheduler;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn one_shot_accepting_server() -> (String, std::sync::mpsc::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                // The request (headers + small body) arrives in one read;
                // respond immediately rather than waiting for EOF, since
                // the client keeps the connection open for the response.
                let mut chunk = [0u8; 4096];
                let n = stream.read(&mut chunk).unwrap_or(0);
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = tx.send(chunk[..n].to_vec());
            }
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn upload_streams_file_contents() {
        let scheduler = ThreadPoolScheduler::new();
        let client = HttpClient::new(scheduler);
        let (url, _received) = one_shot_accepting_server();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"payload bytes").unwrap();

        let response = upload(&client, QueueId::Background, None, 0, url, &path).await_result();
        assert!(response.is_ok());
    }
}
