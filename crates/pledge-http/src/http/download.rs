//! Streaming, cancelable downloads.

use std::path::PathBuf;

use pledge::{Promise, QueueId};

use super::client::HttpClient;
use super::response::HttpResponse;
use super::transfer::{CancelableReader, TransferHandle, is_cancellation};
use crate::error::{HttpError, into_pledge};

/// Stream `url`'s response body to `dest`, returning a `Promise<HttpResponse>`
/// whose `downloaded_path()` is `Some(dest)`. Cancelling the chain aborts the
/// transfer between chunks rather than mid-chunk.
pub fn download(
    client: &HttpClient,
    queue: QueueId,
    timeout: Option<std::time::Duration>,
    retry: u32,
    url: impl Into<String>,
    dest: impl Into<PathBuf>,
) -> Promise<HttpResponse> {
    let url = url.into();
    let dest = dest.into();
    let client = client.clone();
    let scheduler = client.scheduler().clone();

    Promise::new_cancelable(scheduler, queue, timeout, retry, move |resolve, reject, slot| {
        let (handle, cancelled, paused) = TransferHandle::new();
        slot.set(std::sync::Arc::new(handle));

        match run_download(&client, &url, &dest, cancelled, paused) {
            Ok(response) => resolve(response),
            Err(err) => reject(err),
        }
    })
}

fn run_download(
    client: &HttpClient,
    url: &str,
    dest: &std::path::Path,
    cancelled: std::sync::Arc<std::sync::atomic::AtomicBool>,
    paused: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> pledge::Result<HttpResponse> {
    tracing::debug!(target: crate::logging::TARGET, url, dest = %dest.display(), "starting download");
    let response = client
        .reqwest_client()
        .get(url)
        .send()
        .map_err(|e| into_pledge(HttpError::from(e)))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let final_url = response.url().as_str().to_string();

    let mut reader = CancelableReader::new(response, cancelled, paused);
    let mut file = std::fs::File::create(dest).map_err(|e| into_pledge(HttpError::from(e)))?;

    match std::io::copy(&mut reader, &mut file) {
        Ok(bytes) => {
            tracing::debug!(target: crate::logging::TARGET, bytes, "download complete");
            Ok(HttpResponse::for_download(status, headers, final_url, dest.to_path_buf()))
        }
        Err(err) if is_cancellation(&err) => {
            tracing::debug!(target: crate::logging::TARGET, "download cancelled");
            Err(pledge::Error::Cancelled)
        }
        Err(err) => Err(into_pledge(HttpError::from(err))),
    }
}
