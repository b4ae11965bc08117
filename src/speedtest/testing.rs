use super::transport::{ChunkStream, Transport};
use crate::error::{Result, SpeedError};
use futures::{stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Reply to a probe or upload call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reply {
    Ok(Duration),
    Fail(Duration),
    Hang,
}

/// Reply to a download call.
#[derive(Debug, Clone)]
pub(crate) enum DownloadReply {
    /// Each chunk arrives after its delay.
    Chunks(Vec<(Duration, usize)>),
    /// Delivers the chunks, then the connection breaks.
    Truncated(Vec<(Duration, usize)>),
    Status(u16),
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Probe(String),
    Download(u64),
    Upload(usize),
}

/// In-memory transport replaying scripted replies. Unscripted calls fail at once.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    probes: HashMap<String, Reply>,
    downloads: Mutex<VecDeque<DownloadReply>>,
    uploads: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_probe(mut self, url: &str, reply: Reply) -> Self {
        self.probes.insert(url.to_string(), reply);
        self
    }

    pub(crate) fn with_download(self, reply: DownloadReply) -> Self {
        self.downloads.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn with_upload(self, reply: Reply) -> Self {
        self.uploads.lock().unwrap().push_back(reply);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

async fn replay(reply: Reply) -> Result<()> {
    match reply {
        Reply::Ok(delay) => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
        Reply::Fail(delay) => {
            tokio::time::sleep(delay).await;
            Err(SpeedError::Io(std::io::Error::other("connection refused")))
        }
        Reply::Hang => futures::future::pending().await,
    }
}

fn chunk_stream(chunks: Vec<(Duration, usize)>) -> impl futures::Stream<Item = Result<usize>> {
    stream::iter(chunks).then(|(delay, len)| async move {
        tokio::time::sleep(delay).await;
        Ok(len)
    })
}

impl Transport for ScriptedTransport {
    async fn probe(&self, url: &str) -> Result<()> {
        self.record(Call::Probe(url.to_string()));
        let reply = self.probes.get(url).copied().unwrap_or(Reply::Fail(Duration::ZERO));
        replay(reply).await
    }

    async fn download(&self, bytes: u64) -> Result<ChunkStream> {
        self.record(Call::Download(bytes));
        let reply = self.downloads.lock().unwrap().pop_front();
        match reply {
            Some(DownloadReply::Chunks(chunks)) => Ok(chunk_stream(chunks).boxed()),
            Some(DownloadReply::Truncated(chunks)) => {
                let reset = stream::once(async {
                    Err(SpeedError::Io(std::io::Error::other("connection reset")))
                });
                Ok(chunk_stream(chunks).chain(reset).boxed())
            }
            Some(DownloadReply::Status(code)) => Err(SpeedError::Status(code)),
            Some(DownloadReply::Hang) => futures::future::pending().await,
            None => Err(SpeedError::Io(std::io::Error::other("connection refused"))),
        }
    }

    async fn upload(&self, payload: Vec<u8>) -> Result<()> {
        self.record(Call::Upload(payload.len()));
        let reply = self.uploads.lock().unwrap().pop_front();
        replay(reply.unwrap_or(Reply::Fail(Duration::ZERO))).await
    }
}
