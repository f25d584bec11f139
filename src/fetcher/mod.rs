pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::PictureOfDay;

pub use http_fetcher::HttpFeedClient;

/// Remote NeoWs/APOD source. Implementations do not retry.
#[async_trait]
pub trait RemoteFeedClient {
    /// Raw feed JSON for the inclusive `[start_date, end_date]` range.
    async fn fetch_objects(&self, start_date: &str, end_date: &str, api_key: &str)
        -> Result<String>;

    async fn fetch_featured_image(&self, api_key: &str) -> Result<PictureOfDay>;
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::RemoteFeedClient;
    use crate::app::{RadarError, Result};
    use crate::domain::PictureOfDay;

    /// Scripted client: each call pops the next queued response.
    #[derive(Default)]
    pub struct StubClient {
        feeds: Mutex<VecDeque<Result<String>>>,
        pictures: Mutex<VecDeque<Result<PictureOfDay>>>,
        pub feed_calls: AtomicUsize,
        pub delay: Option<Duration>,
    }

    impl StubClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn push_feed(&self, body: &str) {
            self.feeds.lock().unwrap().push_back(Ok(body.to_string()));
        }

        pub fn push_feed_error(&self, message: &str) {
            self.feeds
                .lock()
                .unwrap()
                .push_back(Err(RadarError::Other(message.to_string())));
        }

        pub fn push_picture(&self, picture: PictureOfDay) {
            self.pictures.lock().unwrap().push_back(Ok(picture));
        }

        pub fn push_picture_error(&self, message: &str) {
            self.pictures
                .lock()
                .unwrap()
                .push_back(Err(RadarError::Other(message.to_string())));
        }

        pub fn feed_calls(&self) -> usize {
            self.feed_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteFeedClient for StubClient {
        async fn fetch_objects(&self, _start: &str, _end: &str, _key: &str) -> Result<String> {
            self.feed_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.feeds
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RadarError::Other("no scripted feed".into())))
        }

        async fn fetch_featured_image(&self, _key: &str) -> Result<PictureOfDay> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pictures
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RadarError::Other("no scripted picture".into())))
        }
    }
}

/// Minimal HTTP listener on localhost for exercising the real client.
#[cfg(test)]
pub(crate) mod local_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    pub enum Reply {
        Status(u16, &'static str),
        Body(&'static str),
        /// Read the request, then hang up without answering.
        Hangup,
    }

    /// Serve `reply` to every connection. Returns the base URL.
    pub async fn serve(reply: Reply) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let reply = std::sync::Arc::new(reply);
            while let Ok((socket, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move { answer(socket, &reply).await });
            }
        });

        format!("http://{addr}/")
    }

    /// A base URL nothing listens on.
    pub async fn refused() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/")
    }

    async fn answer(mut socket: TcpStream, reply: &Reply) {
        let mut request: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let response = match reply {
            Reply::Status(code, reason) => format!(
                "HTTP/1.1 {code} {reason}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            ),
            Reply::Body(body) => format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            ),
            Reply::Hangup => return,
        };
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }
}
