//! Test helpers for integration tests.
//!
//! Provides a scripted local HTTP server and feed fixtures.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// Local HTTP server answering each request with the next scripted reply.
///
/// The last reply repeats once the script runs out.
pub struct FeedServer {
    addr: SocketAddr,
    replies: Arc<Mutex<Vec<Reply>>>,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FeedServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let replies = Arc::new(Mutex::new(replies));
        let hits = Arc::new(AtomicUsize::new(0));

        let script = replies.clone();
        let counter = hits.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };

                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }

                let index = counter.fetch_add(1, Ordering::SeqCst);
                let reply = {
                    let script = script.lock().unwrap();
                    script[index.min(script.len() - 1)].clone()
                };

                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reason(reply.status),
                    reply.body.len(),
                    reply.body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            addr,
            replies,
            hits,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Replace the remaining script.
    pub fn set_replies(&self, replies: Vec<Reply>) {
        let served = self.hits();
        let mut script = self.replies.lock().unwrap();
        script.truncate(served);
        script.extend(replies);
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A YouTube channel feed with the given `(video_id, title, published)` entries.
pub fn youtube_feed(videos: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <title>Meowbah</title>
"#,
    );
    for (id, title, published) in videos {
        xml.push_str(&format!(
            r#" <entry>
  <id>yt:video:{id}</id>
  <yt:videoId>{id}</yt:videoId>
  <title>{title}</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v={id}"/>
  <published>{published}</published>
  <updated>{published}</updated>
  <media:group>
   <media:title>{title}</media:title>
   <media:thumbnail url="https://i4.ytimg.com/vi/{id}/hqdefault.jpg" width="480" height="360"/>
   <media:description>About {title}</media:description>
  </media:group>
 </entry>
"#
        ));
    }
    xml.push_str("</feed>\n");
    xml
}

/// An RSS 2.0 feed with the given `(guid, title, pubDate)` items.
pub fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Meowbah posts</title>
"#,
    );
    for (guid, title, pub_date) in items {
        xml.push_str(&format!(
            "<item><guid>{guid}</guid><title>{title}</title><link>https://example.com/p/{guid}</link><pubDate>{pub_date}</pubDate><description><![CDATA[<p>{title}</p>]]></description></item>\n"
        ));
    }
    xml.push_str("</channel></rss>\n");
    xml
}
