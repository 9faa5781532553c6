//! A deliberately slow HTTP/1.1 server.
//!
//! Every GET is answered right away with status and headers,
//! while the 20 byte body trickles in over one second.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use crate::ConnectionCounter;

const LINES: usize = 10;
const TICK: Duration = Duration::from_millis(100);
const HEADERS: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 20\r\n\r\n";
const NOT_ALLOWED: &[u8] = b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n";

/// The body every GET request receives: the digits 0 to 9, one per line
#[must_use]
pub fn slow_body() -> String {
    (0..LINES).map(|i| format!("{i}\n")).collect()
}

type Callback = Box<dyn Fn() + Send + Sync>;

struct Callbacks {
    on_start: Callback,
    on_stop: Callback,
}

/// A server that takes one second to send each response body.
///
/// Stops serving when dropped.
#[derive(Debug)]
pub struct SlowServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl SlowServer {
    /// Start a server on a free local port, counting the responses
    /// it is sending in `counter`.
    ///
    /// # Errors
    ///
    /// Fails if no local port can be bound.
    pub async fn start(counter: &ConnectionCounter) -> io::Result<Self> {
        let (start, stop) = (counter.clone(), counter.clone());
        Self::with_callbacks(move || start.increment(), move || stop.decrement()).await
    }

    /// Start a server on a free local port.
    ///
    /// `on_start` runs once the headers of a GET response are sent,
    /// `on_stop` once its body is sent or the client went away.
    ///
    /// # Errors
    ///
    /// Fails if no local port can be bound.
    pub async fn with_callbacks<S, E>(on_start: S, on_stop: E) -> io::Result<Self>
    where
        S: Fn() + Send + Sync + 'static,
        E: Fn() + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let callbacks = Arc::new(Callbacks {
            on_start: Box::new(on_start),
            on_stop: Box::new(on_stop),
        });

        let task = tokio::spawn(async move {
            // Dropping the set aborts the connections along with the server
            let mut connections = JoinSet::new();
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                        continue;
                    }
                };
                while connections.try_join_next().is_some() {}

                let callbacks = callbacks.clone();
                connections.spawn(async move {
                    if let Err(e) = serve(stream, &callbacks).await {
                        debug!("Connection from {peer} ended: {e}");
                    }
                });
            }
        });

        debug!("Slow server listening on {addr}");
        Ok(Self { addr, task })
    }

    /// The address the server listens on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL of the server root
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for SlowServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answer requests on one connection until the client closes it
async fn serve(stream: TcpStream, callbacks: &Callbacks) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(method) = read_request(&mut reader).await? {
        match method.as_str() {
            "HEAD" => writer.write_all(HEADERS).await?,
            "GET" => {
                writer.write_all(HEADERS).await?;
                writer.flush().await?;
                (callbacks.on_start)();
                let sent = trickle(&mut writer).await;
                (callbacks.on_stop)();
                sent?;
            }
            _ => writer.write_all(NOT_ALLOWED).await?,
        }
        writer.flush().await?;
    }
    Ok(())
}

async fn trickle<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    for i in 0..LINES {
        tokio::time::sleep(TICK).await;
        writer.write_all(format!("{i}\n").as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Read one request head and return its method, `None` once the client
/// closed the connection
async fn read_request<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let method = line.split_whitespace().next().unwrap_or_default().to_string();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line.trim_end().is_empty() {
            break;
        }
    }
    Ok(Some(method))
}
