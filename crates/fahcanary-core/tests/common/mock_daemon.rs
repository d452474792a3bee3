//! Minimal stand-in for the FAHClient command server, for integration tests.
//!
//! Accepts connections on 127.0.0.1 in a background thread and behaves
//! according to `Behavior`. The server runs until the process exits.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fahcanary_core::greeting::GREETING;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Send the real banner immediately.
    Greet,
    /// Send these bytes instead of the banner.
    Send(Vec<u8>),
    /// Accept and hold the connection without writing anything.
    Silent,
}

/// Starts a server in a background thread. Returns its "host:port".
pub fn start(behavior: Behavior) -> String {
    start_watched(behavior).0
}

/// Like `start`, but for every connection reports whether the client closed
/// its end (EOF or reset) before the server gave up waiting.
pub fn start_watched(behavior: Behavior) -> (String, mpsc::Receiver<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let behavior = behavior.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let _ = tx.send(handle(stream, behavior));
            });
        }
    });
    (addr.to_string(), rx)
}

/// An address on which nothing is listening, so connects are refused.
pub fn refused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Returns true once the client has released the connection.
fn handle(mut stream: TcpStream, behavior: Behavior) -> bool {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    match behavior {
        Behavior::Greet => {
            let _ = stream.write_all(GREETING.as_bytes());
        }
        Behavior::Send(bytes) => {
            let _ = stream.write_all(&bytes);
        }
        Behavior::Silent => {}
    }
    // Keep the connection open until the client closes it, so the client
    // sees data (or silence), not EOF.
    let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                )
            }
        }
    }
}
