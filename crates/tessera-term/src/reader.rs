// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Background input reader. Collects raw bytes from the terminal.
//
// `read()` on stdin blocks, but the driver must be able to wait for a query
// reply with a deadline and to keep rendering between keystrokes. A
// dedicated thread does the blocking read and ships byte chunks through a
// channel; the driver uses `recv_timeout` on the other end.
//
// On unix the thread polls stdin with a short timeout and checks an atomic
// stop flag between polls, so it never gets stuck in `read()` at shutdown.
// Any other `Read` source (tests, pipes) is read in a plain blocking loop.

#[cfg(unix)]
use std::io;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Chunk size: a keypress is a handful of bytes, a paste can be kilobytes.
const READ_BUF_SIZE: usize = 4096;

/// Stop-flag check interval for the stdin poll loop.
#[cfg(unix)]
const POLL_TIMEOUT_MS: i32 = 50;

/// Background reader thread.
///
/// ```no_run
/// use tessera_term::reader::InputReader;
///
/// let (reader, rx) = InputReader::stdin()?;
/// while let Ok(bytes) = rx.recv() {
///     eprintln!("got {} bytes", bytes.len());
/// }
/// drop(reader);
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct InputReader {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl InputReader {
    /// Spawn a thread reading the process's stdin.
    ///
    /// # Errors
    ///
    /// Fails only if the OS refuses to spawn a thread.
    pub fn stdin() -> std::io::Result<(Self, Receiver<Vec<u8>>)> {
        Self::spawn_with(stdin_loop)
    }

    /// Spawn a thread reading any blocking source until EOF.
    ///
    /// # Errors
    ///
    /// Fails only if the OS refuses to spawn a thread.
    pub fn from_reader<R>(source: R) -> std::io::Result<(Self, Receiver<Vec<u8>>)>
    where
        R: Read + Send + 'static,
    {
        Self::spawn_with(move |tx, stop| read_loop(source, &tx, &stop))
    }

    fn spawn_with<F>(body: F) -> std::io::Result<(Self, Receiver<Vec<u8>>)>
    where
        F: FnOnce(Sender<Vec<u8>>, Arc<AtomicBool>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("tessera-input".into())
            .spawn(move || body(tx, stop_flag))?;

        Ok((
            Self {
                handle: Some(handle),
                stop,
            },
            rx,
        ))
    }

    /// Signal the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop<R: Read>(mut source: R, tx: &Sender<Vec<u8>>, stop: &AtomicBool) {
    let mut buf = [0u8; READ_BUF_SIZE];
    while !stop.load(Ordering::Relaxed) {
        match source.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
#[allow(clippy::needless_pass_by_value)]
fn stdin_loop(tx: Sender<Vec<u8>>, stop: Arc<AtomicBool>) {
    use std::os::unix::io::AsRawFd;

    let stdin_fd = io::stdin().as_raw_fd();
    let mut buf = [0u8; READ_BUF_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let ready = unsafe {
            let mut pfd = libc::pollfd {
                fd: stdin_fd,
                events: libc::POLLIN,
                revents: 0,
            };
            libc::poll(&raw mut pfd, 1, POLL_TIMEOUT_MS)
        };

        if ready <= 0 {
            continue;
        }

        let n = unsafe { libc::read(stdin_fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n <= 0 {
            break;
        }

        #[allow(clippy::cast_sign_loss)] // n > 0
        let chunk = buf[..n as usize].to_vec();
        if tx.send(chunk).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
#[allow(clippy::needless_pass_by_value)]
fn stdin_loop(tx: Sender<Vec<u8>>, stop: Arc<AtomicBool>) {
    read_loop(std::io::stdin().lock(), &tx, &stop);
}

// ─── Tests ───────────────────────────────────────────────────────────────────
