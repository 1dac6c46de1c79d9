//! Shared helpers for engine integration tests.
//!
//! `MemStream` is an in-memory, non-blocking duplex byte stream: reads
//! return `WouldBlock` when nothing is buffered and `Ok(0)` once the other
//! end is dropped or closed.

#![allow(dead_code)]

use keelson_core::options::SocketOptions;
use keelson_core::pipe::{self, InprocPipe};
use keelson_core::poller::Interest;
use keelson_zmtp::engine::ZmtpEngine;
use keelson_zmtp::session::PipeSession;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, IoSlice, Read, Write};
use std::rc::Rc;

#[derive(Debug, Default)]
struct Channel {
    buf: VecDeque<u8>,
    writer_closed: bool,
    reader_closed: bool,
}

#[derive(Debug)]
pub struct MemStream {
    rx: Rc<RefCell<Channel>>,
    tx: Rc<RefCell<Channel>>,
    write_limit: Option<usize>,
}

/// Two connected ends.
pub fn duplex() -> (MemStream, MemStream) {
    let a_to_b = Rc::new(RefCell::new(Channel::default()));
    let b_to_a = Rc::new(RefCell::new(Channel::default()));
    (
        MemStream {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
            write_limit: None,
        },
        MemStream {
            rx: a_to_b,
            tx: b_to_a,
            write_limit: None,
        },
    )
}

impl MemStream {
    /// Accept at most `n` bytes per write call.
    pub fn with_write_limit(mut self, n: usize) -> Self {
        self.write_limit = Some(n);
        self
    }

    /// Half-close: the peer reads EOF once it drained what was sent.
    pub fn close(&mut self) {
        self.tx.borrow_mut().writer_closed = true;
    }

    /// Bytes waiting to be read on this end.
    pub fn available(&self) -> usize {
        self.rx.borrow().buf.len()
    }

    /// Everything buffered for this end.
    pub fn drain(&mut self) -> Vec<u8> {
        self.rx.borrow_mut().buf.drain(..).collect()
    }

    /// Raw bytes towards the peer, bypassing the write limit.
    pub fn push(&mut self, bytes: &[u8]) {
        self.tx.borrow_mut().buf.extend(bytes.iter().copied());
    }
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut chan = self.rx.borrow_mut();
        if chan.buf.is_empty() {
            return if chan.writer_closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(chan.buf.len());
        for (dst, src) in buf.iter_mut().zip(chan.buf.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut chan = self.tx.borrow_mut();
        if chan.reader_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let mut budget = self.write_limit.unwrap_or(usize::MAX);
        if budget == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let mut written = 0;
        for buf in bufs {
            let n = buf.len().min(budget);
            chan.buf.extend(buf[..n].iter().copied());
            written += n;
            budget -= n;
            if budget == 0 {
                break;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemStream {
    fn drop(&mut self) {
        self.tx.borrow_mut().writer_closed = true;
        self.rx.borrow_mut().reader_closed = true;
    }
}

pub type TestEngine = ZmtpEngine<MemStream, Interest, PipeSession>;

/// An unplugged engine over `io` and the application end of its session
/// pipe.
pub fn engine(io: MemStream, options: SocketOptions) -> (TestEngine, PipeSession, InprocPipe) {
    let (session_end, app_end) = pipe::pair(options.hwm);
    let engine = ZmtpEngine::new(io, Interest::new(), options, "mem://test");
    (engine, PipeSession::new(session_end), app_end)
}

/// Deliver readiness events for a while, the way a poll loop would.
pub fn pump(engines: &mut [&mut TestEngine]) {
    for _ in 0..4096 {
        for engine in engines.iter_mut() {
            if engine.registrar().wants_write() {
                engine.out_event();
            }
            if engine.registrar().wants_read() {
                engine.in_event();
            }
        }
    }
}
