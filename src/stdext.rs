//! The bits of libc a signal handler may still use.
//!
//! `tracing` subscribers allocate and take locks, so code running in a handler
//! prints through [`LibCStdoutWriter`] instead, which is nothing but `write(2)`.

use core::fmt;
use core::fmt::Write;

pub struct LibCStdoutWriter;

impl Write for LibCStdoutWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Bytes, since a short write can stop in the middle of a char.
        let mut buf = s.as_bytes();
        while !buf.is_empty() {
            // SAFETY: The pointer and length come from a live slice.
            let r = unsafe { libc::write(libc::STDOUT_FILENO, buf.as_ptr().cast(), buf.len()) };
            if r < 0 {
                if errno() == libc::EINTR {
                    continue;
                }
                return Err(fmt::Error);
            }
            if r == 0 {
                return Err(fmt::Error);
            }
            buf = &buf[(r as usize)..];
        }
        Ok(())
    }
}

pub fn print(args: fmt::Arguments<'_>) -> fmt::Result {
    LibCStdoutWriter.write_fmt(args)
}

pub fn abort() -> ! {
    // SAFETY: We abort.
    unsafe { libc::abort() };
}

fn errno() -> i32 {
    // SAFETY: errno is thread-local, and the location libc gives us for it is
    // valid for as long as the thread lives.
    unsafe { *libc::__errno_location() }
}
