// Licensed under the Apache-2.0 license

//! Logging sinks shared by the driver modules.
//!
//! Drivers are generic over a [`Logger`] and default to [`NoOpLogger`], so a
//! build that does not care about diagnostics pays nothing for them.

use embedded_io::Write;

/// Minimal line-oriented logger used from both foreground and interrupt context.
///
/// Implementations must not block for long: the driver calls into the logger
/// while interrupts are masked.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Logger writing `[LEVEL] message\r\n` lines to any `embedded_io` sink,
/// typically a UART.
///
/// Write failures are dropped; logging must never fail a bus transaction.
pub struct WriterLogger<W: Write> {
    writer: W,
}

impl<W: Write> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give back the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: Write> Logger for WriterLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("[DEBUG] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("[ERROR] ", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct VecWriter(Vec<u8>);

    impl embedded_io::ErrorType for VecWriter {
        type Error = Infallible;
    }

    impl Write for VecWriter {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_logger_formats_lines() {
        let mut logger = WriterLogger::new(VecWriter(Vec::new()));
        logger.debug("bus idle");
        logger.error("nack");

        let out = logger.into_inner().0;
        assert_eq!(out.as_slice(), b"[DEBUG] bus idle\r\n[ERROR] nack\r\n");
    }

    #[test]
    fn test_noop_logger_accepts_everything() {
        let mut logger = NoOpLogger;
        logger.debug("ignored");
        logger.error("ignored");
    }
}
