//! Output sinks for displayed events.

use std::io::{self, Write};

use tracker_types::TrackingEvent;

/// Final destination of events that passed the filter.
pub trait EventSink {
    /// Shows one event. Must not fail; sinks log their own errors.
    fn display(&mut self, event: &TrackingEvent);
}

/// Writes one line per event to any [`Write`] target.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stdout> {
    /// A sink printing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn display(&mut self, event: &TrackingEvent) {
        let result = writeln!(
            self.writer,
            "Received event: account_id={} timestamp={} data={}",
            event.account_id, event.timestamp, event.data
        )
        .and_then(|()| self.writer.flush());

        if let Err(e) = result {
            tracing::error!(account_id = %event.account_id, error = %e, "failed to write event");
        }
    }
}

impl EventSink for Vec<TrackingEvent> {
    fn display(&mut self, event: &TrackingEvent) {
        self.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_sink_formats_one_line_per_event() {
        let mut sink = WriterSink::new(Vec::new());
        sink.display(&TrackingEvent::new("1", 1_700_000_000, "x"));
        sink.display(&TrackingEvent::new("3", 1_700_000_001, "hello world"));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "Received event: account_id=1 timestamp=1700000000 data=x\n\
             Received event: account_id=3 timestamp=1700000001 data=hello world\n"
        );
    }

    #[test]
    fn write_failure_is_swallowed() {
        let mut sink = WriterSink::new(BrokenPipe);
        sink.display(&TrackingEvent::new("1", 1, "x"));
    }
}
