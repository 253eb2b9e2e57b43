//! Operator console output.

use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

type Sink = Box<dyn Write + Send>;

/// Line oriented output shared by the console loop, background jobs and
/// callbacks from the stack.
///
/// Every call writes one complete line under a lock, so output from different
/// threads never interleaves within a line.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Sink>>,
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Console").finish()
    }
}

impl Console {
    /// Console writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Console writing to the specified sink.
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    /// Console writing to memory, together with a handle to read back what was written.
    pub fn memory() -> (Self, Transcript) {
        let transcript = Transcript::default();
        (Self::new(Box::new(transcript.clone())), transcript)
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prints one line.
    pub fn line(&self, msg: impl fmt::Display) {
        let mut sink = self.lock();
        if let Err(err) = writeln!(sink, "{msg}").and_then(|_| sink.flush()) {
            log::warn!("Console write failed: {err}");
        }
    }

    /// Prints the input prompt without a line break.
    pub fn prompt(&self) {
        let mut sink = self.lock();
        if let Err(err) = write!(sink, ">").and_then(|_| sink.flush()) {
            log::warn!("Console write failed: {err}");
        }
    }
}

/// In-memory console contents.
#[derive(Clone, Debug, Default)]
pub struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Number of lines equal to `line`.
    pub fn count(&self, line: &str) -> usize {
        self.contents().lines().filter(|l| l.trim_start_matches('>') == line).count()
    }

    /// Whether some line equals `line`.
    pub fn contains(&self, line: &str) -> bool {
        self.count(line) > 0
    }
}

impl Write for Transcript {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_and_prompt() {
        let (console, transcript) = Console::memory();
        console.line("HAL REQUEST SUCCESS");
        console.prompt();
        console.line(format_args!("register:: Ret={}", 1));
        assert_eq!(transcript.contents(), "HAL REQUEST SUCCESS\n>register:: Ret=1\n");
        assert!(transcript.contains("register:: Ret=1"));
        assert_eq!(transcript.count("HAL REQUEST SUCCESS"), 1);
    }
}
