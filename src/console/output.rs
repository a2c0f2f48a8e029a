//! Console output sinks.

use std::io::Write;

/// Where commands write their text.
pub trait Output: Send {
    fn write(&mut self, text: &str);

    fn writeln(&mut self, line: &str) {
        self.write(line);
        self.write("\n");
    }
}

/// Writes to standard output.
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn write(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()) {
            tracing::warn!(error = %e, "failed to write console output");
        }
    }
}

/// Collects output in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    buffer: String,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// Take the buffered text, leaving the buffer empty.
    pub fn fetch(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl Output for BufferedOutput {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}
