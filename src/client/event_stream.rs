//! Incremental parser for `text/event-stream` bodies

/// Splits a byte stream into event `data` payloads.
///
/// Chunks may end anywhere, including inside a line or a multi-byte character.
/// Comment lines (keep-alives) and fields other than `data` are skipped. Each
/// byte is searched for a line break only once.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a line break
    scanned: usize,
    data: Vec<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..].iter().position(|&b| b == b'\n') {
            let end = cursor + offset;
            handle_line(&self.buffer[start..end], &mut self.data, &mut events);
            start = end + 1;
            cursor = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        events
    }
}

fn handle_line(line: &[u8], data: &mut Vec<String>, events: &mut Vec<String>) {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');

    if line.is_empty() {
        if !data.is_empty() {
            events.push(data.join("\n"));
            data.clear();
        }
        return;
    }
    if line.starts_with(':') {
        return;
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };
    if field == "data" {
        data.push(value.to_string());
    }
}
