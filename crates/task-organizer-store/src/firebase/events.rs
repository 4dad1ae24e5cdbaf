//! Incremental parser for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerEvent {
    pub name: String,
    pub data: String,
}

/// Incremental parser for the database's event stream.
///
/// Covers only what the database sends: a blank line ends an event and
/// multi-line `data` fields are joined with `\n`. `id`, `retry` and comment
/// lines are dropped, so this is not a general server-sent-events client.
#[derive(Debug, Default)]
pub(crate) struct EventParser {
    pending: Vec<u8>,
    name: Option<String>,
    data: Vec<String>,
}

impl EventParser {
    /// Feed a chunk of the body and collect every event it completes.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.pending.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line[..end]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.name = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<ServerEvent> {
        if self.name.is_none() && self.data.is_empty() {
            return None;
        }
        let name = self.name.take().unwrap_or_else(|| "message".to_owned());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(ServerEvent { name, data })
    }
}
