//! Runs toolkit calls in a Python child process.
//!
//! Each call becomes a short script that imports the toolkit module, makes the
//! call, and prints the JSON-encoded return value after a marker on stdout.
//! Everything else the process writes is forwarded line by line to the log
//! sink. Both pipes are drained to EOF whatever bytes the toolkit writes.

use std::{
    collections::VecDeque,
    path::PathBuf,
    process::Stdio,
    sync::Arc,
};

use dlcgui_core::{CallReturn, Toolkit, ToolkitCall, ToolkitFailure};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    runtime::Handle,
    sync::mpsc,
};

pub const RESULT_MARKER: &str = "@@DLCGUI_RESULT@@";

const LOG_CHANNEL_CAPACITY: usize = 256;
const RECENT_LOG_LIMIT: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: &'static str,
    pub line: String,
}

pub type LogSink = Arc<dyn Fn(OutputLine) + Send + Sync>;

#[derive(Clone)]
pub struct PythonToolkit {
    python: String,
    working_dir: Option<PathBuf>,
    handle: Handle,
    sink: Option<LogSink>,
}

impl PythonToolkit {
    pub fn new(python: impl Into<String>, handle: Handle) -> Self {
        Self {
            python: python.into(),
            working_dir: None,
            handle,
            sink: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn python(&self) -> &str {
        &self.python
    }

    pub async fn run(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure> {
        let script = render_script(call);
        tracing::debug!(function = call.function, "python script:\n{script}");

        let mut cmd = Command::new(&self.python);
        cmd.arg("-u")
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|err| {
            ToolkitFailure::new(format!("failed to start {}: {err}", self.python))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolkitFailure::new("failed to capture python stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolkitFailure::new("failed to capture python stderr"))?;

        let (line_tx, mut line_rx) = mpsc::channel::<OutputLine>(LOG_CHANNEL_CAPACITY);
        tokio::spawn(read_lines(stdout, "stdout", line_tx.clone()));
        tokio::spawn(read_lines(stderr, "stderr", line_tx));

        let mut recent = VecDeque::with_capacity(RECENT_LOG_LIMIT);
        let mut stderr_tail = VecDeque::with_capacity(RECENT_LOG_LIMIT);
        let mut returned: Option<Value> = None;
        let mut status = None;
        let mut lines_open = true;

        while lines_open || status.is_none() {
            tokio::select! {
                line = line_rx.recv(), if lines_open => {
                    match line {
                        Some(mut line) => {
                            if line.stream == "stdout" {
                                let unterminated = match parse_result_line(&line.line) {
                                    Some((before, parsed)) => {
                                        match parsed {
                                            Ok(value) => returned = Some(value),
                                            Err(err) => tracing::warn!("unreadable return value: {err}"),
                                        }
                                        Some(before.to_string())
                                    }
                                    None => None,
                                };
                                // Output the toolkit left on the marker's line.
                                if let Some(before) = unterminated {
                                    if before.trim().is_empty() {
                                        continue;
                                    }
                                    line.line = before;
                                }
                            } else {
                                append_recent(&mut stderr_tail, line.line.clone());
                            }
                            append_recent(&mut recent, format!("[{}] {}", line.stream, line.line));
                            tracing::info!(stream = line.stream, "{}", line.line);
                            if let Some(sink) = &self.sink {
                                sink(line);
                            }
                        }
                        None => lines_open = false,
                    }
                }
                result = child.wait(), if status.is_none() => {
                    status = Some(result);
                }
            }
        }

        let status = match status {
            Some(Ok(status)) => status,
            Some(Err(err)) => {
                return Err(ToolkitFailure::new(format!("python process failed: {err}")))
            }
            None => return Err(ToolkitFailure::new("python process did not return status")),
        };

        if !status.success() {
            tracing::warn!(
                function = call.function,
                "{status}; recent output:\n{}",
                collect_recent(&recent)
            );
            let message = exception_message(&stderr_tail)
                .unwrap_or_else(|| format!("{} exited with {status}", call.function));
            return Err(ToolkitFailure::new(message));
        }

        Ok(CallReturn {
            value: returned.unwrap_or(Value::Null),
        })
    }
}

/// Blocks on the runtime handle. Call from a plain thread or a
/// `spawn_blocking` task, never from inside async code.
impl Toolkit for PythonToolkit {
    fn call(&self, call: &ToolkitCall) -> Result<CallReturn, ToolkitFailure> {
        self.handle.block_on(self.run(call))
    }
}

pub fn render_script(call: &ToolkitCall) -> String {
    format!(
        "import json\n\
         import sys\n\
         import {module}\n\
         _result = {call}\n\
         try:\n    _payload = json.dumps(_result)\n\
         except (TypeError, ValueError):\n    _payload = json.dumps(repr(_result))\n\
         sys.stdout.flush()\n\
         print({marker:?} + _payload, flush=True)\n",
        module = call.module(),
        marker = RESULT_MARKER,
    )
}

/// `None` for ordinary output. Otherwise the text printed before the marker
/// on the same line, and the decoded return value.
pub fn parse_result_line(line: &str) -> Option<(&str, Result<Value, String>)> {
    let at = line.find(RESULT_MARKER)?;
    let payload = line[at + RESULT_MARKER.len()..].trim_end();
    let parsed = serde_json::from_str(payload).map_err(|err| err.to_string());
    Some((&line[..at], parsed))
}

/// The last non-empty stderr line, which for an uncaught Python exception is
/// `ExceptionType: message`.
pub fn exception_message(stderr_tail: &VecDeque<String>) -> Option<String> {
    stderr_tail
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Reads raw lines until EOF. Bytes that are not UTF-8 are replaced, and the
/// pipe keeps draining after the receiver goes away so the child never sees
/// a broken pipe.
async fn read_lines<R>(reader: R, stream: &'static str, tx: mpsc::Sender<OutputLine>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarding = true;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(stream, "reading python output failed: {err}");
                break;
            }
        }
        if !forwarding {
            continue;
        }
        let line = decode_line(&buf);
        if tx.send(OutputLine { stream, line }).await.is_err() {
            forwarding = false;
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn append_recent(recent: &mut VecDeque<String>, line: String) {
    if recent.len() >= RECENT_LOG_LIMIT {
        recent.pop_front();
    }
    recent.push_back(line);
}

fn collect_recent(recent: &VecDeque<String>) -> String {
    recent.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}
