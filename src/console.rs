//! # Console Input and Output
//!
//! The external collaborator seams for the kernel: a [`VectorSource`] the
//! coordinator reads the vector length and values from, and a
//! [`ReportSink`] it echoes gathered vectors and the abort diagnostic to.
//! Only the coordinator ever holds either; the other ranks have no console.
//!
//! [`ConsoleSource`]/[`ConsoleSink`] talk to the real terminal in
//! whitespace-separated text form. [`ScriptedSource`]/[`RecordingSink`] are
//! the shipped test doubles: a scripted token stream in, a captured
//! transcript out.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Error type for console input and output.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
  /// Input ended while values were still expected.
  #[error("input ended with {expected} value(s) still expected")]
  UnexpectedEof {
    /// Number of values that were never read.
    expected: usize,
  },
  /// A token could not be parsed as the expected kind of value.
  #[error("expected {kind}, got {token:?}")]
  Malformed {
    /// What the token should have been.
    kind: &'static str,
    /// The offending token.
    token: String,
  },
  /// The underlying stream failed.
  #[error("console i/o failed: {0}")]
  Io(#[from] std::io::Error),
}

/// Supplies the vector length and the named vectors, at the coordinator only.
#[async_trait]
pub trait VectorSource: Send {
  /// Reads the order of the vectors.
  async fn read_len(&mut self) -> Result<i64, ConsoleError>;

  /// Reads `len` values of the vector called `name`, in order.
  async fn read_values(&mut self, name: &str, len: usize) -> Result<Vec<f64>, ConsoleError>;
}

/// Receives gathered vectors and the abort diagnostic, at the coordinator only.
#[async_trait]
pub trait ReportSink: Send {
  /// Writes a gathered vector as `"<title>\n<v0> <v1> ... \n"`.
  async fn vector(&mut self, title: &str, values: &[f64]) -> Result<(), ConsoleError>;

  /// Writes the single abort diagnostic line to the error stream.
  async fn diagnostic(
    &mut self,
    rank: usize,
    context: &str,
    message: &str,
  ) -> Result<(), ConsoleError>;
}

fn parse_len(token: &str) -> Result<i64, ConsoleError> {
  token.parse().map_err(|_| ConsoleError::Malformed {
    kind: "an integer",
    token: token.to_string(),
  })
}

fn parse_value(token: &str) -> Result<f64, ConsoleError> {
  token.parse().map_err(|_| ConsoleError::Malformed {
    kind: "a number",
    token: token.to_string(),
  })
}

fn diagnostic_line(rank: usize, context: &str, message: &str) -> String {
  format!("Proc {rank} > In {context}, {message}")
}

/// Interactive source reading whitespace-separated tokens from stdin.
pub struct ConsoleSource {
  lines: Lines<BufReader<Stdin>>,
  pending: VecDeque<String>,
}

impl ConsoleSource {
  /// Creates a source over the process's stdin.
  pub fn new() -> Self {
    Self {
      lines: BufReader::new(tokio::io::stdin()).lines(),
      pending: VecDeque::new(),
    }
  }

  async fn next_token(&mut self) -> Result<Option<String>, ConsoleError> {
    loop {
      if let Some(token) = self.pending.pop_front() {
        return Ok(Some(token));
      }
      match self.lines.next_line().await? {
        Some(line) => self
          .pending
          .extend(line.split_whitespace().map(str::to_string)),
        None => return Ok(None),
      }
    }
  }
}

impl Default for ConsoleSource {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl VectorSource for ConsoleSource {
  async fn read_len(&mut self) -> Result<i64, ConsoleError> {
    println!("What's the order of the vectors?");
    match self.next_token().await? {
      Some(token) => parse_len(&token),
      None => Err(ConsoleError::UnexpectedEof { expected: 1 }),
    }
  }

  async fn read_values(&mut self, name: &str, len: usize) -> Result<Vec<f64>, ConsoleError> {
    println!("Enter the vector {name}");
    let mut values = Vec::with_capacity(len);
    while values.len() < len {
      match self.next_token().await? {
        Some(token) => values.push(parse_value(&token)?),
        None => {
          return Err(ConsoleError::UnexpectedEof {
            expected: len - values.len(),
          });
        }
      }
    }
    Ok(values)
  }
}

/// Sink printing gathered vectors to stdout and diagnostics to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
  /// Creates a console sink.
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl ReportSink for ConsoleSink {
  async fn vector(&mut self, title: &str, values: &[f64]) -> Result<(), ConsoleError> {
    let mut line = String::new();
    for value in values {
      // Trailing separator after the last value is part of the format.
      let _ = write!(line, "{value} ");
    }
    println!("{title}");
    println!("{line}");
    Ok(())
  }

  async fn diagnostic(
    &mut self,
    rank: usize,
    context: &str,
    message: &str,
  ) -> Result<(), ConsoleError> {
    eprintln!("{}", diagnostic_line(rank, context, message));
    Ok(())
  }
}

/// Scripted source feeding a fixed whitespace-separated token stream.
pub struct ScriptedSource {
  tokens: VecDeque<String>,
}

impl ScriptedSource {
  /// Creates a source over the given script, split on whitespace.
  pub fn new(script: &str) -> Self {
    Self {
      tokens: script.split_whitespace().map(str::to_string).collect(),
    }
  }
}

#[async_trait]
impl VectorSource for ScriptedSource {
  async fn read_len(&mut self) -> Result<i64, ConsoleError> {
    match self.tokens.pop_front() {
      Some(token) => parse_len(&token),
      None => Err(ConsoleError::UnexpectedEof { expected: 1 }),
    }
  }

  async fn read_values(&mut self, _name: &str, len: usize) -> Result<Vec<f64>, ConsoleError> {
    let mut values = Vec::with_capacity(len);
    while values.len() < len {
      match self.tokens.pop_front() {
        Some(token) => values.push(parse_value(&token)?),
        None => {
          return Err(ConsoleError::UnexpectedEof {
            expected: len - values.len(),
          });
        }
      }
    }
    Ok(values)
  }
}

/// Everything a [`RecordingSink`] captured, in emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedOutput {
  /// Echoed vectors as `(title, values)` pairs.
  pub vectors: Vec<(String, Vec<f64>)>,
  /// Diagnostic lines, formatted exactly as the console sink would print them.
  pub diagnostics: Vec<String>,
}

/// Sink capturing output for inspection after a run.
#[derive(Debug, Default)]
pub struct RecordingSink {
  log: Arc<Mutex<RecordedOutput>>,
}

impl RecordingSink {
  /// Creates an empty recording sink.
  pub fn new() -> Self {
    Self::default()
  }

  /// A handle on the captured output, valid after the sink has been moved
  /// into a run.
  pub fn log(&self) -> Arc<Mutex<RecordedOutput>> {
    Arc::clone(&self.log)
  }
}

#[async_trait]
impl ReportSink for RecordingSink {
  async fn vector(&mut self, title: &str, values: &[f64]) -> Result<(), ConsoleError> {
    self
      .log
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .vectors
      .push((title.to_string(), values.to_vec()));
    Ok(())
  }

  async fn diagnostic(
    &mut self,
    rank: usize,
    context: &str,
    message: &str,
  ) -> Result<(), ConsoleError> {
    self
      .log
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .diagnostics
      .push(diagnostic_line(rank, context, message));
    Ok(())
  }
}
