// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt::{Debug, Display},
    sync::Arc,
};

/// What went wrong, independent of the operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration, e.g. an unknown cache policy name or a zero capacity.
    Config,
    /// An operation was called on a table that is not in the required mode.
    Precondition,
    /// An externally supplied callback or collaborator failed.
    External,
    /// A value could not be parsed from its textual form.
    Parse,
}

impl ErrorKind {
    /// Human readable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "Config error",
            ErrorKind::Precondition => "Precondition violated",
            ErrorKind::External => "External error",
            ErrorKind::Parse => "Parse error",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned by all partcache operations.
///
/// `Display` renders a single line, context pairs in brackets and the source last:
///
/// ```shell
/// External error: cache policy callback failed [callback=evict, partition=ds=1]: release refused
/// ```
///
/// `Debug` renders a multi-line report that also carries the backtrace when one was captured (see
/// [`std::backtrace::Backtrace::capture`]). The alternate form (`{:#?}`) prints the plain struct.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<Arc<anyhow::Error>>,
    backtrace: Arc<Backtrace>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            return f
                .debug_struct("Error")
                .field("kind", &self.kind)
                .field("message", &self.message)
                .field("context", &self.context)
                .field("source", &self.source)
                .finish_non_exhaustive();
        }

        writeln!(f, "{}: {}", self.kind, self.message)?;
        for (key, value) in &self.context {
            writeln!(f, "    {key}: {value}")?;
        }
        if let Some(source) = self.source.as_deref() {
            writeln!(f, "caused by: {source:#}")?;
        }
        if let Some(backtrace) = self.backtrace() {
            writeln!(f, "backtrace:\n{backtrace}")?;
        }
        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if !self.context.is_empty() {
            f.write_str(" [")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("]")?;
        }

        match self.source.as_deref() {
            Some(source) => write!(f, ": {source}"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = self.source.as_deref()?;
        Some(source.as_ref())
    }
}

impl Error {
    /// Create an error of `kind`, capturing a backtrace if enabled.
    ///
    /// ```rust
    /// # use partcache_common::error::{Error, ErrorKind};
    /// let err = Error::new(ErrorKind::Config, "unknown cache policy").with_context("policy", "mru");
    /// assert_eq!(err.kind(), ErrorKind::Config);
    /// assert_eq!(err.context_value("policy"), Some("mru"));
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
            source: None,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    /// Attach a `key=value` pair. Pairs keep their insertion order.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Attach the underlying cause. An error has at most one; a second call replaces the first in release builds.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "error source set twice");
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error message, without context or source.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Every attached `key=value` pair.
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// The first context value recorded under `key`.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v.as_str()))
    }

    /// The backtrace, if one was captured.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.backtrace.status() {
            BacktraceStatus::Captured => Some(&self.backtrace),
            _ => None,
        }
    }

    /// The underlying cause.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }

    /// Downcast the underlying cause.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        self.source().and_then(|source| source.downcast_ref::<E>())
    }
}

/// Result type for partcache.
pub type Result<T> = std::result::Result<T, Error>;

/// Helper constructors.
impl Error {
    /// An [`ErrorKind::Config`] error for a cache policy name that matches no strategy.
    pub fn unknown_policy(name: &str) -> Self {
        Error::new(ErrorKind::Config, "unknown cache policy").with_context("policy", name)
    }

    /// An [`ErrorKind::Precondition`] error for serde bookkeeping on a table that is not a unified view.
    pub fn not_unified_view(key: &str) -> Self {
        Error::new(ErrorKind::Precondition, "serde format can only be recorded on a unified view table")
            .with_context("partition", key)
    }

    /// An [`ErrorKind::External`] error raised by a load or evict callback.
    pub fn callback(callback: &'static str, key: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::new(ErrorKind::External, "cache policy callback failed")
            .with_context("callback", callback)
            .with_context("partition", key)
            .with_source(source)
    }
}
