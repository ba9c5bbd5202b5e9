use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::common::buffer::QueryBuffer;
use crate::common::errors::Result;
use crate::common::types::PathOutcome;
use crate::config::FileUserConfig;
use crate::enumerate::{canonicalize_literal, Enumerator};
use crate::owners::{resolve_path, OwnerQuery, Reporter};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    pub paths: usize,
    pub open_failures: usize,
    pub query_failures: usize,
    pub owners: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArgumentSummary {
    pub candidates: Vec<PathBuf>,
    pub opened: usize,
    pub used_fallback: bool,
}

/// One run over a list of arguments. Owns the only query buffer.
pub struct Session<Q: OwnerQuery> {
    query: Q,
    buffer: QueryBuffer,
    enumerator: Enumerator,
    name_capacity: usize,
    stats: RunStats,
}

impl<Q: OwnerQuery> Session<Q> {
    pub fn new(query: Q, config: &FileUserConfig) -> Result<Self> {
        let buffer = QueryBuffer::with_capacity(config.buffer_capacity)?;
        Ok(Self {
            query,
            buffer,
            enumerator: Enumerator::new(config.match_flags),
            name_capacity: config.name_capacity,
            stats: RunStats::default(),
        })
    }

    /// Reports every candidate `arg` expands to. When none of them could be
    /// opened, the literal argument is tried once as a full path.
    pub fn process_argument<O: Write, E: Write>(
        &mut self,
        arg: &OsStr,
        reporter: &mut Reporter<O, E>,
    ) -> io::Result<ArgumentSummary> {
        let mut summary = ArgumentSummary {
            candidates: self.enumerator.candidates(arg),
            ..ArgumentSummary::default()
        };

        for path in &summary.candidates {
            if self.process_path(path, reporter)? {
                summary.opened += 1;
            }
        }

        if summary.opened == 0 {
            match canonicalize_literal(arg) {
                Ok(full_path) => {
                    summary.used_fallback = true;
                    if self.process_path(&full_path, reporter)? {
                        summary.opened += 1;
                    }
                }
                Err(err) => log::debug!(
                    "cannot build a full path for {}: {err}",
                    Path::new(arg).display()
                ),
            }
        }
        Ok(summary)
    }

    /// Returns whether the path could be opened.
    pub fn process_path<O: Write, E: Write>(
        &mut self,
        path: &Path,
        reporter: &mut Reporter<O, E>,
    ) -> io::Result<bool> {
        let outcome = resolve_path(&self.query, path, &mut self.buffer, self.name_capacity);
        self.stats.paths += 1;
        match &outcome {
            PathOutcome::Resolved(owners) => self.stats.owners += owners.len(),
            PathOutcome::OpenFailed(_) => self.stats.open_failures += 1,
            PathOutcome::QueryFailed(_) => self.stats.query_failures += 1,
        }
        reporter.report(path, &outcome)?;
        Ok(!matches!(outcome, PathOutcome::OpenFailed(_)))
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn query(&self) -> &Q {
        &self.query
    }
}
