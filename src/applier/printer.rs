//! Serialized output shared by all workers

use super::backend::DdlStatement;
use super::target::Target;
use colored::Colorize;
use indexmap::IndexSet;
use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

/// Writes whole blocks under one lock so concurrent targets never interleave.
pub struct Printer {
    brief: bool,
    /// Style comments; only when writing to a terminal
    color: bool,
    out: Mutex<Box<dyn Write + Send>>,
    seen: Mutex<IndexSet<String>>,
}

impl Printer {
    /// Print to stdout. `brief` lists only instances with differences.
    pub fn new(brief: bool) -> Self {
        let stdout = io::stdout();
        let color = stdout.is_terminal();
        Self {
            color,
            ..Self::with_writer(brief, Box::new(stdout))
        }
    }

    /// Print plain text to `out`.
    pub fn with_writer(brief: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            brief,
            color: false,
            out: Mutex::new(out),
            seen: Mutex::new(IndexSet::new()),
        }
    }

    /// Print the DDL for a target.
    ///
    /// `warnings` are printed as comments above the statements they concern.
    pub fn print_ddl(
        &self,
        target: &Target,
        statements: &[DdlStatement],
        warnings: &[(usize, String)],
    ) {
        if statements.is_empty() {
            return;
        }

        if self.brief {
            let label = target.instance.to_string();
            let first = match self.seen.lock() {
                Ok(mut seen) => seen.insert(label.clone()),
                Err(poisoned) => poisoned.into_inner().insert(label.clone()),
            };
            if first {
                self.write_block(&format!("{label}\n"));
            }
            return;
        }

        let header = format!("-- instance: {}", target.instance);
        let mut block = if self.color {
            format!("{}\n", header.dimmed())
        } else {
            format!("{header}\n")
        };
        block.push_str(&format!("USE `{}`;\n", target.schema_name.replace('`', "``")));
        for (index, statement) in statements.iter().enumerate() {
            for (_, warning) in warnings.iter().filter(|(i, _)| *i == index) {
                let line = format!("-- WARNING: {warning}");
                if self.color {
                    block.push_str(&format!("{}\n", line.yellow()));
                } else {
                    block.push_str(&format!("{line}\n"));
                }
            }
            block.push_str(&format!("{statement}\n"));
        }
        self.write_block(&block);
    }

    fn write_block(&self, block: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = out.write_all(block.as_bytes()).and_then(|()| out.flush()) {
            log::error!("failed to write output: {e}");
        }
    }
}
