//! Text rendering of controller diagnostics for the `status` command.

use core::fmt;

use crate::controller::ControllerDiagnostics;

/// Helper that renders a [`ControllerDiagnostics`] snapshot into lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    diagnostics: &'a ControllerDiagnostics,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(diagnostics: &'a ControllerDiagnostics) -> Self {
        Self { diagnostics }
    }

    /// Writes the summary line (e.g. `controller enabled, 2 running, 1 waiting`).
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    pub fn write_summary_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let state = if self.diagnostics.enabled {
            "enabled"
        } else {
            "disabled"
        };
        write!(
            writer,
            "controller {state}, {} running, {} waiting",
            self.diagnostics.running.len(),
            self.diagnostics.waiting
        )
    }

    /// Writes one line per started runner, each terminated by a newline.
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    pub fn write_runner_lines<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        for summary in &self.diagnostics.running {
            write!(writer, "  {} {} [{}]", summary.id, summary.name, summary.status)?;
            if let Some(cause) = summary.blocked_by {
                write!(writer, " blocked by {cause}")?;
            }
            writer.write_char('\n')?;
        }
        Ok(())
    }

    /// Writes the distinct blocked-by causes (`blocked by: none` when idle).
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    pub fn write_blocked_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("blocked by: ")?;
        let mut any = false;
        for cause in self.diagnostics.blocked_by() {
            if any {
                writer.write_str(", ")?;
            }
            any = true;
            writer.write_str(cause.label())?;
        }
        if !any {
            writer.write_str("none")?;
        }
        Ok(())
    }
}
