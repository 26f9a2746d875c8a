//! Live progress rendering for the apply loop.
//!
//! The renderer holds pure presentation state (active migration index plus a
//! quantized progress bucket) and redraws a full frame from it on demand, so
//! rendering twice with unchanged state produces identical output. The
//! terminal cursor is hidden while the renderer is alive and restored exactly
//! once, either through [`ProgressRenderer::done`] or through `Drop` when an
//! error unwinds past it.

use crate::store::Migration;
use crossterm::{cursor, terminal, QueueableCommand};
use std::io::{self, Write};

/// Width of the per-migration progress bar, in cells.
const BAR_WIDTH: usize = 6;

/// One progress cell.
const BAR_CELL: char = '\u{25A0}';

struct Row {
    id: String,
    steps: String,
}

/// Renders the pending-migration table with a progress bar for the active
/// migration.
pub struct ProgressRenderer<W: Write> {
    out: W,
    rows: Vec<Row>,
    current_index: usize,
    current_progress: usize,
    last_frame_lines: u16,
    cursor_restored: bool,
}

impl<W: Write> ProgressRenderer<W> {
    /// Create a renderer for the given pending migrations and hide the
    /// cursor on `out` until [`done`](ProgressRenderer::done) or drop.
    pub fn new(migrations: &[Migration], mut out: W) -> io::Result<Self> {
        out.queue(cursor::Hide)?;
        out.flush()?;

        let rows = migrations
            .iter()
            .map(|m| Row {
                id: m.id.clone(),
                steps: match m.steps.len() {
                    1 => "1 step".to_string(),
                    n => format!("{n} steps"),
                },
            })
            .collect();

        Ok(Self {
            out,
            rows,
            current_index: 0,
            current_progress: 0,
            last_frame_lines: 0,
            cursor_restored: false,
        })
    }

    /// Update presentation state only; no output happens until the next
    /// [`render`](ProgressRenderer::render). The fraction is quantized to
    /// `floor(fraction * BAR_WIDTH)`, clamped to the bar width.
    pub fn set_progress(&mut self, index: usize, fraction: f64) {
        self.current_index = index;
        self.current_progress = ((fraction * BAR_WIDTH as f64).floor() as usize).min(BAR_WIDTH);
    }

    /// Redraw the whole frame from current state, replacing the previous one.
    pub fn render(&mut self) -> io::Result<()> {
        if self.last_frame_lines > 0 {
            self.out.queue(cursor::MoveUp(self.last_frame_lines))?;
            self.out.queue(cursor::MoveToColumn(0))?;
            self.out.queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        }

        let frame = self.frame();
        self.last_frame_lines = frame.lines().count() as u16;
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }

    /// Restore the cursor. Subsequent drops are no-ops.
    pub fn done(mut self) -> io::Result<()> {
        self.restore_cursor()
    }

    fn frame(&self) -> String {
        let id_width = self
            .rows
            .iter()
            .map(|r| r.id.len())
            .chain(["Migration".len()])
            .max()
            .unwrap_or(0);
        let steps_width = self
            .rows
            .iter()
            .map(|r| r.steps.len())
            .chain(["Steps".len()])
            .max()
            .unwrap_or(0);

        let mut frame = String::new();
        frame.push_str(
            format!("{:<id_width$}  {:<steps_width$}  Status", "Migration", "Steps").trim_end(),
        );
        frame.push('\n');
        for (index, row) in self.rows.iter().enumerate() {
            let status = if index < self.current_index
                || (index == self.current_index && self.current_progress == BAR_WIDTH)
            {
                "Done".to_string()
            } else if index == self.current_index {
                BAR_CELL.to_string().repeat(self.current_progress)
            } else {
                String::new()
            };
            frame.push_str(
                format!("{:<id_width$}  {:<steps_width$}  {status}", row.id, row.steps).trim_end(),
            );
            frame.push('\n');
        }
        frame
    }

    fn restore_cursor(&mut self) -> io::Result<()> {
        if self.cursor_restored {
            return Ok(());
        }
        self.cursor_restored = true;
        self.out.queue(cursor::Show)?;
        self.out.flush()
    }
}

impl<W: Write> Drop for ProgressRenderer<W> {
    fn drop(&mut self) {
        // Guaranteed cleanup: an error unwinding past the apply loop must
        // still leave the terminal usable.
        let _ = self.restore_cursor();
    }
}
