//! Transcript renderer using crossterm
//!
//! Prints transcript snapshots to a line-oriented terminal. Only entries
//! not printed yet are written; a reset prints a separator first.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};

use crate::core::{Pattern, ResponseEvent, ResponseKind, Transcript};

/// Incremental transcript printer
#[derive(Debug, Default)]
pub struct Renderer {
    /// Entries of the current generation already on screen
    printed: usize,
    /// Reset generation last rendered
    resets: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the screen up to date with `transcript`
    pub fn render<W: Write>(&mut self, out: &mut W, transcript: &Transcript) -> io::Result<()> {
        if transcript.resets() != self.resets || transcript.len() < self.printed {
            self.resets = transcript.resets();
            self.printed = 0;
            queue!(
                out,
                SetForegroundColor(Color::DarkGrey),
                Print("-- output cleared --\n"),
                ResetColor
            )?;
        }

        for event in &transcript.entries()[self.printed..] {
            Self::render_event(out, event)?;
        }
        self.printed = transcript.len();
        out.flush()
    }

    fn render_event<W: Write>(out: &mut W, event: &ResponseEvent) -> io::Result<()> {
        match &event.kind {
            ResponseKind::Command => queue!(
                out,
                SetForegroundColor(Color::Cyan),
                SetAttribute(Attribute::Bold),
                Print("> "),
                Print(&event.payload),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?,
            ResponseKind::Result if event.is_valid => queue!(out, Print(&event.payload))?,
            ResponseKind::Other(tag) => queue!(
                out,
                SetForegroundColor(Color::DarkGrey),
                Print(format!("[{}] ", tag)),
                ResetColor,
                Print(&event.payload)
            )?,
            // Errors and invalid results
            _ => queue!(
                out,
                SetForegroundColor(Color::Red),
                Print("(error) "),
                Print(&event.payload),
                ResetColor
            )?,
        }
        queue!(out, Print("\n"))
    }

    /// Print the input prompt with the current selection
    pub fn prompt<W: Write>(
        &self,
        out: &mut W,
        active_command: Option<&str>,
        active_pattern: Option<&Pattern>,
        pending_input: Option<&str>,
    ) -> io::Result<()> {
        let command = active_command.filter(|c| !c.is_empty());
        let mut label = command.unwrap_or("").to_string();
        if let Some(pattern) = active_pattern {
            if !label.is_empty() {
                label.push_str(" | ");
            }
            label.push_str(&pattern.template);
        }

        if !label.is_empty() {
            queue!(
                out,
                SetForegroundColor(Color::Green),
                Print(format!("[{}] ", label)),
                ResetColor
            )?;
        }
        if let Some(pending) = pending_input {
            queue!(
                out,
                SetForegroundColor(Color::DarkGrey),
                Print(format!("(picked: {}) ", pending)),
                ResetColor
            )?;
        }
        queue!(out, Print("> "))?;
        out.flush()
    }
}
