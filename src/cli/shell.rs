use super::input::LineInput;
use super::ui::{self, StyleType};
use crate::core::QueryError;
use crate::query::QueryCoordinator;
use anyhow::Result;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, warn};

const CODE_PROMPT: &str = "Enter currency code (e.g., EUR): ";
const AGAIN_PROMPT: &str = "Enter another currency code? (yes/no): ";

/// Interactive prompt that submits currency codes to a [`QueryCoordinator`].
///
/// Each lookup is its own future bounded by `query_timeout`.
pub struct Shell {
    coordinator: QueryCoordinator,
    query_timeout: Duration,
}

/// One line read at a prompt.
enum Reply {
    Line(String),
    Unreadable,
    Closed,
}

impl Shell {
    pub fn new(coordinator: QueryCoordinator, query_timeout: Duration) -> Self {
        Self {
            coordinator,
            query_timeout,
        }
    }

    /// Runs until the user declines another lookup or `input` ends.
    pub async fn run<L, W>(&self, mut input: L, out: &mut W) -> Result<()>
    where
        L: LineInput,
        W: Write,
    {
        writeln!(out, "{}", ui::style_text("Press Ctrl+C to exit.", StyleType::Subtle))?;

        loop {
            prompt(out, CODE_PROMPT)?;
            let line = match read_reply(&mut input).await? {
                Reply::Line(line) => line,
                Reply::Unreadable => {
                    reject(out, "input is not valid text")?;
                    continue;
                }
                Reply::Closed => {
                    writeln!(out)?;
                    break;
                }
            };
            if !self.answer(&line, out).await? {
                continue;
            }

            prompt(out, AGAIN_PROMPT)?;
            match read_reply(&mut input).await? {
                Reply::Line(choice) if is_yes(&choice) => {}
                _ => break,
            }
        }

        if let Some(event) = self.coordinator.last_refresh() {
            writeln!(
                out,
                "Latest rates updated at {} ({} currencies)",
                ui::format_time(event.updated_at),
                event.written
            )?;
        }
        Ok(())
    }

    /// Prints the answer for one code. Returns false when the input was
    /// rejected and the code prompt should be repeated.
    async fn answer<W: Write>(&self, input: &str, out: &mut W) -> Result<bool> {
        let lookup = tokio::time::timeout(self.query_timeout, self.coordinator.lookup(input));

        match lookup.await {
            Ok(Ok(record)) => {
                writeln!(
                    out,
                    "Exchange rate for {}: {}",
                    record.currency,
                    ui::style_text(&ui::format_rate(record.rate), StyleType::Rate)
                )?;
                writeln!(out, "Updated at: {}", ui::format_time(record.updated_at))?;
            }
            Ok(Err(e @ QueryError::InvalidInput(_))) => {
                reject(out, &e.to_string())?;
                return Ok(false);
            }
            Ok(Err(e)) if e.is_not_found() => {
                writeln!(out, "{}", ui::style_text(&e.to_string(), StyleType::Subtle))?;
            }
            Ok(Err(e)) => {
                writeln!(
                    out,
                    "{}",
                    ui::style_text(&format!("Error getting exchange rate: {e}"), StyleType::Error)
                )?;
            }
            Err(_) => {
                debug!(input = %input.trim(), "Lookup timed out");
                writeln!(
                    out,
                    "{}",
                    ui::style_text(
                        &format!("Lookup timed out after {:?}", self.query_timeout),
                        StyleType::Error
                    )
                )?;
            }
        }
        Ok(true)
    }
}

async fn read_reply<L: LineInput>(input: &mut L) -> Result<Reply> {
    match input.next_line().await {
        Ok(Some(line)) => Ok(Reply::Line(line)),
        Ok(None) => Ok(Reply::Closed),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!("Ignoring unreadable input line: {}", e);
            Ok(Reply::Unreadable)
        }
        Err(e) => Err(e.into()),
    }
}

fn reject<W: Write>(out: &mut W, reason: &str) -> Result<()> {
    writeln!(
        out,
        "{}",
        ui::style_text(&format!("{reason}. Please try again."), StyleType::Error)
    )?;
    Ok(())
}

fn prompt<W: Write>(out: &mut W, text: &str) -> Result<()> {
    write!(out, "{}", ui::style_text(text, StyleType::Title))?;
    out.flush()?;
    Ok(())
}

fn is_yes(choice: &str) -> bool {
    matches!(choice.trim().to_lowercase().as_str(), "yes" | "y")
}
