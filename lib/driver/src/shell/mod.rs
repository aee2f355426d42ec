//! Interactive SQL shell over a local [`Driver`](crate::Driver).

use self::{highlighter::SqlHighlighter, prompt::SqlPrompt};
use crate::DriverRef;
use anyhow::{anyhow, Context, Result};
use compile::{diagnostics::report_errors, parse_statement};
use nu_ansi_term::{Color, Style};
use owo_colors::OwoColorize;
use prettytable::{row, Table};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{io, path::PathBuf};
use typed_builder::TypedBuilder;

mod highlighter;
mod prompt;

const HISTORY_SIZE: usize = 100;

#[derive(TypedBuilder)]
pub struct Shell {
    driver: DriverRef,
    prompt: SqlPrompt,
    line_editor: Reedline,
    bail_on_error: bool,
}

impl Shell {
    pub fn new(driver: DriverRef, history_file: PathBuf) -> Result<Self> {
        let history = FileBackedHistory::with_file(HISTORY_SIZE, history_file.clone())
            .with_context(|| format!("unable to open history file {}", history_file.display()))?;
        let hinter =
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray));

        let line_editor = Reedline::create()
            .with_highlighter(Box::new(SqlHighlighter::new()))
            .with_history(Box::new(history))
            .with_hinter(Box::new(hinter));

        Ok(Shell::builder()
            .driver(driver)
            .prompt(SqlPrompt::default())
            .line_editor(line_editor)
            .bail_on_error(false)
            .build())
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.line_editor.read_line(&self.prompt)? {
                Signal::Success(buffer) => {
                    self.prompt.increment_line_count();

                    if buffer.trim().is_empty() {
                        continue;
                    }

                    if let Err(e) = self.process_command(buffer.trim()) {
                        if self.bail_on_error {
                            return Err(e);
                        }
                    }
                }
                Signal::CtrlC | Signal::CtrlD => {
                    println!("Goodbye!");
                    break;
                }
            }
        }
        Ok(())
    }

    fn process_command(&mut self, command: &str) -> Result<()> {
        if command.starts_with('.') {
            return self.handle_dot_command(command);
        }

        let statement = match parse_statement(command) {
            Ok(statement) => statement,
            Err(err) => {
                report_errors(&mut io::stderr(), command, &[err])?;
                return Err(anyhow!("malformed statement"));
            }
        };

        match self.driver.execute(statement) {
            Ok(result) => {
                println!("{}", result);
                Ok(())
            }
            Err(err) => {
                eprintln!("{} {}", format!("{}:", err.kind()).red().bold(), err);
                Err(err.into())
            }
        }
    }

    fn handle_dot_command(&mut self, command: &str) -> Result<()> {
        match command.split_whitespace().collect::<Vec<&str>>().as_slice() {
            [".bail"] => {
                println!(
                    "{}",
                    format!(
                        "Error stop mode is {}",
                        if self.bail_on_error {
                            "on".green().to_string()
                        } else {
                            "off".red().to_string()
                        }
                    )
                    .purple()
                );
                Ok(())
            }
            [".bail", "on"] => {
                self.bail_on_error = true;
                Ok(())
            }
            [".bail", "off"] => {
                self.bail_on_error = false;
                Ok(())
            }
            [".exit"] | [".quit"] => {
                println!("Goodbye!");
                std::process::exit(0);
            }
            [".exit", code] => {
                println!("Goodbye!");
                std::process::exit(code.parse::<i32>().unwrap_or(0));
            }
            [".help"] => {
                self.show_help();
                Ok(())
            }
            [".databases"] => self.print_statement("SHOW DATABASES"),
            [".tables", database] => self.print_statement(&format!("SHOW TABLES {}", database)),
            [".sync"] => {
                let in_sync = self.driver.records().is_metadata_in_sync()?;
                println!(
                    "Catalog and store are {}",
                    if in_sync {
                        "in sync".green().to_string()
                    } else {
                        "out of sync".red().to_string()
                    }
                );
                Ok(())
            }
            _ => {
                println!(
                    "{}{}{}{}{}",
                    "Unrecognized dot command".purple(),
                    ":".black(),
                    " `".red(),
                    command.yellow(),
                    "`".red(),
                );
                Ok(())
            }
        }
    }

    fn print_statement(&self, sql: &str) -> Result<()> {
        let result = self.driver.execute_sql(sql)?;
        println!("{}", result);
        Ok(())
    }

    fn show_help(&self) {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["General Help", ""]);
        table.add_row(row![
            "Press Ctrl+D or type .exit to exit",
            "Exit this program",
        ]);
        table.add_row(row![
            "Press Ctrl+R to search through command history",
            "Search through command history"
        ]);
        table.add_row(row![
            "Press Up/Down arrows or Ctrl+n/p to browse history",
            "Browse history"
        ]);
        table.printstd();

        println!();
        println!("Available dot commands:");

        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Command", "Description"]);
        table.add_row(row![".bail [on|off]", "Show or set error stop mode"]);
        table.add_row(row![
            ".exit [CODE]",
            "Exit this program with return-code [CODE]"
        ]);
        table.add_row(row![".help", "Show this help information"]);
        table.add_row(row![".quit", "Exit this program (with return-code 0)"]);
        table.add_row(row![".databases", "List databases"]);
        table.add_row(row![".tables DATABASE", "List the tables of DATABASE"]);
        table.add_row(row![
            ".sync",
            "Check that the catalog matches the document store"
        ]);
        table.printstd();
    }
}
