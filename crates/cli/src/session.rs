//! Line-oriented interactive selection session.
//!
//! Each input line is one user action. After every action the manager's
//! status slot is echoed, the way a status bar would show it.

use crate::write_download;
use anyhow::Result;
use page_selection::SelectionManager;
use pdf_engine::PdfEngine;
use std::io::{BufRead, Write};
use std::path::PathBuf;

const HELP: &str = "\
commands:
  toggle N [N...]  select or deselect pages
  all              select every page
  none             clear the selection
  list             show the selected pages
  status           show the current status
  export           save the selected pages
  quit             leave the session";

enum Flow {
    Continue,
    Quit,
}

pub struct Session<E: PdfEngine> {
    manager: SelectionManager<E>,
    download_dir: PathBuf,
}

impl<E: PdfEngine> Session<E> {
    /// `manager` is expected to have a document loaded already.
    pub fn new(manager: SelectionManager<E>, download_dir: PathBuf) -> Self {
        Self { manager, download_dir }
    }

    pub fn manager(&self) -> &SelectionManager<E> {
        &self.manager
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> Result<()> {
        if let Some(name) = self.manager.document_name() {
            writeln!(output, "{name}: {} pages", self.manager.page_count())?;
        }
        self.print_status(output)?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Flow::Quit = self.execute(line, output)? {
                break;
            }
        }

        Ok(())
    }

    fn execute<W: Write>(&mut self, line: &str, output: &mut W) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Flow::Continue);
        };

        match command {
            "toggle" | "t" => {
                let args: Vec<&str> = words.collect();
                if args.is_empty() {
                    writeln!(output, "[error] toggle needs at least one page number")?;
                    return Ok(Flow::Continue);
                }

                for arg in args {
                    let Ok(page) = arg.parse::<u32>() else {
                        writeln!(output, "[error] not a page number: {arg}")?;
                        return Ok(Flow::Continue);
                    };
                    if self.manager.toggle_page(page).is_err() {
                        break;
                    }
                }
            }
            "all" => {
                self.manager.select_all_pages();
            }
            "none" => self.manager.deselect_all(),
            "list" => {
                let pages = self.manager.selected_pages();
                if pages.is_empty() {
                    writeln!(output, "no pages selected")?;
                } else {
                    let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
                    writeln!(output, "selected: {}", pages.join(", "))?;
                }
                return Ok(Flow::Continue);
            }
            "status" => {}
            "export" => {
                let dir = &self.download_dir;
                if let Ok(path) =
                    self.manager.export_selection_with(|bytes| write_download(dir, bytes))
                {
                    writeln!(output, "saved {}", path.display())?;
                }
            }
            "help" | "?" => {
                writeln!(output, "{HELP}")?;
                return Ok(Flow::Continue);
            }
            "quit" | "exit" | "q" => return Ok(Flow::Quit),
            other => {
                writeln!(output, "[error] unknown command: {other} (try help)")?;
                return Ok(Flow::Continue);
            }
        }

        self.print_status(output)?;
        Ok(Flow::Continue)
    }

    fn print_status<W: Write>(&self, output: &mut W) -> Result<()> {
        if let Some(status) = self.manager.status() {
            writeln!(output, "{status}")?;
        }
        Ok(())
    }
}
