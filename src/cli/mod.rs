//! Interactive front end
//!
//! Prompts for a store and a logical size, then loops over a small menu.
//! Recoverable errors keep the session going; anything else closes the
//! store and asks for a path again.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use prettytable::{Table, row};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thiserror::Error;

use pagevm::{Bootstrap, VirtualMemory, VmError};

/// Bulk writes print a progress mark every this many elements
const PROGRESS_STEP: u64 = 100_000;

/// Largest array a bulk write can fill, each element holding its own index
const BULK_WRITE_LIMIT: u64 = i32::MAX as u64 + 1;

#[derive(Debug, Parser)]
#[command(name = "pagevm", version, about = "Demand-paged virtual array over a single file")]
pub struct Args {
    /// Backing store file, prompted for when omitted
    pub path: Option<PathBuf>,

    /// Logical size in elements, prompted for when omitted
    #[arg(short, long)]
    pub size: Option<u64>,

    /// Prime the buffer pool with the first pages on open
    #[arg(long)]
    pub prefetch: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Readline error: {0}")]
    Readline(#[from] ReadlineError),

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),
}

/// How a session ended
enum Outcome {
    Exit,
    Failed(VmError),
}

pub fn run(args: Args) -> Result<(), CliError> {
    let mut editor = DefaultEditor::new()?;
    let bootstrap = if args.prefetch {
        Bootstrap::Prefetch
    } else {
        Bootstrap::Faithful
    };

    let mut path = args.path;
    let mut size = args.size;

    loop {
        let store_path = match path.take() {
            Some(path) => path,
            None => match read_line(&mut editor, "Enter file name: ")? {
                Some(line) if !line.is_empty() => PathBuf::from(line),
                Some(_) => continue,
                None => return Ok(()),
            },
        };

        let logical_size = match size.take() {
            Some(size) => size,
            None => match read_number::<u64>(&mut editor, "Enter array size: ") {
                Ok(Some(size)) => size,
                Ok(None) => return Ok(()),
                Err(CliError::InvalidNumber(input)) => {
                    println!("Invalid number: {:?}", input);
                    continue;
                }
                Err(e) => return Err(e),
            },
        };

        let mut vm = match VirtualMemory::open_with(&store_path, logical_size, bootstrap) {
            Ok(vm) => vm,
            Err(e) => {
                println!("Error: {}", e);
                println!("You have to get access one more time\n");
                continue;
            }
        };
        println!("VirtualMemory created successfully.\n");

        match session(&mut editor, &mut vm)? {
            Outcome::Exit => {
                if let Err(e) = vm.close() {
                    println!("Error: {}", e);
                }
                println!("Exiting program.");
                return Ok(());
            }
            Outcome::Failed(e) => {
                println!("Error: {}", e);
                println!("You have to get access one more time\n");
                if let Err(e) = vm.close() {
                    println!("Error: {}", e);
                }
            }
        }
    }
}

fn session(editor: &mut DefaultEditor, vm: &mut VirtualMemory) -> Result<Outcome, CliError> {
    loop {
        println!("\nSelect an option:");
        println!("1. Set element at index");
        println!("2. Read element at index");
        println!("3. Write to all elements");
        println!("4. Show buffer pool");
        println!("5. Exit");

        let option = match read_number::<u32>(editor, "> ") {
            Ok(Some(option)) => option,
            Ok(None) => return Ok(Outcome::Exit),
            Err(CliError::InvalidNumber(_)) => {
                println!("Invalid option selected.");
                continue;
            }
            Err(e) => return Err(e),
        };

        let result = match option {
            1 => set_element(editor, vm)?,
            2 => read_element(editor, vm)?,
            3 => write_all(vm),
            4 => {
                print_pool(vm);
                Ok(())
            }
            5 => return Ok(Outcome::Exit),
            _ => {
                println!("Invalid option selected.");
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => println!("Error: {}", e),
            Err(e) => return Ok(Outcome::Failed(e)),
        }
    }
}

fn set_element(
    editor: &mut DefaultEditor,
    vm: &mut VirtualMemory,
) -> Result<Result<(), VmError>, CliError> {
    let Some(index) = prompt_or_skip::<i64>(editor, "Enter index: ")? else {
        return Ok(Ok(()));
    };
    let Some(value) = prompt_or_skip::<i32>(editor, "Enter element value: ")? else {
        return Ok(Ok(()));
    };

    Ok(vm.set(index, value).map(|()| {
        println!("Element at index {} set to {}.", index, value);
    }))
}

fn read_element(
    editor: &mut DefaultEditor,
    vm: &mut VirtualMemory,
) -> Result<Result<(), VmError>, CliError> {
    let Some(index) = prompt_or_skip::<i64>(editor, "Enter index: ")? else {
        return Ok(Ok(()));
    };

    Ok(vm.get(index).map(|value| {
        println!("Element at index {}: {}.", index, value);
    }))
}

/// Set every element to its own index
fn write_all(vm: &mut VirtualMemory) -> Result<(), VmError> {
    let size = vm.logical_size();
    if !bulk_write_fits(size) {
        println!(
            "Bulk write supports at most {} elements, this array has {}.",
            BULK_WRITE_LIMIT, size
        );
        return Ok(());
    }

    let small_step = (size / 10).max(1);
    println!("Writing...");

    for index in 0..size {
        let value = i32::try_from(index).map_err(|_| VmError::SizeTooLarge(size))?;
        vm.set(i64::from(value), value)?;
        if index % PROGRESS_STEP == 0 || (size < 1_000_000 && index % small_step == 0) {
            print!("█");
            let _ = io::stdout().flush();
        }
    }

    println!("\nAll elements have been written to.");
    Ok(())
}

fn bulk_write_fits(size: u64) -> bool {
    size <= BULK_WRITE_LIMIT
}

fn print_pool(vm: &VirtualMemory) {
    let mut table = Table::new();
    table.add_row(row!["Slot", "Page", "Last touch", "Dirty"]);

    for (index, slot) in vm.slots().iter().enumerate() {
        match slot.page() {
            Some(page) => table.add_row(row![
                index,
                page.number(),
                page.last_touch(),
                page.is_dirty()
            ]),
            None => table.add_row(row![index, "-", "-", "-"]),
        };
    }

    table.printstd();
    println!(
        "{} pages, {} elements, {} physical accesses",
        vm.page_count(),
        vm.logical_size(),
        vm.access_count()
    );
}

/// Read one line; `None` on Ctrl-C or Ctrl-D
fn read_line(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>, CliError> {
    match editor.readline(prompt) {
        Ok(line) => {
            let line = line.trim().to_string();
            if !line.is_empty() {
                let _ = editor.add_history_entry(line.as_str());
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_number<T: std::str::FromStr>(
    editor: &mut DefaultEditor,
    prompt: &str,
) -> Result<Option<T>, CliError> {
    match read_line(editor, prompt)? {
        Some(line) => line
            .parse()
            .map(Some)
            .map_err(|_| CliError::InvalidNumber(line)),
        None => Ok(None),
    }
}

/// Like `read_number`, but bad input and Ctrl-C just cancel the command
fn prompt_or_skip<T: std::str::FromStr>(
    editor: &mut DefaultEditor,
    prompt: &str,
) -> Result<Option<T>, CliError> {
    match read_number(editor, prompt) {
        Ok(value) => Ok(value),
        Err(CliError::InvalidNumber(input)) => {
            println!("Invalid number: {:?}", input);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positional_path_and_size() {
        let args = Args::try_parse_from(["pagevm", "data.vm", "--size", "2000000"]).unwrap();
        assert_eq!(args.path, Some(PathBuf::from("data.vm")));
        assert_eq!(args.size, Some(2_000_000));
        assert!(!args.prefetch);
    }

    #[test]
    fn test_parse_without_arguments() {
        let args = Args::try_parse_from(["pagevm"]).unwrap();
        assert_eq!(args.path, None);
        assert_eq!(args.size, None);
    }

    #[test]
    fn test_parse_prefetch_flag() {
        let args = Args::try_parse_from(["pagevm", "-s", "10", "--prefetch"]).unwrap();
        assert_eq!(args.size, Some(10));
        assert!(args.prefetch);
    }

    #[test]
    fn test_reject_negative_size() {
        assert!(Args::try_parse_from(["pagevm", "--size", "-5"]).is_err());
    }

    #[test]
    fn test_write_all_sets_every_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bulk.vm");

        let mut vm = VirtualMemory::open(&path, 400).unwrap();
        write_all(&mut vm).unwrap();
        vm.close().unwrap();

        let mut vm = VirtualMemory::open(&path, 400).unwrap();
        for index in [0i64, 1, 123, 124, 250, 399] {
            assert_eq!(vm.get(index).unwrap(), index as i32);
        }
    }

    #[test]
    fn test_bulk_write_limit() {
        assert!(bulk_write_fits(0));
        assert!(bulk_write_fits(400));
        // Last index is i32::MAX
        assert!(bulk_write_fits(i32::MAX as u64 + 1));
        // Index 2^31 would wrap to i32::MIN
        assert!(!bulk_write_fits(i32::MAX as u64 + 2));
        assert!(!bulk_write_fits(u64::MAX));
    }
}
