//! Rewrites disassembly dumps into hex pair files.
//!
//! Every `<address>: <word> ...` line of a `*.dump` file becomes a
//! `0x<address> <word>` line of a sibling file whose name has `dump` replaced
//! by `hex`. The digits are copied as they appear in the dump.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};
use log::*;

use crate::program::parse::split_dump_line;

/// Extension of the files picked up by [`convert_all`]
pub const DUMP_EXTENSION: &str = "dump";

/// Converts the text of a dump into hex pair lines
pub fn dump_to_hex(dump: &str) -> String {
    dump.lines()
        .filter_map(split_dump_line)
        .map(|(address, word)| format!("0x{} {}\n", address, word))
        .collect()
}

/// Path of the hex file written for `dump`
pub fn hex_path(dump: &Path) -> Result<PathBuf> {
    let name = dump
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| eyre!("`{}` has no file name", dump.display()))?;

    Ok(dump.with_file_name(name.replace(DUMP_EXTENSION, "hex")))
}

/// Converts a single dump file. Returns the path of the written hex file.
pub fn convert(dump: &Path) -> Result<PathBuf> {
    let output = hex_path(dump)?;
    if output == dump {
        return Err(eyre!(
            "`{}` would be overwritten by its own conversion",
            dump.display()
        ));
    }

    let data = fs::read_to_string(dump)
        .wrap_err_with(|| format!("Failed to read `{}`", dump.display()))?;
    fs::write(&output, dump_to_hex(&data))
        .wrap_err_with(|| format!("Failed to write `{}`", output.display()))?;

    Ok(output)
}

/// Converts every `*.dump` file below `directory`, in sorted order. Returns
/// the paths of the written hex files.
pub fn convert_all(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut dumps = Vec::new();
    collect_dumps(directory, &mut dumps)?;
    dumps.sort();

    let mut converted = Vec::with_capacity(dumps.len());
    for dump in dumps {
        info!("Converting {} to HEX...", dump.display());
        let output = convert(&dump)?;
        info!("Conversion complete for {}", dump.display());
        converted.push(output);
    }

    Ok(converted)
}

fn collect_dumps(directory: &Path, dumps: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(directory)
        .wrap_err_with(|| format!("Failed to read directory `{}`", directory.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_dumps(&path, dumps)?;
        } else if path.extension().map_or(false, |ext| ext == DUMP_EXTENSION) {
            dumps.push(path);
        }
    }

    Ok(())
}
