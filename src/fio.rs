use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};

use crate::error::{Error, Result};

fn access_error(path: &Path, message: &str) -> Error {
    Error::FileAccess {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

static NO_RW: &str = "The current user does not have read/write permissions to access this file.";

/// Checks that the current user can read `path`.
pub fn is_readable(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|_| access_error(path, "File not found!"))?;
    let readable = if metadata.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        File::open(path).is_ok()
    };
    if !readable {
        return Err(access_error(
            path,
            "The current user does not have read permissions to access this file.",
        ));
    }
    Ok(())
}

/// Checks that the current user can read and modify `path`.
///
/// Files are opened for reading and writing, without truncating them.
/// Directories must accept a new (immediately deleted) file. A path whose
/// write bits are all cleared is refused even for the superuser.
pub fn is_rw(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|_| access_error(path, "File not found!"))?;
    if metadata.permissions().readonly() {
        return Err(access_error(path, NO_RW));
    }

    let accessible = if metadata.is_dir() {
        fs::read_dir(path).is_ok() && tempfile::tempfile_in(path).is_ok()
    } else {
        OpenOptions::new().read(true).write(true).open(path).is_ok()
    };
    if !accessible {
        return Err(access_error(path, NO_RW));
    }
    Ok(())
}
