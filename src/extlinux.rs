use std::{fs, path::Path};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    fio,
};

static LABEL_KEYWORDS: [&str; 6] = ["APPEND", "FDT", "FDTDIR", "INITRD", "LINUX", "MENU"];

static DEFAULT_LINUX: &str = "LINUX /boot/Image";
static DEFAULT_INITRD: &str = "INITRD /boot/initrd";
static DEFAULT_APPEND: &str = "APPEND ${cbootargs}";

fn keyword(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Returns the value following `key` (case-insensitive) at the start of `line`.
fn directive<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    line[key.len()..].strip_prefix(' ').map(|v| v.trim_end())
}

/// Adds a boot entry to the contents of an `extlinux.conf` file.
///
/// Any existing entry called `label` is dropped. The kernel, initrd and
/// command line of the new entry are copied from the current default entry.
///
/// # Arguments
///
/// * `contents` - Current contents of the configuration.
/// * `label` - Label of the new entry.
/// * `menu_label` - Label shown in the boot menu.
/// * `dtb` - Device tree the new entry boots with.
/// * `make_default` - Whether to boot the new entry by default.
///
/// # Example
///
/// ```rust
/// use jetson_io::extlinux::add_entry_to;
///
/// let conf = "DEFAULT primary\n\nLABEL primary\n\tLINUX /boot/Image\n";
/// let out = add_entry_to(conf, "JetsonIO", "Custom", "/boot/custom.dtb", true);
/// assert!(out.starts_with("DEFAULT JetsonIO\n"));
/// assert!(out.contains("\tFDT /boot/custom.dtb\n"));
/// ```
pub fn add_entry_to(contents: &str, label: &str, menu_label: &str, dtb: &str, make_default: bool) -> String {
    let entry = format!("LABEL {}", label);
    let mut entry_skip = false;
    let mut default_label: Option<String> = None;
    let mut current_label: Option<String> = None;
    let mut linux = DEFAULT_LINUX.to_string();
    let mut initrd = DEFAULT_INITRD.to_string();
    let mut append = DEFAULT_APPEND.to_string();
    let mut out: Vec<String> = Vec::new();

    for line in contents.split_inclusive('\n') {
        // copy LINUX/INITRD/APPEND of the default entry into the new one
        match &default_label {
            None => default_label = directive(line, "DEFAULT").map(String::from),
            Some(_) => {
                if let Some(name) = directive(line, "LABEL") {
                    current_label = Some(name.to_string());
                }
            }
        }

        if current_label.is_some() && current_label == default_label {
            match keyword(line) {
                Some("LINUX") => linux = line.trim().to_string(),
                Some("INITRD") => initrd = line.trim().to_string(),
                Some("APPEND") => append = line.trim().to_string(),
                _ => {}
            }
        }

        let line = if make_default && line.starts_with("DEFAULT ") {
            let eol = if line.ends_with('\n') { "\n" } else { "" };
            format!("DEFAULT {}{}", label, eol)
        } else {
            line.to_string()
        };

        if line.trim() == entry {
            entry_skip = true;
            continue;
        }

        if entry_skip {
            match keyword(&line) {
                None => continue,
                Some(word) if word.starts_with('#') => continue,
                Some(word) if LABEL_KEYWORDS.contains(&word) => continue,
                Some(_) => entry_skip = false,
            }
        }

        out.push(line);
    }

    let mut result: String = out.concat();
    if !result.is_empty() && !result.ends_with('\n') {
        result.push('\n');
    }
    // keep a blank line between entries
    if !result.is_empty() && !result.ends_with("\n\n") {
        result.push('\n');
    }

    result.push_str(&format!(
        "LABEL {}\n\tMENU LABEL {}\n\t{}\n\tFDT {}\n\t{}\n\t{}\n",
        label, menu_label, linux, dtb, initrd, append
    ));

    result
}

/// Adds a boot entry to the `extlinux.conf` file at `path`.
///
/// The original file is saved once as `<path>.backup` before the first
/// modification. See [`add_entry_to`] for the arguments.
pub fn add_entry<P: AsRef<Path>>(path: P, label: &str, menu_label: &str, dtb: &Path, make_default: bool) -> Result<()> {
    let path = path.as_ref();
    fio::is_rw(path)?;

    let mut backup = path.as_os_str().to_owned();
    backup.push(".backup");
    let backup = Path::new(&backup);
    if !backup.exists() {
        debug!("saving {} to {}", path.display(), backup.display());
        fs::copy(path, backup)?;
    }

    let contents = fs::read_to_string(path).map_err(|e| Error::FileAccess {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let updated = add_entry_to(&contents, label, menu_label, &dtb.to_string_lossy(), make_default);
    fs::write(path, updated)?;
    info!("added boot entry {} to {}", label, path.display());

    Ok(())
}
