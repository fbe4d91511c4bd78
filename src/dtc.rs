use std::{
    env,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tracing::debug;

use crate::error::{Error, Result};

static DEVICE_TREE_TOOLS: [&str; 4] = ["dtc", "fdtoverlay", "fdtget", "fdtput"];

/// Specifies the type of a property value written with [`DeviceTree::set_prop_value`].
///
/// * `String` - A NUL terminated string
/// * `U32` - A 32-bit cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    String,
    U32,
}

impl PropType {
    /// Returns the `fdtput -t` type code.
    pub fn to_str(&self) -> &str {
        match self {
            PropType::String => "s",
            PropType::U32 => "u",
        }
    }
}

/// Access to compiled device-tree blobs (`.dtb` / `.dtbo` files).
///
/// Node paths follow the `fdtget` convention: the root is `/` and child
/// paths are built as `<parent><child>/`.
pub trait DeviceTree {
    /// Lists the names of the child nodes of `node`.
    fn get_child_nodes(&self, blob: &Path, node: &str) -> Result<Vec<String>>;

    /// Lists the names of the properties of `node`.
    fn get_child_props(&self, blob: &Path, node: &str) -> Result<Vec<String>>;

    /// Returns the `index`-th value of `prop`, or `None` if either the
    /// property or the value doesn't exist.
    fn get_prop_value(&self, blob: &Path, node: &str, prop: &str, index: usize) -> Result<Option<String>>;

    /// Writes `value` to `prop`, creating the property if needed.
    fn set_prop_value(&self, blob: &Path, node: &str, kind: PropType, prop: &str, value: &str) -> Result<()>;

    /// Deletes `node` and everything below it.
    fn remove_node(&self, blob: &Path, node: &str) -> Result<()>;

    /// Merges `overlays` onto `base` and writes the result to `out`.
    fn apply_overlay(&self, base: &Path, out: &Path, overlays: &[&Path]) -> Result<()>;

    /// Returns the paths of every node below `node` that carries `prop`.
    ///
    /// Nodes are visited depth first; children are reported before their
    /// parent.
    fn find_nodes_with_prop(&self, blob: &Path, node: &str, prop: &str) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for child in self.get_child_nodes(blob, node)? {
            let path = format!("{}{}/", node, child);
            matches.extend(self.find_nodes_with_prop(blob, &path, prop)?);
            if self.get_child_props(blob, &path)?.iter().any(|p| p == prop) {
                matches.push(path);
            }
        }
        Ok(matches)
    }

    fn get_compatible(&self, blob: &Path) -> Result<Option<String>> {
        self.get_prop_value(blob, "/", "compatible", 0)
    }

    fn get_model(&self, blob: &Path) -> Result<Option<String>> {
        self.get_prop_value(blob, "/", "model", 0)
    }
}

/// [`DeviceTree`] implementation backed by the `fdtget`, `fdtput` and
/// `fdtoverlay` command line tools.
///
/// Every call is a blocking invocation of the external tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct FdtTools;

impl FdtTools {
    pub fn new() -> Self {
        FdtTools
    }
}

fn files_exist(files: &[&Path]) -> Result<()> {
    for f in files {
        if !f.exists() {
            return Err(Error::FileAccess {
                path: f.to_path_buf(),
                message: String::from("File not found!"),
            });
        }
    }
    Ok(())
}

fn describe(command: &Command) -> String {
    let mut line = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

fn run(command: &mut Command) -> Result<Output> {
    let line = describe(command);
    debug!("running {}", line);
    command.output().map_err(|e| Error::ToolInvocation {
        command: line,
        message: e.to_string(),
    })
}

fn run_checked(command: &mut Command) -> Result<String> {
    let output = run(command)?;
    if !output.status.success() {
        return Err(Error::ToolInvocation {
            command: describe(command),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

impl DeviceTree for FdtTools {
    fn get_child_nodes(&self, blob: &Path, node: &str) -> Result<Vec<String>> {
        files_exist(&[blob])?;
        let out = run_checked(Command::new("fdtget").arg("-l").arg(blob).arg(node))?;
        Ok(lines(&out))
    }

    fn get_child_props(&self, blob: &Path, node: &str) -> Result<Vec<String>> {
        files_exist(&[blob])?;
        let out = run_checked(Command::new("fdtget").arg("-p").arg(blob).arg(node))?;
        Ok(lines(&out))
    }

    fn get_prop_value(&self, blob: &Path, node: &str, prop: &str, index: usize) -> Result<Option<String>> {
        files_exist(&[blob])?;
        // fdtget exits non-zero when the property is missing
        let output = run(Command::new("fdtget").arg(blob).arg(node).arg(prop))?;
        if !output.status.success() {
            return Ok(None);
        }
        let values = lines(&String::from_utf8_lossy(&output.stdout));
        Ok(values.into_iter().nth(index))
    }

    fn set_prop_value(&self, blob: &Path, node: &str, kind: PropType, prop: &str, value: &str) -> Result<()> {
        files_exist(&[blob])?;
        run_checked(
            Command::new("fdtput")
                .arg("-t")
                .arg(kind.to_str())
                .arg(blob)
                .arg(node)
                .arg(prop)
                .arg(value),
        )?;
        Ok(())
    }

    fn remove_node(&self, blob: &Path, node: &str) -> Result<()> {
        files_exist(&[blob])?;
        run_checked(Command::new("fdtput").arg("-r").arg(blob).arg(node))?;
        Ok(())
    }

    fn apply_overlay(&self, base: &Path, out: &Path, overlays: &[&Path]) -> Result<()> {
        files_exist(&[base])?;
        files_exist(overlays)?;
        run_checked(
            Command::new("fdtoverlay")
                .arg("-i")
                .arg(base)
                .arg("-o")
                .arg(out)
                .args(overlays),
        )?;
        Ok(())
    }
}

fn find_in_path(tool: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}

/// Checks that the device-tree compiler tools are installed.
///
/// Call this once before touching any blob with [`FdtTools`].
pub fn check_tools() -> Result<()> {
    for tool in DEVICE_TREE_TOOLS {
        match find_in_path(tool) {
            Some(path) => debug!("found {} at {}", tool, path.display()),
            None => return Err(Error::MissingTool(tool.to_string())),
        }
    }
    Ok(())
}
