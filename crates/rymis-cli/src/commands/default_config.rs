//! Default-config command implementation.

use anyhow::Result;

use super::common::RunFile;

/// Print the default run file as YAML.
pub fn execute() -> Result<()> {
    print!("{}", serde_yaml_ng::to_string(&RunFile::default())?);
    Ok(())
}
