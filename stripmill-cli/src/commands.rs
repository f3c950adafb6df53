//! Command execution.

use crate::Commands;
use colored::Colorize;
use std::path::{Path, PathBuf};
use stripmill_client::{parse_size, preprocess, BatchResult, Client};
use stripmill_core::OperationKind;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Operations => Ok(format_operations()),

        Commands::Process {
            operation,
            resize,
            out_dir,
            files,
        } => {
            let size = match resize.as_deref() {
                Some(s) => Some(parse_size(s).ok_or_else(|| format!("invalid size: {}", s))?),
                None => None,
            };

            if OperationKind::parse(&operation).is_identity() {
                eprintln!(
                    "{}: unknown operation {}, images will come back unchanged",
                    "Warning".yellow(),
                    operation.cyan()
                );
            }

            let mut images = Vec::with_capacity(files.len());
            for file in &files {
                let bytes = std::fs::read(file)
                    .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
                images.push(preprocess(&bytes, size)?);
            }

            let result = client.process(&operation, images).await?;
            let written = write_outputs(&out_dir, &result)?;
            Ok(format_result(&operation, &result, &written))
        }
    }
}

/// Writes each response as `processed_<i>.png` and returns the paths.
pub fn write_outputs(out_dir: &Path, result: &BatchResult) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(result.images.len());
    for (i, image) in result.images.iter().enumerate() {
        let path = out_dir.join(format!("processed_{}.png", i));
        std::fs::write(&path, image)?;
        written.push(path);
    }
    Ok(written)
}

fn format_result(operation: &str, result: &BatchResult, written: &[PathBuf]) -> String {
    let mut output = String::new();
    for path in written {
        output.push_str(&format!("{} {}\n", "Wrote".green(), path.display()));
    }

    if result.is_complete() {
        output.push_str(&format!(
            "{} {} image(s) with {}",
            "Processed".green().bold(),
            result.requested,
            operation.cyan()
        ));
    } else {
        output.push_str(&format!(
            "{} {} of {} image(s) came back, {} missing",
            "Partial".yellow().bold(),
            result.images.len(),
            result.requested,
            result.missing()
        ));
    }
    output
}

fn format_operations() -> String {
    OperationKind::KNOWN
        .iter()
        .map(|op| format!("  {}", op.as_str().cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn responses(requested: usize, got: &[&'static [u8]]) -> BatchResult {
        BatchResult {
            requested,
            images: got.iter().map(|b| (*b).into()).collect(),
        }
    }

    #[test]
    fn test_write_outputs() {
        let dir = TempDir::new().unwrap();
        let result = responses(2, &[b"first", b"second"]);

        let written = write_outputs(dir.path(), &result).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("processed_0.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join("processed_1.png")).unwrap(), b"second");
    }

    #[test]
    fn test_format_partial() {
        colored::control::set_override(false);
        let result = responses(3, &[b"x"]);
        let output = format_result("blur", &result, &[]);
        assert!(output.contains("1 of 3"));
        assert!(output.contains("2 missing"));
    }

    #[test]
    fn test_format_operations_lists_all() {
        colored::control::set_override(false);
        let output = format_operations();
        for op in OperationKind::KNOWN.iter() {
            assert!(output.contains(op.as_str()));
        }
        assert_eq!(output.lines().count(), 6);
    }
}
