use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reads a system prompt from `path`, trimming surrounding whitespace.
/// An empty file is rejected.
pub fn load_system_prompt(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read system prompt file: {}", path.display()))?;

    let prompt = content.trim();
    if prompt.is_empty() {
        anyhow::bail!("System prompt file is empty: {}", path.display());
    }
    Ok(prompt.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_system_prompt_successfully() -> Result<()> {
        // 1. Arrange: Create a temporary prompt file with surrounding whitespace.
        let dir = tempdir()?;
        let path = dir.path().join("prompt.md");
        let mut file = File::create(&path)?;
        writeln!(file, "\n  You are a patient tutor. Keep answers short.  \n")?;

        // 2. Act: Load the prompt.
        let prompt = load_system_prompt(&path)?;

        // 3. Assert: The text is trimmed.
        assert_eq!(prompt, "You are a patient tutor. Keep answers short.");

        Ok(())
    }

    #[test]
    fn test_load_system_prompt_from_nonexistent_file() {
        // Arrange: Path to a file that does not exist.
        let path = Path::new("nonexistent_prompt_for_testing.md");

        // Act: Call the function.
        let result = load_system_prompt(path);

        // Assert: The function should return an error.
        assert!(result.is_err());
    }

    #[test]
    fn test_load_system_prompt_from_blank_file() -> Result<()> {
        // Arrange: Create a file containing only whitespace.
        let dir = tempdir()?;
        let path = dir.path().join("blank.md");
        fs::write(&path, "   \n\t\n")?;

        // Act: Call the function.
        let result = load_system_prompt(&path);

        // Assert: Blank prompts are rejected.
        assert!(result.is_err());

        Ok(())
    }
}
