use crate::error::{QaError, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Reads a whole UTF-8 text file into memory.
pub async fn load_document<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            log::info!("Loaded {} ({} bytes)", path.display(), text.len());
            Ok(text)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(QaError::FileNotFound(path.to_path_buf())),
        Err(e) => Err(QaError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file() {
        let path = std::env::temp_dir().join(format!("missing-{}.txt", uuid::Uuid::new_v4()));
        match load_document(&path).await {
            Err(QaError::FileNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_whole_file() {
        let path = std::env::temp_dir().join(format!("speech-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "Madam Speaker.\n\nMembers of Congress.").await.unwrap();

        let text = load_document(&path).await.unwrap();
        assert_eq!(text, "Madam Speaker.\n\nMembers of Congress.");

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
