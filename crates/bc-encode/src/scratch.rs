//! Per-request scratch files.
//!
//! A [`ScratchPair`] owns the input file an upload is written to and the
//! output path the encoder writes. Both live in the scratch directory under
//! `tempfile`-generated names, so concurrent requests sharing one directory
//! never collide, and both are removed when the pair is dropped, whatever
//! path the request took.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

const INPUT_PREFIX: &str = "bc-in-";
const OUTPUT_PREFIX: &str = "bc-out-";

/// The (input, output) scratch paths owned by one conversion.
///
/// The input file is created by [`ScratchPair::new`]. The output is only a
/// reserved name: `bc-out-<same random part>.<ext>`, left for the encoder to
/// create. Dropping the pair deletes whichever of the two exists.
///
/// # Example
///
/// ```no_run
/// use bc_encode::ScratchPair;
///
/// # async fn example() -> bc_core::Result<()> {
/// let (scratch, mut input) = ScratchPair::new(&std::env::temp_dir(), Some("mp3"), "opus")?;
/// // ... write the upload into `input`, run the encoder on scratch.input() / scratch.output() ...
/// drop(scratch); // both files are gone
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScratchPair {
    input: TempPath,
    output: TempPath,
}

impl ScratchPair {
    /// Create a fresh input file inside `dir` and reserve the matching
    /// output name. Returns the pair and the input opened for writing.
    ///
    /// `input_ext` is kept (sanitized) so the encoder can tell formats apart
    /// by extension.
    pub fn new(
        dir: &Path,
        input_ext: Option<&str>,
        output_ext: &str,
    ) -> bc_core::Result<(Self, tokio::fs::File)> {
        let input_suffix = suffix(input_ext);
        let named = Builder::new()
            .prefix(INPUT_PREFIX)
            .suffix(&input_suffix)
            .tempfile_in(dir)?;
        let (file, input) = named.into_parts();

        let output = TempPath::from_path(output_path(&input, &input_suffix, output_ext));

        tracing::trace!(
            input = %input.display(),
            output = %output.display(),
            "Scratch pair created"
        );

        Ok((Self { input, output }, tokio::fs::File::from_std(file)))
    }

    /// Path the upload is written to.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Path the encoder writes to.
    pub fn output(&self) -> &Path {
        &self.output
    }
}

/// `bc-out-<random>.<ext>` next to `bc-in-<random>.<input ext>`.
fn output_path(input: &Path, input_suffix: &str, output_ext: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let random = name
        .strip_prefix(INPUT_PREFIX)
        .and_then(|n| n.strip_suffix(input_suffix))
        .unwrap_or(&name);

    input.with_file_name(format!("{OUTPUT_PREFIX}{random}{}", suffix(Some(output_ext))))
}

fn suffix(ext: Option<&str>) -> String {
    ext.and_then(sanitize_extension)
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Keep short alphanumeric extensions only, lowercased.
fn sanitize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn paths_live_in_dir_with_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let (pair, _file) = ScratchPair::new(dir.path(), Some("MP3"), "opus").unwrap();

        assert!(pair.input().starts_with(dir.path()));
        assert!(pair.output().starts_with(dir.path()));
        assert_eq!(pair.input().extension().unwrap(), "mp3");
        assert_eq!(pair.output().extension().unwrap(), "opus");
        assert!(pair.input().exists());
        assert!(!pair.output().exists());
    }

    #[tokio::test]
    async fn output_shares_random_part_with_input() {
        let dir = tempfile::tempdir().unwrap();
        let (pair, _file) = ScratchPair::new(dir.path(), Some("wav"), "opus").unwrap();

        let input = pair.input().file_name().unwrap().to_string_lossy().to_string();
        let output = pair.output().file_name().unwrap().to_string_lossy().to_string();
        let random = input
            .strip_prefix("bc-in-")
            .and_then(|n| n.strip_suffix(".wav"))
            .unwrap();
        assert!(!random.is_empty());
        assert_eq!(output, format!("bc-out-{random}.opus"));
    }

    #[tokio::test]
    async fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _fa) = ScratchPair::new(dir.path(), None, "opus").unwrap();
        let (b, _fb) = ScratchPair::new(dir.path(), None, "opus").unwrap();
        assert_ne!(a.input(), b.input());
        assert_ne!(a.output(), b.output());
    }

    #[tokio::test]
    async fn unsafe_extension_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let (pair, _file) = ScratchPair::new(dir.path(), Some("../../etc"), "opus").unwrap();
        assert!(pair.input().extension().is_none());
        assert_eq!(pair.input().parent().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScratchPair::new(&dir.path().join("missing"), None, "opus").unwrap_err();
        assert!(matches!(err, bc_core::Error::Io { .. }));
    }

    #[tokio::test]
    async fn drop_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let (pair, mut file) = ScratchPair::new(dir.path(), Some("wav"), "opus").unwrap();
        file.write_all(b"RIFF").await.unwrap();
        file.flush().await.unwrap();
        drop(file);
        std::fs::write(pair.output(), b"OggS").unwrap();

        let (input, output) = (pair.input().to_path_buf(), pair.output().to_path_buf());
        assert_eq!(std::fs::read(&input).unwrap(), b"RIFF");
        assert!(output.exists());

        drop(pair);
        assert!(!input.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn drop_tolerates_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let (pair, file) = ScratchPair::new(dir.path(), Some("mp3"), "opus").unwrap();
        drop(file);
        drop(pair);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sanitize_extension_rules() {
        assert_eq!(sanitize_extension(".Flac").as_deref(), Some("flac"));
        assert_eq!(sanitize_extension(""), None);
        assert_eq!(sanitize_extension("tar.gz"), None);
        assert_eq!(sanitize_extension("verylongext"), None);
    }
}
