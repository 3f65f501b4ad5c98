//! Output file naming: `<slug>_v<version>.mp4`

use std::io;
use std::path::{Path, PathBuf};

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "that", "which", "with", "and", "or", "of", "for", "to", "in", "on", "at", "by", "is", "it",
    "its", "my", "me", "this", "from", "into", "about", "some", "very", "really",
];

const MAX_SLUG_WORDS: usize = 4;

const FALLBACK_SLUG: &str = "animation";

/// Short snake_case name for a description.
///
/// "a spinning blue circle" becomes `spinning_blue_circle`.
pub fn slug_from_description(description: &str) -> String {
    let cleaned: String = description
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !FILLER_WORDS.contains(w))
        .take(MAX_SLUG_WORDS)
        .collect();

    if words.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        words.join("_")
    }
}

pub fn versioned_file_name(slug: &str, version: u32) -> String {
    format!("{}_v{}.mp4", slug, version)
}

/// First version at or after `from` whose file does not exist in `dir`
pub fn next_free_version(dir: &Path, slug: &str, from: u32) -> u32 {
    let mut version = from.max(1);
    while dir.join(versioned_file_name(slug, version)).exists() {
        version += 1;
    }
    version
}

/// Create the first free `<slug>_v<N>.mp4` in `dir` at or after `from`.
///
/// The file is opened with `create_new`, so two writers racing for one name
/// never share it: the loser moves on to the next version. Returns the path
/// actually claimed along with the empty, open file.
pub async fn claim_versioned_file(dir: &Path, slug: &str, from: u32) -> io::Result<(PathBuf, tokio::fs::File)> {
    let mut version = from.max(1);
    loop {
        let path = dir.join(versioned_file_name(slug, version));
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                version = version
                    .checked_add(1)
                    .ok_or_else(|| io::Error::other(format!("no free version left for {}", slug)))?;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slug_drops_filler_words() {
        assert_eq!(slug_from_description("a spinning blue circle"), "spinning_blue_circle");
        assert_eq!(
            slug_from_description("Show the Pythagorean theorem with animation"),
            "show_pythagorean_theorem_animation"
        );
    }

    #[test]
    fn test_slug_keeps_four_words() {
        assert_eq!(
            slug_from_description("a blue circle that morphs into a red square"),
            "blue_circle_morphs_red"
        );
    }

    #[test]
    fn test_slug_strips_punctuation() {
        assert_eq!(slug_from_description("sin(x) + cos(x)!"), "sinx_cosx");
    }

    #[test]
    fn test_slug_fallback() {
        assert_eq!(slug_from_description("the a an"), "animation");
        assert_eq!(slug_from_description("!!!"), "animation");
        assert_eq!(slug_from_description(""), "animation");
    }

    #[test]
    fn test_versioned_file_name() {
        assert_eq!(versioned_file_name("circle", 3), "circle_v3.mp4");
    }

    #[test]
    fn test_next_free_version_skips_existing() {
        let temp = TempDir::new().unwrap();
        assert_eq!(next_free_version(temp.path(), "circle", 1), 1);

        std::fs::write(temp.path().join("circle_v1.mp4"), b"").unwrap();
        std::fs::write(temp.path().join("circle_v2.mp4"), b"").unwrap();
        assert_eq!(next_free_version(temp.path(), "circle", 1), 3);
        assert_eq!(next_free_version(temp.path(), "square", 1), 1);
    }

    #[test]
    fn test_next_free_version_missing_dir() {
        assert_eq!(next_free_version(Path::new("/nonexistent/manimator"), "x", 0), 1);
    }

    #[tokio::test]
    async fn test_claim_skips_and_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("circle_v1.mp4"), b"old").unwrap();

        let (path, _file) = claim_versioned_file(temp.path(), "circle", 1).await.unwrap();
        assert_eq!(path, temp.path().join("circle_v2.mp4"));
        assert_eq!(std::fs::read(temp.path().join("circle_v1.mp4")).unwrap(), b"old");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_claims_get_distinct_names() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();

        let (a, b, c) = tokio::join!(
            claim_versioned_file(dir, "circle", 1),
            claim_versioned_file(dir, "circle", 1),
            claim_versioned_file(dir, "circle", 1),
        );
        let mut paths = vec![a.unwrap().0, b.unwrap().0, c.unwrap().0];
        paths.sort();
        assert_eq!(
            paths,
            vec![dir.join("circle_v1.mp4"), dir.join("circle_v2.mp4"), dir.join("circle_v3.mp4")]
        );
    }

    #[tokio::test]
    async fn test_claim_missing_dir_is_error() {
        let result = claim_versioned_file(Path::new("/nonexistent/manimator"), "x", 1).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
