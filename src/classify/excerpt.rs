//! Diagnostic trimming and render-host problem detection

const ERROR_LINE_MARKERS: &[&str] = &["Error", "Traceback", "Exception", "error:"];

const MAX_EXCERPT_LINES: usize = 30;

const MAX_EXCERPT_CHARS: usize = 2000;

/// The part of a diagnostic worth showing to the model: everything from the
/// first error-looking line on, capped to the last 30 lines. Falls back to the
/// last 2000 characters when no line looks like an error.
pub fn excerpt(diagnostic: &str) -> String {
    let lines: Vec<&str> = diagnostic.lines().collect();

    if let Some(start) = lines
        .iter()
        .position(|line| ERROR_LINE_MARKERS.iter().any(|m| line.contains(m)))
    {
        let relevant = &lines[start..];
        let from = relevant.len().saturating_sub(MAX_EXCERPT_LINES);
        return relevant[from..].join("\n");
    }

    tail_chars(diagnostic, MAX_EXCERPT_CHARS).to_string()
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Detect failures caused by the render host rather than the code: missing
/// ffmpeg, a missing or broken LaTeX install, or another required program
/// that cannot be found. Returns a message for the user.
pub fn environment_problem(diagnostic: &str) -> Option<String> {
    let lower = diagnostic.to_lowercase();

    if diagnostic.contains("FileNotFoundError") && lower.contains("ffmpeg") {
        return Some("ffmpeg not found. Install ffmpeg and make sure it is on PATH.".to_string());
    }

    if lower.contains("latex error converting to") || lower.contains("latex: not found") {
        return Some("LaTeX compilation failed. LaTeX is not installed or is missing packages.".to_string());
    }

    if diagnostic.contains("FileNotFoundError") && diagnostic.contains("[Errno 2]") {
        if let Some(program) = missing_program(diagnostic) {
            return Some(format!(
                "Required program not found: '{}'. Make sure ffmpeg and LaTeX are installed.",
                program
            ));
        }
    }

    None
}

/// Name quoted after `FileNotFoundError`, when it looks like a bare program
/// name. Paths and file names are missing assets the code refers to.
fn missing_program(diagnostic: &str) -> Option<&str> {
    let start = diagnostic.find("FileNotFoundError")?;
    let rest = &diagnostic[start..];
    let open = rest.find('\'')?;
    let rest = &rest[open + 1..];
    let close = rest.find('\'')?;
    let name = &rest[..close];

    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains('.') {
        return None;
    }
    Some(name)
}
