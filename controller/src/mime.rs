use std::path::Path;

/// Content type for a file name, by extension.
///
/// Unknown or missing extensions yield an empty string.
pub fn lookup(name: &str) -> String {
    mime_guess::from_path(Path::new(name))
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(lookup("test-CASE.csv"), "text/csv");
        assert_eq!(lookup("notes.txt"), "text/plain");
        assert_eq!(lookup("Towsey.Acoustic.zip"), "application/zip");
    }

    #[test]
    fn unknown_or_missing_extension_is_empty() {
        assert_eq!(lookup("README"), "");
        assert_eq!(lookup("weird.notarealextension"), "");
    }
}
