/// Default attachment size ceiling.
pub const MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

const ACCEPTED_EXTENSIONS: [&str; 24] = [
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "gif", "bmp",
    "tiff", "webp", "txt", "rtf", "csv", "json", "xml", "zip", "rar", "7z", "tar", "gz",
];

/// Replace path separators so a hostile filename cannot escape the claim's
/// attachment folder.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.trim();
    let sanitized: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if sanitized.is_empty() {
        "attachment".to_string()
    } else {
        sanitized
    }
}

/// Admission rule: accepted extension and within the size ceiling. Everything
/// else is silently dropped by the ingress.
pub fn is_admissible(filename: &str, size: u64, max_size: u64) -> bool {
    if size > max_size {
        return false;
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            ACCEPTED_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_documents_images_and_archives() {
        for name in ["report.pdf", "notes.TXT", "photo.JPEG", "bundle.tar", "data.7z"] {
            assert!(is_admissible(name, 1024, MAX_ATTACHMENT_SIZE), "{name}");
        }
    }

    #[test]
    fn rejects_unknown_extensions_and_extensionless_names() {
        assert!(!is_admissible("malware.exe", 10, MAX_ATTACHMENT_SIZE));
        assert!(!is_admissible("script.sh", 10, MAX_ATTACHMENT_SIZE));
        assert!(!is_admissible("README", 10, MAX_ATTACHMENT_SIZE));
        assert!(!is_admissible(".gitignore", 10, MAX_ATTACHMENT_SIZE));
    }

    #[test]
    fn rejects_oversized_attachments() {
        assert!(is_admissible("report.pdf", MAX_ATTACHMENT_SIZE, MAX_ATTACHMENT_SIZE));
        assert!(!is_admissible("report.pdf", MAX_ATTACHMENT_SIZE + 1, MAX_ATTACHMENT_SIZE));
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd.txt"), ".._.._etc_passwd.txt");
        assert_eq!(sanitize_filename("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_filename(""), "attachment");
    }
}
