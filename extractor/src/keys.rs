/// Characters that are not allowed in output file names on common filesystems.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_TITLE_CHARS: usize = 100;

/// File name for a kept slide.
/// e.g. "slide_0007.jpg"
pub fn slide_file_name(seq: u32, ext: &str) -> String {
    format!("slide_{seq:04}.{ext}")
}

/// ffmpeg output pattern for sampled frames.
/// e.g. "frame_%06d.jpg"
pub fn frame_pattern(ext: &str) -> String {
    format!("frame_%06d.{ext}")
}

/// Scratch directory owned by one run for `title`.
/// e.g. "Lecture 3.slide-deck"
pub fn work_dir_name(title: &str) -> String {
    format!("{title}.slide-deck")
}

/// Turn a video title or file stem into a safe document name: forbidden
/// characters dropped, surrounding whitespace trimmed, capped at 100 chars.
pub fn sanitize_title(title: &str) -> String {
    let clean: String = title.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    clean.trim().chars().take(MAX_TITLE_CHARS).collect()
}

/// PDF file name for a sanitized title, falling back to "slides" when
/// nothing usable is left.
pub fn document_file_name(title: &str) -> String {
    let clean = sanitize_title(title);
    if clean.is_empty() {
        "slides.pdf".into()
    } else {
        format!("{clean}.pdf")
    }
}
