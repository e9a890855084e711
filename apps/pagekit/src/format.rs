const SIZE_UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB"];

/// Human-readable file size, base 1024, at most two decimals.
/// `0` → "0 Bytes", `1536` → "1.5 KB".
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut size = bytes as f64;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{size:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Icon class for a file listing entry, chosen by extension.
pub fn file_icon(file_name: &str) -> &'static str {
    match extension(file_name).as_str() {
        "pdf" => "bi-file-earmark-pdf",
        "doc" | "docx" => "bi-file-earmark-word",
        "xls" | "xlsx" => "bi-file-earmark-excel",
        "ppt" | "pptx" => "bi-file-earmark-ppt",
        "jpg" | "jpeg" | "png" => "bi-file-earmark-image",
        "txt" => "bi-file-earmark-text",
        "csv" => "bi-file-earmark-spreadsheet",
        _ => "bi-file-earmark",
    }
}

/// Best-effort MIME type for an upload, from the file name's extension.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    match extension(file_name).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
