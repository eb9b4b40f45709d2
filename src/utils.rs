/// Convert a page URL to a sanitized filename stem
pub fn sanitize_filename(url: &str) -> String {
    // Remove protocol and replace invalid filename characters
    let name = url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/')
        .replace(['/', ':', '?', '&', '=', '#', '%'], "_");

    // Limit filename length
    name.chars().take(100).collect()
}

/// Default file name for a rendered report page
pub fn report_filename(url: &str, page: usize) -> String {
    format!("{}-page-{}.html", sanitize_filename(url), page)
}
