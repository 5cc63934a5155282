/// Content type for a URI or file name, by extension.
///
/// Text types carry an explicit UTF-8 charset.
pub fn content_type_for(name: &str) -> String {
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if mime.essence_str() == "application/javascript" {
        "text/javascript; charset=utf-8".to_owned()
    } else if mime.type_() == mime_guess::mime::TEXT && mime.get_param("charset").is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}
