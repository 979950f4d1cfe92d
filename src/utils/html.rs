use ammonia;

/// Clean user-supplied HTML using the ammonia library.
///
/// Post and comment bodies arrive as rich-text HTML. This applies
/// whitelist-based sanitization: safe tags (like <b>, <p>) survive while
/// dangerous tags (like <script>, <iframe>) and event-handler attributes
/// are stripped before the content is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
