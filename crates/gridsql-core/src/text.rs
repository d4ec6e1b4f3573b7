//! Small SQL text helpers that do not need a parser

/// Split the first whitespace-delimited field off `text`.
///
/// Double quotes group whitespace into the field and are removed from it
/// (`""` stands for a literal quote). The remainder keeps its leading
/// whitespace.
pub fn cut_field(text: &str) -> (String, &str) {
    let text = text.trim_start();
    let mut quoted = false;
    let mut end = text.len();
    for (i, c) in text.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if !quoted && c.is_whitespace() {
            end = i;
            break;
        }
    }
    let field = text[..end].replace("\"\"", "\u{0}").replace('"', "").replace('\u{0}', "\"");
    (field, &text[end..])
}

/// First keyword of `sql`, upper-cased, with a trailing `;` stripped
pub fn first_keyword(sql: &str) -> String {
    let (word, _) = cut_field(sql);
    word.trim_end_matches(';').to_ascii_uppercase()
}
