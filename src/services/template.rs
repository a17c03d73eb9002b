use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),
}

/// Substitute `${name}` placeholders with values from `values`.
///
/// `$$` produces a literal `$`; a `$` not followed by `{` or `$` passes
/// through unchanged. A placeholder with no entry in `values` fails the
/// render, which the delivery path treats as a send failure.
pub fn render(template: &str, values: &HashMap<String, String>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            offset += pos + 2;
            rest = stripped;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body
                .find('}')
                .ok_or(RenderError::Unterminated(offset + pos))?;
            let name = &body[..end];
            let value = values
                .get(name)
                .ok_or_else(|| RenderError::UnknownPlaceholder(name.to_string()))?;
            out.push_str(value);
            offset += pos + 2 + end + 1;
            rest = &body[end + 1..];
        } else {
            out.push('$');
            offset += pos + 1;
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}
