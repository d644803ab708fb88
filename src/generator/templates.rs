//! Embedded code templates and the minijinja environment that renders them.

use crate::error::GeneratorError;

use minijinja::Environment;
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "templates/"]
struct Templates;

/// Build a minijinja environment with every embedded `.jinja` template
/// pre-loaded, trimming template-control whitespace so rendered output
/// doesn't carry stray blank lines from `{% for %}` blocks.
pub fn environment() -> Result<Environment<'static>, GeneratorError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    for file in Templates::iter() {
        let Some(contents) = Templates::get(&file) else {
            continue;
        };
        let text = std::str::from_utf8(contents.data.as_ref())
            .map_err(|error| GeneratorError::Template(format!("template {file} is not valid UTF-8: {error}")))?
            .to_string();
        env.add_template_owned(file.to_string(), text)
            .map_err(|error| GeneratorError::Template(format!("failed to parse template {file}: {error}")))?;
    }

    Ok(env)
}

/// Render `template_name` against `context`, trimming trailing whitespace
/// from every line and normalizing line endings (DESIGN.md open-question
/// decision #3).
pub fn render(
    env: &Environment<'static>,
    template_name: &str,
    context: minijinja::Value,
) -> Result<String, GeneratorError> {
    let template = env
        .get_template(template_name)
        .map_err(|error| GeneratorError::Template(format!("unknown template {template_name}: {error}")))?;
    let rendered = template
        .render(context)
        .map_err(|error| GeneratorError::Template(format!("failed to render {template_name}: {error}")))?;
    Ok(normalize(&rendered))
}

fn normalize(text: &str) -> String {
    let mut out = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_embedded_template_parses() {
        assert!(environment().is_ok());
    }

    #[test]
    fn normalize_trims_trailing_whitespace_and_ensures_final_newline() {
        let normalized = normalize("line one   \nline two\t\n");
        assert_eq!(normalized, "line one\nline two\n");
    }
}
