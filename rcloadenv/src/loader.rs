use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    error::{Error, Result},
    runtimeconfig::{self, Variable, VariableSource},
};

/// Restricts which variables are loaded, by name relative to the config.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    pub only: Vec<String>,
    pub except: Vec<String>,
}

impl Filter {
    pub fn allows(&self, relative_name: &str) -> bool {
        if self.except.iter().any(|name| name == relative_name) {
            return false;
        }
        self.only.is_empty() || self.only.iter().any(|name| name == relative_name)
    }
}

/// Returns every variable of the config, keyed by its full name.
///
/// Follows pagination to the end. Any failure, including a single value that
/// doesn't decode, fails the whole listing.
pub fn list_variables(
    source: &impl VariableSource,
    project: &str,
    config_name: &str,
    filter: &Filter,
) -> Result<BTreeMap<String, String>> {
    let parent = runtimeconfig::parent(project, config_name);
    let prefix = format!("{parent}/variables/");
    let mut vals = BTreeMap::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = source.list_variables(&parent, page_token.as_deref())?;

        for var in page.variables {
            let relative = var.name.strip_prefix(&prefix).unwrap_or(&var.name);
            if !filter.allows(relative) {
                tracing::debug!("skipping config variable {}", relative);
                continue;
            }

            tracing::debug!("found config variable {}", relative);
            let value = decode(&var)?;
            vals.insert(var.name, value);
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(vals)
}

fn decode(var: &Variable) -> Result<String> {
    if let Some(text) = var.text.as_deref().filter(|text| !text.is_empty()) {
        return Ok(text.to_owned());
    }

    let encoded = var.value.as_deref().unwrap_or_default();
    let decode_error = |reason: String| Error::Decode {
        name: var.name.clone(),
        value: encoded.to_owned(),
        reason,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| decode_error(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| decode_error(err.to_string()))
}
