use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
};

/// An explicit environment, threaded through loading and into the executor
/// instead of mutating the process environment.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Environment {
    vars: Vec<(OsString, OsString)>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        let key = key.as_ref();
        self.vars
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_os_str())
    }

    pub fn contains(&self, key: impl AsRef<OsStr>) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_os_str(), value.as_os_str()))
    }

    /// Adds loaded variables under their environment names, leaving any
    /// variable that is already set untouched.
    ///
    /// When several variables map to the same name the last one in order of
    /// full name wins.
    pub fn merge(mut self, loaded: &BTreeMap<String, String>) -> Self {
        let mut staged: BTreeMap<String, (&str, &str)> = BTreeMap::new();
        for (name, value) in loaded {
            let key = env_key(name);
            if let Some((previous, _)) = staged.get(&key) {
                tracing::warn!("{} and {} both map to {}, using {}", previous, name, key, name);
            }
            staged.insert(key, (name.as_str(), value.as_str()));
        }

        let mut added = Vec::new();
        for (key, (_, value)) in staged {
            if self.contains(&key) {
                tracing::debug!("envvar already set: {}", key);
                continue;
            }
            tracing::debug!("setting envvar: {}", key);
            added.push((OsString::from(key), OsString::from(value)));
        }

        self.vars.extend(added);
        self
    }
}

impl FromIterator<(OsString, OsString)> for Environment {
    fn from_iter<T: IntoIterator<Item = (OsString, OsString)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// `projects/p/configs/c/variables/some/db-host` becomes `DB_HOST`.
pub fn env_key(name: &str) -> String {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.replace('-', "_").to_uppercase()
}
