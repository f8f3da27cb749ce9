use std::{collections::BTreeMap, path::Path};

use anyhow::bail;
use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::rooms::DEFAULT_LANGUAGE;

/// Key of the greeting sent when a pairing starts.
pub const START_MESSAGE: &str = "start_message";
/// Key of the language-switch instructions. Expects a `command` variable.
pub const LANGUAGE_MESSAGE: &str = "language_message";

/// A language: its display name and its strings by key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Language {
    /// Display name, e.g. `English (US)`
    pub name: String,
    /// Strings indexed by key
    #[serde(default)]
    pub strings: BTreeMap<String, String>,
}

/// Recognized languages indexed by code.
#[derive(Clone, Debug)]
pub struct Catalog {
    languages: BTreeMap<String, Language>,
}

impl Catalog {
    /// Creates a catalog from already loaded languages.
    pub fn new(languages: BTreeMap<String, Language>) -> Self {
        Catalog { languages }
    }

    /// Languages compiled into the binary.
    pub fn builtin() -> Self {
        let english = Language {
            name: "English (US)".to_string(),
            strings: BTreeMap::from([
                (
                    START_MESSAGE.to_string(),
                    "Hi! To finish linking your account, enter this PIN:".to_string(),
                ),
                (
                    LANGUAGE_MESSAGE.to_string(),
                    "To change the language, send {command} followed by a language code. \
                     Send {command} alone to list the available languages."
                        .to_string(),
                ),
            ]),
        };
        let french = Language {
            name: "Français".to_string(),
            strings: BTreeMap::from([
                (
                    START_MESSAGE.to_string(),
                    "Bonjour ! Pour terminer la liaison de votre compte, saisissez ce code PIN :"
                        .to_string(),
                ),
                (
                    LANGUAGE_MESSAGE.to_string(),
                    "Pour changer de langue, envoyez {command} suivi d'un code de langue. \
                     Envoyez {command} seul pour lister les langues disponibles."
                        .to_string(),
                ),
            ]),
        };

        Catalog::new(BTreeMap::from([
            (DEFAULT_LANGUAGE.to_string(), english),
            ("fr".to_string(), french),
        ]))
    }

    /// Loads the built-in languages, merged with the YAML file at `path` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or does not describe languages.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let builtin = Catalog::builtin();
        let Some(path) = path else {
            debug!("no language file configured, using built-in languages");
            return Ok(builtin);
        };

        if !Path::new(path).exists() {
            bail!("language file {} does not exist", path);
        }

        let languages: BTreeMap<String, Language> =
            Figment::from(Serialized::defaults(builtin.languages))
                .merge(Yaml::file(path))
                .extract()?;

        info!("loaded {} languages from {}", languages.len(), path);
        Ok(Catalog::new(languages))
    }

    /// Recognized codes and their display names, sorted by code.
    pub fn list_codes(&self) -> Vec<(&str, &str)> {
        self.languages
            .iter()
            .map(|(code, language)| (code.as_str(), language.name.as_str()))
            .collect()
    }

    /// Whether `code` is a recognized language.
    pub fn is_valid(&self, code: &str) -> bool {
        self.languages.contains_key(code)
    }

    /// Returns `code` if recognized, [`DEFAULT_LANGUAGE`] otherwise.
    pub fn resolve<'a>(&self, code: Option<&'a str>) -> &'a str {
        match code {
            Some(code) if self.is_valid(code) => code,
            _ => DEFAULT_LANGUAGE,
        }
    }

    /// Renders the string `key` of language `code`.
    ///
    /// Each `{name}` placeholder is replaced by the value of the `name`
    /// variable. A key missing from `code` falls back to [`DEFAULT_LANGUAGE`],
    /// then to the key itself.
    pub fn template(&self, code: &str, key: &str, vars: &[(&str, &str)]) -> String {
        let raw = [code, DEFAULT_LANGUAGE]
            .iter()
            .filter_map(|c| self.languages.get(*c))
            .find_map(|language| language.strings.get(key))
            .map(String::as_str)
            .unwrap_or(key);

        vars.iter().fold(raw.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_contains_default_language() {
        let catalog = Catalog::builtin();

        assert!(catalog.is_valid(DEFAULT_LANGUAGE));
        assert!(catalog.is_valid("fr"));
        assert!(!catalog.is_valid("xx"));
    }

    #[test]
    fn test_list_codes_is_sorted() {
        let catalog = Catalog::builtin();

        assert_eq!(
            catalog.list_codes(),
            vec![("en-us", "English (US)"), ("fr", "Français")]
        );
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let catalog = Catalog::builtin();

        assert_eq!(catalog.resolve(Some("fr")), "fr");
        assert_eq!(catalog.resolve(Some("klingon")), "en-us");
        assert_eq!(catalog.resolve(None), "en-us");
    }

    #[test]
    fn test_template_replaces_variables() {
        let catalog = Catalog::builtin();

        let text = catalog.template("en-us", LANGUAGE_MESSAGE, &[("command", "!lang")]);

        assert!(text.contains("send !lang followed"));
        assert!(!text.contains("{command}"));
    }

    #[test]
    fn test_template_falls_back_to_default_then_key() {
        let mut languages = Catalog::builtin().languages;
        languages.insert(
            "de".to_string(),
            Language {
                name: "Deutsch".to_string(),
                strings: BTreeMap::new(),
            },
        );
        let catalog = Catalog::new(languages);

        assert_eq!(
            catalog.template("de", START_MESSAGE, &[]),
            catalog.template("en-us", START_MESSAGE, &[])
        );
        assert_eq!(catalog.template("de", "missing_key", &[]), "missing_key");
    }

    #[test]
    fn test_load_merges_file_over_builtin() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "de:\n  name: Deutsch\n  strings:\n    start_message: Hallo\nfr:\n  name: French\n",
        )
        .unwrap();

        let catalog = Catalog::load(file.path().to_str()).unwrap();

        assert!(catalog.is_valid("de"));
        assert_eq!(catalog.template("de", START_MESSAGE, &[]), "Hallo");
        assert!(catalog.list_codes().contains(&("fr", "French")));
        // strings not overridden by the file are kept
        assert!(catalog.template("fr", START_MESSAGE, &[]).starts_with("Bonjour"));
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(Catalog::load(Some("/nonexistent/languages.yaml")).is_err());
    }

    #[test]
    fn test_load_without_file_uses_builtin() {
        let catalog = Catalog::load(None).unwrap();

        assert_eq!(catalog.list_codes().len(), 2);
    }
}
