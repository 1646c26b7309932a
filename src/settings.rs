use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::DEFAULT_EXPORT_NAME;
use crate::style::StyleOverride;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub export_name: String,
    pub output_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub style: StyleOverride,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_name: DEFAULT_EXPORT_NAME.to_string(),
            output_dir: PathBuf::from("."),
            font_path: None,
            style: StyleOverride::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    export: Option<ExportSettings>,
    style: Option<StyleOverride>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    name: Option<String>,
    output_dir: Option<String>,
    font_path: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::builtin()?;
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    /// Defaults with the embedded `settings.toml` applied; the first layer of every load.
    pub fn builtin() -> Result<Self> {
        let mut settings = Settings::default();
        settings
            .merge_str(DEFAULT_SETTINGS_TOML)
            .with_context(|| "failed to parse built-in settings")?;
        Ok(settings)
    }

    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(export) = incoming.export {
            if let Some(name) = export.name
                && !name.trim().is_empty()
            {
                self.export_name = name.trim().to_string();
            }
            if let Some(dir) = export.output_dir
                && !dir.trim().is_empty()
            {
                self.output_dir = PathBuf::from(dir.trim());
            }
            if let Some(path) = export.font_path
                && !path.trim().is_empty()
            {
                self.font_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(style) = incoming.style {
            self.style.merge(style);
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".chat-export-rust"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Backend, resolve_style};
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_parse() {
        let settings = Settings::builtin().expect("defaults");
        assert_eq!(settings.export_name, DEFAULT_EXPORT_NAME);
        assert_eq!(settings.style.theme.as_deref(), Some("dark"));
        assert_eq!(settings.style.font_size, Some(14.0));
    }

    #[test]
    fn embedded_defaults_agree_with_resolver() {
        let settings = Settings::builtin().expect("defaults");
        for backend in [Backend::Raster, Backend::Vector] {
            assert_eq!(
                resolve_style(&settings.style, backend),
                resolve_style(&StyleOverride::default(), backend)
            );
        }
    }

    #[test]
    fn loaded_settings_start_from_embedded_defaults() {
        with_temp_home(|home| {
            let extra = home.join("empty.toml");
            fs::write(&extra, "").expect("extra");
            let settings = load_settings(Some(&extra)).expect("load");
            let builtin = Settings::builtin().expect("defaults");
            assert_eq!(settings.style.font_family, builtin.style.font_family);
            assert_eq!(settings.style.border_radius, Some(12.0));
            assert_eq!(settings.style.show_agent_avatars, Some(true));
        });
    }

    #[test]
    fn seeds_home_settings_file() {
        with_temp_home(|home| {
            load_settings(None).expect("load");
            let seeded = home.join(".chat-export-rust").join("settings.toml");
            let content = fs::read_to_string(seeded).expect("seeded");
            assert_eq!(content, DEFAULT_SETTINGS_TOML);
        });
    }

    #[test]
    fn later_layers_override_field_by_field() {
        with_temp_home(|home| {
            let dir = home.join(".chat-export-rust");
            fs::create_dir_all(&dir).expect("dir");
            fs::write(
                dir.join("settings.local.toml"),
                "[export]\nname = \"standup\"\n\n[style]\ntheme = \"light\"\nfont_size = 18.0\n",
            )
            .expect("local");
            let extra = home.join("extra.toml");
            fs::write(
                &extra,
                "[style]\nfont_size = 0.0\npadding = 24.0\nshow_models = false\n",
            )
            .expect("extra");

            let settings = load_settings(Some(&extra)).expect("load");
            assert_eq!(settings.export_name, "standup");
            assert_eq!(settings.style.theme.as_deref(), Some("light"));
            assert_eq!(settings.style.font_size, Some(18.0));
            assert_eq!(settings.style.padding, Some(24.0));
            assert_eq!(settings.style.show_models, Some(false));
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("nope.toml"))).expect_err("missing");
            assert!(err.to_string().contains("settings file not found"));
        });
    }

    #[test]
    fn malformed_file_names_the_path() {
        with_temp_home(|home| {
            let extra = home.join("broken.toml");
            fs::write(&extra, "[style\n").expect("write");
            let err = load_settings(Some(&extra)).expect_err("broken");
            assert!(format!("{err}").contains("broken.toml"));
        });
    }
}
