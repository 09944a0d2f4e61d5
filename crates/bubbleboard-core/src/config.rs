use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::sim::{
  PhysicsConfig,
  Viewport
};

pub const DEFAULT_SUGGEST_ENDPOINT: &str =
  "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
pub const DEFAULT_GREETING: &str =
  "Hey! What are you trying to get done today?";
const API_KEY_ENV_VAR: &str =
  "GEMINI_API_KEY";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    boardrc_override
  ))]
  pub fn load(
    boardrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let boardrc = resolve_boardrc_path(
      boardrc_override
    )?;
    if let Some(path) = boardrc {
      info!(boardrc = %path.display(), "loading boardrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no boardrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// Built-in values only; no file is read.
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("physics.gravity", "0.0002"),
      ("physics.damping", "0.98"),
      ("physics.max_speed", "1.5"),
      ("physics.restitution", "0.8"),
      ("physics.radius", "60"),
      ("physics.substeps", "5"),
      ("viewport.width", "1280"),
      ("viewport.height", "800"),
      ("animation.frame_ms", "16"),
      ("animation.pop_ms", "300"),
      ("click.double_ms", "250"),
      (
        "suggest.endpoint",
        DEFAULT_SUGGEST_ENDPOINT
      ),
      ("suggest.timeout_secs", "30"),
      ("suggest.temperature", "0.8"),
      ("color", "on"),
      ("greeting", DEFAULT_GREETING)
    ] {
      cfg.map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    cfg
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// Parses `key` as `T`, naming the key in the error.
  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|err| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({err})"
        )
      })
  }

  fn require<T>(
    &self,
    key: &str
  ) -> anyhow::Result<T>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    self.get_parsed(key)?.ok_or_else(
      || anyhow!("missing config key: {key}")
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path) {
      return Err(anyhow!(
        "include cycle through {}",
        path.display()
      ));
    }
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      let parsed = classify_line(raw_line)
        .with_context(|| {
          format!(
            "invalid config line {}:{}",
            path.display(),
            line_no
          )
        })?;

      match parsed {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let include = resolve_include_path(
            &base_dir, target
          )?;
          debug!(
            file = %path.display(),
            include = %include.display(),
            line = line_no,
            "processing include"
          );
          if include.exists() {
            self.load_file(&include)?;
          } else {
            warn!(include = %include.display(), "include file does not exist; skipping");
          }
        }
        | RcLine::Pair(key, value) => {
          trace!(key, value, "loaded config key");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
      }
    }

    Ok(())
  }
}

/// One line of a boardrc file, with comments already stripped.
#[derive(Debug, PartialEq)]
enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Pair(&'a str, &'a str)
}

fn classify_line(
  raw: &str
) -> anyhow::Result<RcLine<'_>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(RcLine::Blank);
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    return Ok(RcLine::Include(
      target.trim()
    ));
  }

  let (key, value) = line
    .split_once('=')
    .ok_or_else(|| {
      anyhow!("expected key = value, got: {raw}")
    })?;
  let key = key.trim();
  if key.is_empty() {
    return Err(anyhow!(
      "missing key before '='"
    ));
  }
  Ok(RcLine::Pair(key, value.trim()))
}

/// Suggestion service connection settings.
#[derive(Debug, Clone)]
pub struct SuggestSettings {
  pub endpoint:     String,
  pub api_key:      Option<String>,
  pub timeout_secs: u64,
  pub temperature:  f64
}

/// Typed view over [`Config`] used to build a session and its host.
#[derive(Debug, Clone)]
pub struct Settings {
  pub physics:         PhysicsConfig,
  pub viewport:        Viewport,
  pub frame_ms:        u64,
  pub pop_ms:          f64,
  pub double_click_ms: f64,
  pub suggest:         SuggestSettings,
  pub color:           bool,
  pub greeting:        String
}

impl Settings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let physics = PhysicsConfig {
      gravity:     cfg
        .require("physics.gravity")?,
      damping:     cfg
        .require("physics.damping")?,
      max_speed:   cfg
        .require("physics.max_speed")?,
      restitution: cfg.require(
        "physics.restitution"
      )?,
      base_radius: cfg
        .require("physics.radius")?,
      substeps:    cfg
        .require("physics.substeps")?
    };
    physics.validate()?;

    let viewport = Viewport::new(
      cfg.require("viewport.width")?,
      cfg.require("viewport.height")?
    );

    let api_key = std::env::var(
      API_KEY_ENV_VAR
    )
    .ok()
    .or_else(|| {
      cfg.get("suggest.api_key")
    })
    .map(|key| key.trim().to_string())
    .filter(|key| !key.is_empty());

    let suggest = SuggestSettings {
      endpoint: cfg
        .get("suggest.endpoint")
        .unwrap_or_else(|| {
          DEFAULT_SUGGEST_ENDPOINT
            .to_string()
        }),
      api_key,
      timeout_secs: cfg.require(
        "suggest.timeout_secs"
      )?,
      temperature: cfg.require(
        "suggest.temperature"
      )?
    };

    let color = match cfg
      .get("color")
      .unwrap_or_else(|| "on".to_string())
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        true
      }
      | "off" | "no" | "false" | "0" => {
        false
      }
      | other => {
        return Err(anyhow!(
          "invalid color setting: \
           {other}"
        ));
      }
    };

    Ok(Self {
      physics,
      viewport,
      frame_ms: cfg
        .require("animation.frame_ms")?,
      pop_ms: cfg
        .require("animation.pop_ms")?,
      double_click_ms: cfg
        .require("click.double_ms")?,
      suggest,
      color,
      greeting: cfg
        .get("greeting")
        .unwrap_or_else(|| {
          DEFAULT_GREETING.to_string()
        })
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_boardrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(boardrc_env) =
    std::env::var("BOARDRC")
  {
    if boardrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      boardrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping ~/.boardrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".boardrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
