use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use crate::{
    DockError,
    geometry::Location,
    visibility::{Intervals, VisibilityMode},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DockConfig {
    pub visibility: VisibilityMode,
    pub location: Location,
    pub intervals: Intervals,
    pub init_interval: Duration,
    pub shrink_thickness: i32,
    pub immutable: bool,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            visibility: VisibilityMode::BelowActive,
            location: Location::Bottom,
            intervals: Intervals::default(),
            init_interval: Duration::from_millis(400),
            shrink_thickness: 15,
            immutable: true,
        }
    }
}

pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: DockConfig,
}

pub fn load_or_create_default() -> Result<LoadedConfig, DockError> {
    let path = config_path()?;
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                DockError::Config(format!(
                    "failed to create config directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        fs::write(&path, default_config_template()).map_err(|err| {
            DockError::Config(format!(
                "failed to write default config {}: {err}",
                path.display()
            ))
        })?;
        tracing::info!(path = %path.display(), "created default config.lua");
    }

    let config = load_from_path(&path)?;
    Ok(LoadedConfig { path, config })
}

pub fn load_from_path(path: &Path) -> Result<DockConfig, DockError> {
    if !path.exists() {
        return Err(DockError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|err| {
        DockError::Config(format!("failed to read config {}: {err}", path.display()))
    })?;
    if content.trim().is_empty() {
        tracing::info!(path = %path.display(), "config.lua is empty; using defaults");
        return Ok(DockConfig::default());
    }

    let values = load_lua_values(path)?;
    config_from_values(&values)
}

pub fn config_from_values(values: &HashMap<String, String>) -> Result<DockConfig, DockError> {
    let mut config = DockConfig::default();

    if let Some(value) = values.get("visibility") {
        config.visibility = value.parse()?;
    }
    if let Some(value) = values.get("location") {
        config.location = value.parse()?;
    }

    config.intervals.normal = parse_millis(values, "update_interval_ms", config.intervals.normal)?;
    config.intervals.auto_hide = parse_millis(
        values,
        "auto_hide_interval_ms",
        config.intervals.auto_hide,
    )?;
    config.init_interval = parse_millis(values, "init_interval_ms", config.init_interval)?;

    for (key, interval) in [
        ("update_interval_ms", config.intervals.normal),
        ("auto_hide_interval_ms", config.intervals.auto_hide),
    ] {
        if interval.is_zero() {
            return Err(DockError::Config(format!(
                "{key} must be greater than 0"
            )));
        }
    }

    config.shrink_thickness = parse_i32(values, "shrink_thickness", config.shrink_thickness)?;
    if config.shrink_thickness <= 0 {
        return Err(DockError::Config(
            "shrink_thickness must be greater than 0".to_owned(),
        ));
    }

    config.immutable = parse_bool_flexible(values, "immutable", config.immutable)?;

    Ok(config)
}

fn config_path() -> Result<PathBuf, DockError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Ok(PathBuf::from(xdg).join("nowdock").join("config.lua"));
    }

    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home)
            .join(".config")
            .join("nowdock")
            .join("config.lua"));
    }

    Err(DockError::Config(
        "unable to resolve config path: HOME and XDG_CONFIG_HOME are unset".to_owned(),
    ))
}

fn load_lua_values(path: &Path) -> Result<HashMap<String, String>, DockError> {
    let output = Command::new("lua")
        .arg("-e")
        .arg(lua_loader_script())
        .env("NOWDOCK_CONFIG_PATH", path)
        .output()
        .map_err(|err| DockError::Config(format!("failed to execute lua: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let reason = if stderr.is_empty() {
            "lua exited with non-zero status".to_owned()
        } else {
            stderr
        };
        return Err(DockError::Config(format!(
            "failed to load {}: {reason}",
            path.display()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_key_value_stdout(&stdout)
}

pub fn parse_key_value_stdout(stdout: &str) -> Result<HashMap<String, String>, DockError> {
    let mut values = HashMap::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(DockError::Config(format!(
                "invalid lua output line: {line}"
            )));
        };
        values.insert(key.to_owned(), value.to_owned());
    }
    Ok(values)
}

fn parse_millis(
    values: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, DockError> {
    let Some(raw) = values.get(key) else {
        return Ok(default);
    };

    // lua prints integral numbers as floats on some versions
    let trimmed = raw.trim();
    let millis = match trimmed.parse::<u64>() {
        Ok(millis) => millis,
        Err(_) => {
            let parsed = trimmed.parse::<f64>().map_err(|err| {
                DockError::Config(format!("invalid value for {key}: {raw} ({err})"))
            })?;
            if !parsed.is_finite() || parsed < 0.0 || parsed.fract() != 0.0 {
                return Err(DockError::Config(format!(
                    "invalid value for {key}: {raw} (expected non-negative integer)"
                )));
            }
            parsed as u64
        }
    };

    Ok(Duration::from_millis(millis))
}

fn parse_i32(
    values: &HashMap<String, String>,
    key: &str,
    default: i32,
) -> Result<i32, DockError> {
    match values.get(key) {
        Some(raw) => raw.trim().parse::<i32>().map_err(|err| {
            DockError::Config(format!("invalid value for {key}: {raw} ({err})"))
        }),
        None => Ok(default),
    }
}

fn parse_bool_flexible(
    values: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, DockError> {
    let Some(raw) = values.get(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(DockError::Config(format!(
            "invalid value for {key}: {raw} (expected bool or 0/1)"
        ))),
    }
}

fn default_config_template() -> &'static str {
    r#"-- nowdock config
-- File: ~/.config/nowdock/config.lua (or $XDG_CONFIG_HOME/nowdock/config.lua)
return {
  -- below-active, below-maximized, let-windows-cover,
  -- windows-go-below, auto-hide, always-visible
  visibility = "below-active",

  -- top, bottom, left, right
  location = "bottom",

  timers = {
    update_interval_ms = 1500,
    auto_hide_interval_ms = 2500,
    init_interval_ms = 400,
  },

  transient = {
    shrink_thickness = 15,
    immutable = true,
  },
}
"#
}

fn lua_loader_script() -> &'static str {
    r#"
local path = os.getenv("NOWDOCK_CONFIG_PATH")
if type(path) ~= "string" or path == "" then
  io.stderr:write("NOWDOCK_CONFIG_PATH is not set\n")
  os.exit(1)
end

local chunk, load_err = loadfile(path)
if not chunk then
  io.stderr:write(load_err .. "\n")
  os.exit(1)
end

local ok, result = pcall(chunk)
if not ok then
  io.stderr:write(result .. "\n")
  os.exit(1)
end

local cfg = nil
if type(result) == "table" then
  cfg = result
elseif type(_G.config) == "table" then
  cfg = _G.config
else
  cfg = {}
end

local function emit(key, value)
  io.write(key)
  io.write("=")
  io.write(tostring(value))
  io.write("\n")
end

local function expect_table(name, value)
  if value ~= nil and type(value) ~= "table" then
    io.stderr:write(name .. " must be a table\n")
    os.exit(1)
  end
end

local function emit_string(name, value)
  if value == nil then
    return
  end
  if type(value) ~= "string" then
    io.stderr:write(name .. " must be a string\n")
    os.exit(1)
  end
  emit(name, value)
end

local function emit_number(name, value)
  if value == nil then
    return
  end
  if type(value) ~= "number" then
    io.stderr:write(name .. " must be a number\n")
    os.exit(1)
  end
  emit(name, value)
end

local function emit_bool_like(name, value)
  if value == nil then
    return
  end
  if type(value) == "boolean" or type(value) == "number" then
    emit(name, value)
    return
  end
  io.stderr:write(name .. " must be a boolean or number\n")
  os.exit(1)
end

local function pick(primary, fallback)
  if primary ~= nil then
    return primary
  end
  return fallback
end

expect_table("timers", cfg.timers)
expect_table("transient", cfg.transient)
local timers = cfg.timers or {}
local transient = cfg.transient or {}

emit_string("visibility", pick(cfg.visibility, _G.visibility))
emit_string("location", pick(cfg.location, _G.location))
emit_number("update_interval_ms", pick(timers.update_interval_ms, cfg.update_interval_ms))
emit_number("auto_hide_interval_ms", pick(timers.auto_hide_interval_ms, cfg.auto_hide_interval_ms))
emit_number("init_interval_ms", pick(timers.init_interval_ms, cfg.init_interval_ms))
emit_number("shrink_thickness", pick(transient.shrink_thickness, cfg.shrink_thickness))
emit_bool_like("immutable", pick(transient.immutable, cfg.immutable))
"#
}
