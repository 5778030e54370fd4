//! Environment variable names read by [`SinkConfig::from_env`](crate::config::SinkConfig::from_env)
//! and the host probes behind the fixed environment tags.

/// Sentry DSN, e.g. `https://key@o0.ingest.sentry.io/42`.
pub const SENTRY_SINK_DSN_ENV: &str = "SENTRY_SINK_DSN";

/// Release identifier, usually the application version.
pub const SENTRY_SINK_RELEASE_ENV: &str = "SENTRY_SINK_RELEASE";

/// `true`/`1` selects the `prod` environment, `false`/`0` selects `dev`.
pub const SENTRY_SINK_PRODUCTION_ENV: &str = "SENTRY_SINK_PRODUCTION";

/// `true`/`1` turns on the Sentry client's own debug output.
pub const SENTRY_SINK_DEBUG_ENV: &str = "SENTRY_SINK_DEBUG";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a boolean flag; unset or unparsable values yield `None`.
pub fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Command-line arguments of the process without the program name,
/// joined by single spaces.
pub fn command_line_args() -> String {
    std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tags describing the host, gathered once when a sink is built.
pub fn environment_tags() -> Vec<(&'static str, String)> {
    vec![
        ("culture", culture()),
        ("64_process", cfg!(target_pointer_width = "64").to_string()),
        ("is_server", is_server().to_string()),
        ("is_admin", is_admin().to_string()),
        ("is_gui", is_gui().to_string()),
    ]
}

fn culture() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .map(|value| locale_name(&value))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `en_US.UTF-8@euro` -> `en-US`
fn locale_name(raw: &str) -> String {
    let name = raw.split(|c| c == '.' || c == '@').next().unwrap_or(raw);
    match name {
        "C" | "POSIX" | "" => "invariant".to_string(),
        _ => name.replace('_', "-"),
    }
}

#[cfg(windows)]
fn is_server() -> bool {
    os_info::get()
        .edition()
        .map(|edition| edition.contains("Server"))
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_server() -> bool {
    false
}

#[cfg(unix)]
fn is_admin() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
fn is_admin() -> bool {
    false
}

#[cfg(all(unix, not(target_os = "macos")))]
fn is_gui() -> bool {
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|key| std::env::var_os(key).map_or(false, |v| !v.is_empty()))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn is_gui() -> bool {
    true
}
