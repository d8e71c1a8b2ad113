//! Minijinja template environment with optional auto-reload for development.

use minijinja::{Environment, path_loader};

#[cfg(feature = "reload")]
use minijinja_autoreload::AutoReloader;

fn base_env(templates_path: &str, version: String) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_global("version", version);
    env.set_loader(path_loader(templates_path));
    env
}

#[cfg(feature = "reload")]
/// Build template environment reloading templates from `templates_path` on change
pub fn build_env(templates_path: &str, version: String) -> AutoReloader {
    let templates_path = templates_path.to_string();
    AutoReloader::new(move |notifier| {
        let env = base_env(&templates_path, version.clone());
        notifier.set_fast_reload(true);
        notifier.watch_path(&templates_path, true);
        Ok(env)
    })
}

#[cfg(not(feature = "reload"))]
/// Build template environment serving templates from `templates_path`
pub fn build_env(templates_path: &str, version: String) -> Environment<'static> {
    base_env(templates_path, version)
}
