//! Plugin search path.

use std::path::{Path, PathBuf};

use crate::config::Config;

/// Name of the plugin directory inside the configuration directory.
const USER_PLUGIN_DIR_NAME: &str = "cli-plugins";

/// System-wide plugin directories, lowest precedence, in search order.
pub fn system_plugin_dirs() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        ["ProgramData", "ProgramFiles"]
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .map(|root| PathBuf::from(root).join("zeptoctl").join(USER_PLUGIN_DIR_NAME))
            .collect()
    }
    #[cfg(not(windows))]
    {
        [
            "/usr/local/lib/zeptoctl/cli-plugins",
            "/usr/local/libexec/zeptoctl/cli-plugins",
            "/usr/lib/zeptoctl/cli-plugins",
            "/usr/libexec/zeptoctl/cli-plugins",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    }
}

/// The per-user plugin directory for a configuration.
pub fn user_plugin_dir(config: &Config) -> PathBuf {
    config.dir.join(USER_PLUGIN_DIR_NAME)
}

/// Ordered plugin search path: configured extra dirs, then the user dir,
/// then the system dirs. Existence is not checked here.
pub fn plugin_dirs(config: &Config) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = config
        .cli_plugins_extra_dirs
        .iter()
        .map(|d| expand_home(d))
        .collect();
    dirs.push(user_plugin_dir(config));
    dirs.extend(system_plugin_dirs());
    dirs
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(dirs: &[PathBuf]) -> String {
        dirs.iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    #[test]
    fn test_default_plugin_dirs() {
        let config = Config::with_dir("/home/u/.zeptoctl");

        let mut expected = vec![PathBuf::from("/home/u/.zeptoctl").join("cli-plugins")];
        expected.extend(system_plugin_dirs());

        assert_eq!(join(&plugin_dirs(&config)), join(&expected));
    }

    #[test]
    fn test_extra_dirs_come_first() {
        let mut config = Config::with_dir("/home/u/.zeptoctl");
        config.cli_plugins_extra_dirs =
            vec![PathBuf::from("foo"), PathBuf::from("bar"), PathBuf::from("baz")];

        let mut expected = vec![
            PathBuf::from("foo"),
            PathBuf::from("bar"),
            PathBuf::from("baz"),
            PathBuf::from("/home/u/.zeptoctl/cli-plugins"),
        ];
        expected.extend(system_plugin_dirs());

        assert_eq!(plugin_dirs(&config), expected);
    }

    #[test]
    fn test_user_dir_precedes_system_dirs() {
        let config = Config::with_dir("/cfg");
        let dirs = plugin_dirs(&config);
        assert_eq!(dirs[0], PathBuf::from("/cfg/cli-plugins"));
        assert_eq!(&dirs[1..], system_plugin_dirs().as_slice());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
        assert_eq!(expand_home(Path::new("rel/dir")), PathBuf::from("rel/dir"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/plugins")), home.join("plugins"));
        }
    }
}
