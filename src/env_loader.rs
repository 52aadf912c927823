use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(prune_home: Option<PathBuf>, config_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(home) = prune_home {
        return Some(home.join(".env"));
    }
    Some(config_dir?.join("prune/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("PRUNE_HOME").map(PathBuf::from),
        dirs::config_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_prune_home() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/srv/prune")),
            Some(PathBuf::from("/home/alice/.config")),
        );
        assert_eq!(got, Some(PathBuf::from("/srv/prune/.env")));
    }

    #[test]
    fn fallback_uses_config_dir_when_prune_home_unset() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice/.config")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.config/prune/.env")));
    }

    #[test]
    fn no_fallback_without_any_base() {
        assert_eq!(fallback_dotenv_path(None, None), None);
    }
}
