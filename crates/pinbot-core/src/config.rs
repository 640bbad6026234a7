use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::MatchMode, errors::Error, exclusion::DEFAULT_SOURCE_TIMEOUT, Result};

/// Column names of the master directory CSV.
///
/// Defaults match the cleaned PIN code export the bot was first run against.
/// Headers are compared after trimming and lowercasing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryColumns {
    pub code: String,
    pub area: String,
    pub flag: String,
    pub city: String,
    pub state: String,
}

impl Default for DirectoryColumns {
    fn default() -> Self {
        Self {
            code: "external_code".to_string(),
            area: "master_pincodes_name".to_string(),
            flag: "ntb urban".to_string(),
            city: "city".to_string(),
            state: "state".to_string(),
        }
    }
}

/// One configured negative-area feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionSourceConfig {
    pub id: String,
    pub path: PathBuf,
    pub mode: MatchMode,
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,
    pub telegram_message_limit: usize,

    // Reference data
    pub directory_path: PathBuf,
    pub directory_columns: DirectoryColumns,
    pub exclusion_sources: Vec<ExclusionSourceConfig>,
    pub hard_block_path: Option<PathBuf>,

    // Per-source query bound
    pub source_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_message_limit = env_usize("TELEGRAM_MESSAGE_LIMIT").unwrap_or(4096);

        let directory_path = env_path("PINCODE_DIRECTORY_PATH")
            .unwrap_or_else(|| PathBuf::from("pincode_clean.csv"));

        let defaults = DirectoryColumns::default();
        let directory_columns = DirectoryColumns {
            code: env_column("DIRECTORY_CODE_COLUMN").unwrap_or(defaults.code),
            area: env_column("DIRECTORY_AREA_COLUMN").unwrap_or(defaults.area),
            flag: env_column("DIRECTORY_FLAG_COLUMN").unwrap_or(defaults.flag),
            city: env_column("DIRECTORY_CITY_COLUMN").unwrap_or(defaults.city),
            state: env_column("DIRECTORY_STATE_COLUMN").unwrap_or(defaults.state),
        };

        let exclusion_sources =
            parse_exclusion_sources(&env_str("EXCLUSION_SOURCES").unwrap_or_default())?;
        let hard_block_path = env_str("HARD_BLOCK_PATH")
            .and_then(non_empty)
            .map(PathBuf::from);

        let source_timeout = env_u64("SOURCE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SOURCE_TIMEOUT);

        Ok(Self {
            telegram_bot_token,
            telegram_message_limit,
            directory_path,
            directory_columns,
            exclusion_sources,
            hard_block_path,
            source_timeout,
        })
    }
}

/// Parse `id=path[:code|:area]` entries separated by commas.
///
/// `:code` declares a feed keyed by PIN only; the default (`:area`) declares a
/// feed keyed by PIN and area. Ids must be unique.
pub fn parse_exclusion_sources(raw: &str) -> Result<Vec<ExclusionSourceConfig>> {
    let mut out: Vec<ExclusionSourceConfig> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((id, rest)) = item.split_once('=') else {
            return Err(Error::Config(format!(
                "EXCLUSION_SOURCES entry {item:?} must look like id=path[:code|:area]"
            )));
        };
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Config(format!(
                "EXCLUSION_SOURCES entry {item:?} has an empty id"
            )));
        }

        let (path, mode) = match rest.rsplit_once(':') {
            Some((p, m)) if m.trim().eq_ignore_ascii_case("code") => (p, MatchMode::CodeOnly),
            Some((p, m)) if m.trim().eq_ignore_ascii_case("area") => (p, MatchMode::CodeAndArea),
            _ => (rest, MatchMode::CodeAndArea),
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::Config(format!(
                "EXCLUSION_SOURCES entry {item:?} has an empty path"
            )));
        }
        if out.iter().any(|s| s.id == id) {
            return Err(Error::Config(format!(
                "EXCLUSION_SOURCES lists {id:?} more than once"
            )));
        }

        out.push(ExclusionSourceConfig {
            id: id.to_string(),
            path: PathBuf::from(path),
            mode,
        });
    }
    Ok(out)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).and_then(non_empty).map(PathBuf::from)
}

fn env_column(key: &str) -> Option<String> {
    env_str(key)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_with_modes() {
        let got = parse_exclusion_sources(
            " partner_a=data/neg_a.csv , pins=data/cannot.csv:code,partner_b=/srv/b.csv:area",
        )
        .unwrap();
        assert_eq!(
            got,
            vec![
                ExclusionSourceConfig {
                    id: "partner_a".to_string(),
                    path: PathBuf::from("data/neg_a.csv"),
                    mode: MatchMode::CodeAndArea,
                },
                ExclusionSourceConfig {
                    id: "pins".to_string(),
                    path: PathBuf::from("data/cannot.csv"),
                    mode: MatchMode::CodeOnly,
                },
                ExclusionSourceConfig {
                    id: "partner_b".to_string(),
                    path: PathBuf::from("/srv/b.csv"),
                    mode: MatchMode::CodeAndArea,
                },
            ]
        );
        assert!(parse_exclusion_sources("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_sources() {
        assert!(parse_exclusion_sources("no_equals_sign").is_err());
        assert!(parse_exclusion_sources("=path.csv").is_err());
        assert!(parse_exclusion_sources("a=:code").is_err());
        assert!(parse_exclusion_sources("a=x.csv,a=y.csv").is_err());
    }

    #[test]
    fn dotenv_strips_quotes_and_comments() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"abc\"\n\nHARD_BLOCK_PATH = 'x.csv'\nnot a pair\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc".to_string()),
                ("HARD_BLOCK_PATH".to_string(), "x.csv".to_string()),
            ]
        );
    }
}
