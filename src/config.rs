/**
 * BookReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::builder::BuilderSettings;
use crate::error::{Error, Result};
use crate::metadata::{HydrationPolicy, ImagePolicy};
use crate::neighbors::Metric;

pub const DEFAULT_NUM_RECOMMENDATIONS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub artifacts_dir: PathBuf,
    /// Number of books per recommendation, the queried book included.
    pub num_recommendations: usize,
    pub metric: Metric,
    pub hydration: HydrationPolicy,
    pub builder: BuilderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            artifacts_dir: PathBuf::from("artifacts"),
            num_recommendations: DEFAULT_NUM_RECOMMENDATIONS,
            metric: Metric::default(),
            hydration: HydrationPolicy::default(),
            builder: BuilderSettings::default(),
        }
    }
}

impl Config {

    /// Reads `BOOKRECO_*` variables, after loading a `.env` file if there is one. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
        where F: Fn(&str) -> Option<String> {

        let mut config = Config::default();

        if let Some(dir) = lookup("BOOKRECO_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(dir);
        }

        if let Some(k) = lookup("BOOKRECO_NUM_RECOMMENDATIONS") {
            config.num_recommendations = parse("BOOKRECO_NUM_RECOMMENDATIONS", &k)?;
        }

        if let Some(metric) = lookup("BOOKRECO_METRIC") {
            config.metric = parse("BOOKRECO_METRIC", &metric)?;
        }

        let disallowed_extensions: Vec<String> = match lookup("BOOKRECO_DISALLOWED_EXTENSIONS") {
            Some(extensions) => extensions.split(',')
                .map(|extension| extension.trim())
                .filter(|extension| !extension.is_empty())
                .map(str::to_owned)
                .collect(),
            None => vec![".gif".to_owned()],
        };

        config.hydration.image_policy = match lookup("BOOKRECO_IMAGE_POLICY").as_ref().map(|p| p.trim()) {
            None | Some("strict") => ImagePolicy::Strict { disallowed_extensions },
            Some("lenient") => ImagePolicy::Lenient,
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "BOOKRECO_IMAGE_POLICY must be 'strict' or 'lenient', got '{}'", other)));
            },
        };

        // Fallback records carry the placeholder, so it has to pass the image policy itself
        if let Some(placeholder_url) = lookup("BOOKRECO_PLACEHOLDER_URL") {
            let placeholder_url = placeholder_url.trim();
            if !config.hydration.image_policy.accepts(placeholder_url) {
                return Err(Error::InvalidInput(format!(
                    "BOOKRECO_PLACEHOLDER_URL must be an http(s) link the image policy accepts, \
                     got '{}'", placeholder_url)));
            }
            config.hydration.placeholder_url = placeholder_url.to_owned();
        }

        if let Some(threshold) = lookup("BOOKRECO_USER_RATED_THRESHOLD") {
            config.builder.user_rated_threshold = parse("BOOKRECO_USER_RATED_THRESHOLD", &threshold)?;
        }

        if let Some(threshold) = lookup("BOOKRECO_BOOKS_RATED_THRESHOLD") {
            config.builder.books_rated_threshold =
                parse("BOOKRECO_BOOKS_RATED_THRESHOLD", &threshold)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
    where T: FromStr, T::Err: ToString {

    value.trim().parse().map_err(|failure: T::Err| {
        Error::InvalidInput(format!("{} has invalid value '{}': {}", key, value, failure.to_string()))
    })
}


#[cfg(test)]
mod tests {

    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::Config;
    use crate::metadata::{hydrate_one, ImagePolicy, MetadataTable};
    use crate::neighbors::Metric;

    fn config_from(vars: &[(&str, &str)]) -> crate::error::Result<Config> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.num_recommendations, 6);
        assert_eq!(config.builder.user_rated_threshold, 150);
        assert_eq!(config.builder.books_rated_threshold, 30);
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("BOOKRECO_ARTIFACTS_DIR", "/srv/bookreco"),
            ("BOOKRECO_NUM_RECOMMENDATIONS", "11"),
            ("BOOKRECO_METRIC", "cosine"),
            ("BOOKRECO_IMAGE_POLICY", "strict"),
            ("BOOKRECO_DISALLOWED_EXTENSIONS", ".gif, .bmp"),
            ("BOOKRECO_BOOKS_RATED_THRESHOLD", "50"),
        ]).unwrap();

        assert_eq!(config.artifacts_dir, PathBuf::from("/srv/bookreco"));
        assert_eq!(config.num_recommendations, 11);
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.builder.books_rated_threshold, 50);
        assert_eq!(
            config.hydration.image_policy,
            ImagePolicy::Strict { disallowed_extensions: vec![".gif".to_owned(), ".bmp".to_owned()] });
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("BOOKRECO_NUM_RECOMMENDATIONS", "six")]).is_err());
        assert!(config_from(&[("BOOKRECO_METRIC", "hamming")]).is_err());
        assert!(config_from(&[("BOOKRECO_IMAGE_POLICY", "paranoid")]).is_err());
        assert!(config_from(&[("BOOKRECO_PLACEHOLDER_URL", "")]).is_err());
        assert!(config_from(&[("BOOKRECO_PLACEHOLDER_URL", "covers/missing.png")]).is_err());
        assert!(config_from(&[("BOOKRECO_PLACEHOLDER_URL", "https://cdn.example.com/none.gif")]).is_err());
    }

    #[test]
    fn placeholder_is_used_for_fallback_records() {
        let config = config_from(&[
            ("BOOKRECO_PLACEHOLDER_URL", " https://cdn.example.com/no-cover.png "),
        ]).unwrap();

        let record = hydrate_one(&MetadataTable::new(), "Ghost", &config.hydration);
        assert_eq!(record.image_url, "https://cdn.example.com/no-cover.png");

        let lenient = config_from(&[
            ("BOOKRECO_IMAGE_POLICY", "lenient"),
            ("BOOKRECO_PLACEHOLDER_URL", "https://cdn.example.com/none.gif"),
        ]).unwrap();
        assert_eq!(lenient.hydration.placeholder_url, "https://cdn.example.com/none.gif");
    }
}
