use etcetera::BaseStrategy;
use serde::{Deserialize, Serialize};
use url::Url;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Metadata, Provider,
};

lazy_static::lazy_static! {
    /// Provide a lazily instantiated static reference to
    /// a config object parsed from canonical locations
    /// so that the CLI has immutable access to it from
    /// anywhere without ever having to parse the config more
    /// than once.
    pub static ref CONFIG: Config = load_config();
}

fn load_config() -> Config {
    Config::figment().extract().unwrap_or_default()
}

const DEFAULT_REPOSITORY_URL: &str = "http://cnx-repo.appspot.com/atompub";
const DEFAULT_REPOSITORY_ID: &str = "cnx-repo";
const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub envelope: EnvelopeConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Where modules and resources are published.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Base URL of the AtomPub service, e.g. `http://host/atompub`.
    pub url: Url,
    /// Identifier recorded for every uploaded resource in the manifest.
    pub id: String,
}

/// The base64 alphabet used by the content envelope.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Alphabet {
    #[default]
    Standard,
    UrlSafe,
}

/// How many times each blob is base64 encoded before it reaches the wire.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Layers {
    #[default]
    Single,
    Double,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeConfig {
    #[serde(default)]
    pub alphabet: Alphabet,
    #[serde(default)]
    pub layers: Layers,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    /// Upper bound on resource uploads in flight at once.
    pub concurrency: usize,
    /// Abort the publish if any resource fails to upload.
    #[serde(default)]
    pub require_all: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig {
            // unwrap is safe as the default is a valid literal
            url: Url::parse(DEFAULT_REPOSITORY_URL).unwrap(),
            id: DEFAULT_REPOSITORY_ID.into(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            require_all: false,
        }
    }
}

impl Config {
    pub fn from<T: Provider>(provider: T) -> Result<Config, figment::Error> {
        Figment::from(provider).extract()
    }

    pub fn figment() -> Figment {
        let mut fig = Figment::from(Config::default());

        if let Ok(c) = etcetera::choose_base_strategy() {
            let config = c.config_dir().join("cnx.toml");
            fig = fig.admerge(Toml::file(config));
        }

        fig.admerge(Env::prefixed("CNX_").split("__"))
    }
}

impl Provider for Config {
    fn metadata(&self) -> figment::Metadata {
        Metadata::named("CNX Publish Config")
    }
    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
