//! Configuration types for the chat application.
//!
//! Settings are assembled once at startup from four layers, each overriding
//! the previous one:
//!
//! 1. built-in defaults,
//! 2. a YAML file whose values live under a top-level `settings:` key,
//! 3. `CONSOLECHAT_*` environment variables,
//! 4. command-line flags parsed by `arrrg`.
//!
//! The result is validated and read-only for the rest of the session.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::{DEFAULT_API_URL, normalize_base_url};
use crate::error::{Error, Result};
use crate::types::SamplingParams;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of retries for a transient failure.
const DEFAULT_MAX_RETRIES: u32 = 1;

/// File consulted in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "consolechat.yaml";

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "CONSOLECHAT_CONFIG";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant named ConsoleChat.\n\
Answer concisely and say so when you are not sure.";

/// Command-line arguments for the consolechat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path to a YAML settings file.
    #[arrrg(optional, "YAML settings file (default: consolechat.yaml)", "PATH")]
    pub config: Option<String>,

    /// Base address of the completion service.
    #[arrrg(optional, "Completion endpoint base URL", "URL")]
    pub endpoint: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-4o-mini)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1500)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log request details to stderr.
    #[arrrg(flag, "Log request details to stderr")]
    pub verbose: bool,
}

/// Resolved configuration for a chat session.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bearer credential for the remote API.
    pub key: String,

    /// Base address of the remote completion service.
    pub endpoint: String,

    /// Organization id sent as a scoping header.
    pub org_id: Option<String>,

    /// Which model the remote service should use.
    pub model: String,

    /// Seed instruction injected as the first transcript message.
    pub system_prompt: String,

    /// Upper bound on generated response length.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling mass; left to the server when unset.
    pub top_p: Option<f32>,

    /// Frequency penalty.
    pub frequency_penalty: f32,

    /// Presence penalty.
    pub presence_penalty: f32,

    /// How many candidates to request per turn; left to the server when unset.
    pub choice_count: Option<u32>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// How many times a transient failure is retried before giving up on a turn.
    pub max_retries: u32,

    /// Whether to use ANSI colors in output.
    pub use_color: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: String::new(),
            endpoint: DEFAULT_API_URL.to_string(),
            org_id: None,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: None,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            choice_count: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            use_color: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Settings")
            .field("key", &key)
            .field("endpoint", &self.endpoint)
            .field("org_id", &self.org_id)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("choice_count", &self.choice_count)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("use_color", &self.use_color)
            .finish()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    settings: Settings,
}

impl Settings {
    /// Loads settings from every source and validates the result.
    ///
    /// `lookup` resolves environment variables; pass `|name| std::env::var(name).ok()`
    /// in production.
    pub fn load<F>(args: &ChatArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match config_path(args, &lookup) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(&lookup)?;
        settings.apply_args(args);
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a YAML file.  Keys missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(
                format!("failed to read settings file {}", path.display()),
                err,
            )
        })?;
        Self::from_yaml(&content)
    }

    /// Parses settings from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: SettingsFile = serde_yaml::from_str(content)?;
        Ok(file.settings)
    }

    /// Overrides settings with any `CONSOLECHAT_*` variables `lookup` knows.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("CONSOLECHAT_API_KEY") {
            self.key = key;
        }
        if let Some(endpoint) = lookup("CONSOLECHAT_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(org_id) = lookup("CONSOLECHAT_ORG_ID") {
            self.org_id = Some(org_id).filter(|org| !org.trim().is_empty());
        }
        if let Some(model) = lookup("CONSOLECHAT_MODEL") {
            self.model = model;
        }
        if let Some(prompt) = lookup("CONSOLECHAT_SYSTEM_PROMPT") {
            self.system_prompt = prompt;
        }
        if let Some(value) = lookup("CONSOLECHAT_MAX_TOKENS") {
            self.max_tokens = parse_env("CONSOLECHAT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("CONSOLECHAT_TEMPERATURE") {
            self.temperature = parse_env("CONSOLECHAT_TEMPERATURE", &value)?;
        }
        if let Some(value) = lookup("CONSOLECHAT_TOP_P") {
            self.top_p = Some(parse_env("CONSOLECHAT_TOP_P", &value)?);
        }
        if let Some(value) = lookup("CONSOLECHAT_FREQUENCY_PENALTY") {
            self.frequency_penalty = parse_env("CONSOLECHAT_FREQUENCY_PENALTY", &value)?;
        }
        if let Some(value) = lookup("CONSOLECHAT_PRESENCE_PENALTY") {
            self.presence_penalty = parse_env("CONSOLECHAT_PRESENCE_PENALTY", &value)?;
        }
        Ok(())
    }

    /// Overrides settings with the flags given on the command line.
    pub fn apply_args(&mut self, args: &ChatArgs) {
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(model) = &args.model {
            self.model = model.clone();
        }
        if let Some(system) = &args.system {
            self.system_prompt = system.clone();
        }
        if let Some(max_tokens) = args.max_tokens {
            self.max_tokens = max_tokens;
        }
        if args.no_color {
            self.use_color = false;
        }
    }

    /// Checks every setting against the range the remote API accepts.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(Error::config(
                "API key not provided; set CONSOLECHAT_API_KEY or `key` in the settings file",
            ));
        }
        normalize_base_url(&self.endpoint)?;
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0 and 2"));
        }
        if let Some(top_p) = self.top_p
            && !(0.0..=1.0).contains(&top_p)
        {
            return Err(invalid("top_p", "must be between 0 and 1"));
        }
        if !(-2.0..=2.0).contains(&self.frequency_penalty) {
            return Err(invalid("frequency_penalty", "must be between -2 and 2"));
        }
        if !(-2.0..=2.0).contains(&self.presence_penalty) {
            return Err(invalid("presence_penalty", "must be between -2 and 2"));
        }
        if self.choice_count == Some(0) {
            return Err(invalid("choice_count", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// The sampling parameters sent with every request.
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            choice_count: self.choice_count,
        }
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn config_path<F>(args: &ChatArgs, lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &args.config {
        return Some(PathBuf::from(path));
    }
    if let Some(path) = lookup(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.is_file().then_some(default)
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{name} has an invalid value: {value:?}")))
}

fn invalid(param: &str, message: &str) -> Error {
    Error::validation(message, Some(param.to_string()))
}
