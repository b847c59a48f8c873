use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    classifier::{
        ClassifierKeywords, DEFAULT_LEGAL_KEYWORDS, DEFAULT_MEMO_KEYWORDS,
        DEFAULT_SCHEDULER_KEYWORDS,
    },
    errors::Error,
    Result,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PINECONE_REGION: &str = "us-east-1";

/// Which chat-completions backend the shared LLM client talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    /// A local llama.cpp-style server exposing the OpenAI wire format.
    Llama,
}

impl LlmBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackend::OpenAi => "openai",
            LlmBackend::Llama => "llama",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub base_url: String,
    /// Absent for keyless local servers.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PineconeIndexConfig {
    pub api_key: String,
    pub index: String,
    pub cloud: String,
    pub region: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct N8nConfig {
    pub webhook_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Typed configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_safe_limit: usize,

    // LLM
    pub llm: LlmConfig,
    pub openai_api_key: Option<String>,
    pub transcription_prompt: String,
    pub witty_voice_enabled: bool,

    // Capabilities
    pub caselaw_index: PineconeIndexConfig,
    pub memo_index: PineconeIndexConfig,
    pub n8n: Option<N8nConfig>,
    pub conversion_dir: PathBuf,
    pub pandoc_path: PathBuf,
    pub pdftotext_path: PathBuf,
    pub generic_fallback_enabled: bool,

    // Routing
    pub keywords: ClassifierKeywords,
    pub dispatch_timeout: Duration,
    pub summary_timeout: Duration,

    // Runtime
    pub temp_dir: PathBuf,
}

impl Config {
    /// Load from `.env` (if present) and the process environment, then make sure the
    /// temp dir exists.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        fs::create_dir_all(&cfg.temp_dir)?;
        Ok(cfg)
    }

    /// Parse from an arbitrary key lookup. Every missing required key is reported in a
    /// single error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };
        let mut missing: Vec<&'static str> = Vec::new();

        let telegram_bot_token = vars.required("TELEGRAM_BOT_TOKEN", &mut missing);

        // `LLM_BACKEND=openai   # comment` is tolerated.
        let backend_raw = vars
            .str("LLM_BACKEND")
            .map(|s| s.split('#').next().unwrap_or_default().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "openai".to_string());
        let openai_api_key = vars.str("OPENAI_API_KEY");
        let llm_timeout = Duration::from_millis(vars.u64("LLM_TIMEOUT_MS").unwrap_or(60_000));

        let llm = match backend_raw.as_str() {
            "openai" => {
                if openai_api_key.is_none() {
                    missing.push("OPENAI_API_KEY");
                }
                Some(LlmConfig {
                    backend: LlmBackend::OpenAi,
                    base_url: vars
                        .str("OPENAI_BASE_URL")
                        .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                    api_key: openai_api_key.clone(),
                    model: vars
                        .str("OPENAI_MODEL")
                        .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
                    timeout: llm_timeout,
                })
            }
            "llama" => {
                let base_url = vars.required("LLAMA_BASE_URL", &mut missing);
                Some(LlmConfig {
                    backend: LlmBackend::Llama,
                    base_url,
                    api_key: vars.str("LLAMA_API_KEY"),
                    model: vars.str("LLAMA_MODEL").unwrap_or_else(|| "llama".to_string()),
                    timeout: llm_timeout,
                })
            }
            _ => None,
        };
        let Some(llm) = llm else {
            return Err(Error::Config(format!(
                "unknown LLM_BACKEND: {backend_raw:?} (expected \"openai\" or \"llama\")"
            )));
        };

        let shared_pinecone_key = vars.str("PINECONE_API_KEY");
        let shared_pinecone_env = vars.str("PINECONE_ENV");
        let cloud = vars.str("PINECONE_CLOUD").unwrap_or_else(|| "aws".to_string());
        let mut index = |prefix: &str, key_var: &'static str, index_var: &'static str| {
            let api_key = vars
                .str(key_var)
                .or_else(|| shared_pinecone_key.clone())
                .unwrap_or_else(|| {
                    missing.push(key_var);
                    String::new()
                });
            let index = vars.required(index_var, &mut missing);
            let region = vars
                .str(&format!("{prefix}_PINECONE_ENVIRONMENT"))
                .or_else(|| shared_pinecone_env.clone())
                .unwrap_or_else(|| DEFAULT_PINECONE_REGION.to_string());
            PineconeIndexConfig {
                api_key,
                index,
                cloud: cloud.clone(),
                region,
            }
        };
        let caselaw_index = index("CASELAW", "CASELAW_PINECONE_API_KEY", "CASELAW_PINECONE_INDEX");
        let memo_index = index("MEMO", "MEMO_PINECONE_API_KEY", "MEMO_PINECONE_INDEX");

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let n8n = vars.str("N8N_WEBHOOK_URL").map(|webhook_url| N8nConfig {
            webhook_url,
            user: vars.str("N8N_USER"),
            password: vars.str("N8N_PASSWORD"),
        });

        let keywords = ClassifierKeywords {
            legal: vars.csv_lower("LEGAL_KEYWORDS", DEFAULT_LEGAL_KEYWORDS),
            memo: vars.csv_lower("MEMO_KEYWORDS", DEFAULT_MEMO_KEYWORDS),
            scheduler: vars.csv_lower("SCHEDULER_KEYWORDS", DEFAULT_SCHEDULER_KEYWORDS),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_safe_limit: vars.usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000),
            llm,
            openai_api_key,
            transcription_prompt: vars
                .str("TRANSCRIPTION_PROMPT")
                .unwrap_or_else(|| build_transcription_prompt(vars.str("TRANSCRIPTION_CONTEXT"))),
            witty_voice_enabled: vars.bool("WITTY_VOICE_ENABLED").unwrap_or(false),
            caselaw_index,
            memo_index,
            n8n,
            conversion_dir: vars.path("CONVERSION_DIR").unwrap_or_else(|| PathBuf::from(".")),
            pandoc_path: vars.path("PANDOC_PATH").unwrap_or_else(|| PathBuf::from("pandoc")),
            pdftotext_path: vars
                .path("PDFTOTEXT_PATH")
                .unwrap_or_else(|| PathBuf::from("pdftotext")),
            generic_fallback_enabled: vars.bool("GENERIC_FALLBACK_ENABLED").unwrap_or(true),
            keywords,
            dispatch_timeout: Duration::from_millis(
                vars.u64("DISPATCH_TIMEOUT_MS").unwrap_or(120_000),
            ),
            summary_timeout: Duration::from_millis(
                vars.u64("SUMMARY_TIMEOUT_MS").unwrap_or(15_000),
            ),
            temp_dir: vars.path("TEMP_DIR").unwrap_or_else(|| PathBuf::from("/tmp/lexbot")),
        })
    }

    /// Voice transcription needs the OpenAI key regardless of the chat backend.
    pub fn transcription_available(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Trimmed, non-empty value.
    fn str(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn required(&self, key: &'static str, missing: &mut Vec<&'static str>) -> String {
        self.str(key).unwrap_or_else(|| {
            missing.push(key);
            String::new()
        })
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.str(key).map(|s| {
            matches!(
                s.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.str(key).and_then(|s| s.parse::<u64>().ok())
    }

    fn usize(&self, key: &str) -> Option<usize> {
        self.str(key).and_then(|s| s.parse::<usize>().ok())
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.str(key).map(PathBuf::from)
    }

    fn csv_lower(&self, key: &str, default: &[&str]) -> Vec<String> {
        let parsed: Vec<String> = self
            .str(key)
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if parsed.is_empty() {
            default.iter().map(|s| s.to_string()).collect()
        } else {
            parsed
        }
    }
}

fn build_transcription_prompt(context: Option<String>) -> String {
    const BASE: &str = "Transcribe this voice message accurately.\n\
Focus on accuracy for legal terms, case names, and proper nouns.";

    match context {
        Some(ctx) => format!("{BASE}\n\nAdditional context:\n{ctx}"),
        None => BASE.to_string(),
    }
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
        let line = line.strip_prefix("export ").unwrap_or(line);

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
