use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsoleArgs {
    pub config: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub owner: Option<Uuid>,
    pub region: Option<String>,
    pub verbose: bool,
}

impl ConsoleArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ConsoleArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => parsed.config = Some(PathBuf::from(value)),
                "script" => parsed.script = Some(PathBuf::from(value)),
                "owner" => {
                    parsed.owner =
                        Some(Uuid::parse_str(&value).with_context(|| format!("Invalid owner id '{value}'"))?);
                }
                "region" => parsed.region = Some(value),
                "verbose" => parsed.verbose = parse_bool_flag("verbose", &value)?,
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --script, --owner, --region, --verbose."
                ),
            }
        }
        Ok(parsed)
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
