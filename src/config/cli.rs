use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "site-cms")]
#[command(about = "Content and lead-capture backend for the marketing site")]
pub struct CliConfig {
    #[arg(long, short, default_value = "site-cms.toml", env = "SITE_CMS_CONFIG")]
    pub config: PathBuf,

    #[arg(long, help = "Override server.bind from the config file")]
    pub bind: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}
