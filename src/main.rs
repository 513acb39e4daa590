use std::path::PathBuf;

use auspice::{config::Config, forwarding::ViaIdentity, logging, Master};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "auspice", version, about)]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(short, long, default_value = "auspice.toml")]
    config: PathBuf,

    /// Version reported in the Via header of forwarded requests.
    #[arg(long, env = "AUSPICE_VERSION", default_value = auspice::forwarding::DEFAULT_VERSION)]
    version_tag: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), auspice::Error> {
    let args = Args::parse();

    logging::init_tracing(args.json_logs);

    // Built once, every server shares it until the process exits.
    let via = ViaIdentity::new(&args.version_tag)?;
    let config = Config::load(&args.config)?;

    tracing::info!(config = %args.config.display(), %via, "starting");

    Master::init(config.normalize(), via)?
        .shutdown_on(tokio::signal::ctrl_c())
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn via(args: &[&str]) -> String {
        let args = Args::try_parse_from(args.iter().copied()).unwrap();
        ViaIdentity::new(&args.version_tag).unwrap().to_string()
    }

    // Single test because it mutates the process environment.
    #[test]
    fn version_tag_from_flag_env_or_default() {
        std::env::remove_var("AUSPICE_VERSION");
        assert_eq!(via(&["auspice"]), "1.1 localhost (Auspice vtst)");

        std::env::set_var("AUSPICE_VERSION", "2.4.0");
        assert_eq!(via(&["auspice"]), "1.1 localhost (Auspice v2.4.0)");
        assert_eq!(
            via(&["auspice", "--version-tag", "3.0.0"]),
            "1.1 localhost (Auspice v3.0.0)"
        );

        std::env::remove_var("AUSPICE_VERSION");

        let args = Args::try_parse_from(["auspice", "-c", "proxy.toml", "--json-logs"]).unwrap();
        assert_eq!(args.config, PathBuf::from("proxy.toml"));
        assert!(args.json_logs);
    }
}
