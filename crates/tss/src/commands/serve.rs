//! `tss serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tss_config::{CliSettings, Settings};
use tss_server::{DevServer, Options, StartOutcome};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover tss.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Page to open in the browser after start (default: "/").
    #[arg(long, value_name = "PATH")]
    open: Option<String>,

    /// Do not open the browser.
    #[arg(long, conflicts_with = "open")]
    no_open: bool,

    /// List directories that have no index.html.
    #[arg(long)]
    indexes: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,

    /// Port of the live reload listener (overrides config).
    #[arg(long)]
    live_reload_port: Option<u16>,

    /// Enable verbose output (log every request and change).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Command typed on stdin while the server runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StdinCommand {
    Restart,
    Reload,
    Quit,
}

impl StdinCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "rs" | "restart" => Some(Self::Restart),
            "r" | "reload" => Some(Self::Reload),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// Runs until Ctrl-C or `q` on stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        // Resolve flags before moving into CliSettings
        let open = self.resolve_open();
        let live_reload_enabled = self.resolve_live_reload_enabled();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.root,
            open,
            indexes: self.indexes.then_some(true),
            live_reload_enabled,
            live_reload_port: self.live_reload_port,
        };

        let settings = Settings::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &settings.config_path {
            output.info(&format!("Using {}", path.display()));
        }

        let mut server = DevServer::new();
        server.configure(Options::from_settings(&settings)?)?;
        let outcome = server.start().await?;
        Self::report(&output, &server, outcome, &settings);

        output.info("Commands: rs (restart), r (reload), q (quit)");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line? else {
                        stdin_open = false;
                        continue;
                    };
                    match StdinCommand::parse(&line) {
                        Some(StdinCommand::Restart) => {
                            let outcome = server.restart().await?;
                            Self::report(&output, &server, outcome, &settings);
                        }
                        Some(StdinCommand::Reload) => {
                            if server.reload() {
                                output.success("Reloaded");
                            } else {
                                output.warning("Live reload is disabled");
                            }
                        }
                        Some(StdinCommand::Quit) => break,
                        None if line.trim().is_empty() => {}
                        None => output.warning(&format!("Unknown command: {}", line.trim())),
                    }
                }
            }
        }

        server.stop().await;
        output.info("Stopped");
        Ok(())
    }

    fn report(output: &Output, server: &DevServer, outcome: StartOutcome, settings: &Settings) {
        let StartOutcome::Started { addr } = outcome else {
            return;
        };

        output.success("Server started");
        output.field("Serving", settings.root.display());
        output.field("URL", format!("http://{}:{}", settings.host, addr.port()));
        match server.live_reload_addr() {
            Some(lr) => output.field(
                "Live reload",
                format!("port {}, watching {}", lr.port(), settings.live_reload.directory.display()),
            ),
            None => output.field("Live reload", "disabled"),
        }
    }

    /// Resolve `open` from --open/--no-open flags.
    fn resolve_open(&self) -> Option<Option<String>> {
        if self.no_open {
            Some(None)
        } else {
            self.open.clone().map(Some)
        }
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServeArgs,
    }

    fn parse(args: &[&str]) -> ServeArgs {
        TestCli::parse_from(std::iter::once("tss").chain(args.iter().copied())).args
    }

    #[test]
    fn test_stdin_commands() {
        assert_eq!(StdinCommand::parse("rs"), Some(StdinCommand::Restart));
        assert_eq!(StdinCommand::parse("restart\n"), Some(StdinCommand::Restart));
        assert_eq!(StdinCommand::parse(" r "), Some(StdinCommand::Reload));
        assert_eq!(StdinCommand::parse("reload"), Some(StdinCommand::Reload));
        assert_eq!(StdinCommand::parse("q"), Some(StdinCommand::Quit));
        assert_eq!(StdinCommand::parse("quit"), Some(StdinCommand::Quit));
        assert_eq!(StdinCommand::parse("stop"), None);
        assert_eq!(StdinCommand::parse(""), None);
    }

    #[test]
    fn test_no_flags_override_nothing() {
        let args = parse(&[]);
        assert_eq!(args.resolve_open(), None);
        assert_eq!(args.resolve_live_reload_enabled(), None);
        assert!(!args.indexes);
    }

    #[test]
    fn test_open_flags() {
        assert_eq!(
            parse(&["--open", "/docs/"]).resolve_open(),
            Some(Some("/docs/".to_owned()))
        );
        assert_eq!(parse(&["--no-open"]).resolve_open(), Some(None));
    }

    #[test]
    fn test_open_conflicts_with_no_open() {
        let result = TestCli::try_parse_from(["tss", "--open", "/", "--no-open"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_live_reload_flags() {
        assert_eq!(
            parse(&["--no-live-reload"]).resolve_live_reload_enabled(),
            Some(false)
        );
        assert_eq!(
            parse(&["--live-reload", "true"]).resolve_live_reload_enabled(),
            Some(true)
        );
    }

    #[test]
    fn test_ports_and_root() {
        let args = parse(&["-p", "5000", "--live-reload-port", "35729", "-r", "site"]);
        assert_eq!(args.port, Some(5000));
        assert_eq!(args.live_reload_port, Some(35729));
        assert_eq!(args.root, Some(PathBuf::from("site")));
    }
}
