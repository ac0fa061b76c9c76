use crate::demo::{run_demo, DemoArgs};
use crate::migrate::run_migrations;
use crate::server;
use clap::{Args, Parser, Subcommand};
use staffdocs::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "staffdocs-api",
    about = "Track, collect, and serve employee compliance documents",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Apply pending PostgreSQL migrations against DATABASE_URL
    Migrate,
    /// Walk through association, upload, and disassociation on an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Migrate => run_migrations().await,
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["staffdocs-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from(["staffdocs-api", "serve", "--port", "8080"])
            .expect("parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.host.is_none());
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn demo_and_migrate_parse() {
        assert!(matches!(
            Cli::try_parse_from(["staffdocs-api", "migrate"]).map(|cli| cli.command),
            Ok(Some(Command::Migrate))
        ));
        assert!(matches!(
            Cli::try_parse_from(["staffdocs-api", "demo", "--json"]).map(|cli| cli.command),
            Ok(Some(Command::Demo(DemoArgs { json: true })))
        ));
    }
}
