use crate::demo::{run_demo, run_exemption_import, DemoArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use jobboard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "jobboard",
    about = "Run and demonstrate the job board recruitment engine from the command line",
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
    /// Walk one application from submission to the committee decision
    Demo(DemoArgs),
    /// Load individual exemptions from a CSV export and print the import report
    ImportExemptions(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Preload the sample convocatoria, document catalog and applicants
    #[arg(long)]
    pub(crate) seed_sample: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::ImportExemptions(args) => run_exemption_import(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["jobboard"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn import_requires_a_path() {
        assert!(Cli::try_parse_from(["jobboard", "import-exemptions"]).is_err());
        let cli = Cli::try_parse_from([
            "jobboard",
            "import-exemptions",
            "--path",
            "exemptions.csv",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::ImportExemptions(args)) => {
                assert_eq!(args.path.to_str(), Some("exemptions.csv"));
                assert!(args.actor.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn demo_accepts_an_interview_day() {
        let cli = Cli::try_parse_from(["jobboard", "demo", "--interview-day", "2025-03-12"])
            .expect("parses");
        assert!(matches!(
            cli.command,
            Some(Command::Demo(DemoArgs {
                interview_day: Some(_),
                ..
            }))
        ));
    }
}
