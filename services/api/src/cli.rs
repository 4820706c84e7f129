use crate::demo::{run_attainment_report, run_demo, AttainmentReportArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use iems::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "IEMS Attainment Engine",
    about = "Run the exam, marks, and CO/PO attainment service from the command line",
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
    /// Compute attainment reports from marks spreadsheets
    Attainment {
        #[command(subcommand)]
        command: AttainmentCommand,
    },
    /// Walk through exam lifecycle, marks entry, and attainment on seeded data
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum AttainmentCommand {
    /// Import a marks CSV for the demo subject and print CO/PO attainment
    Report(AttainmentReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the demo subject, cohort, and published assessments on startup
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Attainment {
            command: AttainmentCommand::Report(args),
        } => run_attainment_report(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use iems::academics::{AggregationMethod, ExamType};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_command_parses_marks_and_filters() {
        let cli = Cli::try_parse_from([
            "iems-api",
            "attainment",
            "report",
            "--marks",
            "marks.csv",
            "--exam-type",
            "external",
            "--method",
            "weighted",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Attainment {
                command: AttainmentCommand::Report(args),
            }) => {
                assert_eq!(args.marks.to_str(), Some("marks.csv"));
                assert_eq!(args.exam_type, ExamType::External);
                assert_eq!(args.method, Some(AggregationMethod::Weighted));
                assert!(!args.csv);
            }
            other => panic!("expected report command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["iems-api"]).expect("no arguments parse");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["iems-api", "serve", "--port", "8080", "--seed-demo"])
            .expect("serve parses");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.seed_demo);
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }
}
