use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for godray")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc in sequence
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Run only the GPU integration tests, with output
    GpuTest,
    /// Run the sphere generation benchmark
    Bench,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            for step in [Step::Fmt, Step::Clippy, Step::Test, Step::Doc] {
                step.run()?;
            }
        }
        Commands::Fmt => Step::Fmt.run()?,
        Commands::Clippy => Step::Clippy.run()?,
        Commands::Test => Step::Test.run()?,
        Commands::GpuTest => Step::GpuTest.run()?,
        Commands::Bench => Step::Bench.run()?,
        Commands::Doc => Step::Doc.run()?,
        Commands::Build => Step::Build.run()?,
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Step {
    Fmt,
    Clippy,
    Test,
    GpuTest,
    Bench,
    Doc,
    Build,
}

impl Step {
    fn args(self) -> &'static [&'static str] {
        match self {
            Step::Fmt => &["fmt", "--all", "--", "--check"],
            Step::Clippy => &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            Step::Test => &["test", "--workspace"],
            Step::GpuTest => &[
                "test",
                "-p",
                "godray-render-wgpu",
                "--test",
                "headless",
                "--",
                "--nocapture",
            ],
            Step::Bench => &["bench", "-p", "godray-geometry"],
            Step::Doc => &["doc", "--workspace", "--no-deps"],
            Step::Build => &["build", "--workspace"],
        }
    }

    fn run(self) -> Result<()> {
        let args = self.args();
        println!("==> Running cargo {}", args.join(" "));
        let status = Command::new("cargo").args(args).status()?;
        if !status.success() {
            anyhow::bail!("cargo {} failed", args[0]);
        }
        Ok(())
    }
}
