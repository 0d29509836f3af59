//! Command-line interface.
//!
//! `run` mirrors an interactive research session: ask for a query, show the
//! summary, then offer to email and display the full report. Any answer
//! given as a flag is not asked for.

use std::io::{self, BufRead, Write};

use clap::{Args, Parser, Subcommand};

use crate::agents::RunContext;
use crate::config::Config;
use crate::pipeline::ResearchPipeline;
use crate::schema::Report;
use crate::tools::EmailSendResult;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Parser)]
#[command(name = "newsletter-research", version, about = "Research a topic on the web and email the report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one research session in the terminal
    Run(RunArgs),
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Check that the required environment variables are set
    CheckEnv,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Research query (prompted for when omitted)
    #[arg(long, short)]
    pub query: Option<String>,

    /// Email the report without asking (`--send-email false` to skip)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub send_email: Option<bool>,

    /// Recipient address, defaults to DEFAULT_RECIPIENT_EMAIL
    #[arg(long)]
    pub recipient: Option<String>,

    /// Print the full report without asking (`--show-report false` to skip)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub show_report: Option<bool>,
}

#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    pub fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

/// Run an interactive research session.
pub async fn run(config: Config, args: RunArgs) -> anyhow::Result<()> {
    let query = match args.query {
        Some(q) => q,
        None => prompt("Enter your research query: ")?,
    };
    let query = query.trim().to_string();
    if query.is_empty() {
        println!("No query provided. Exiting...");
        return Ok(());
    }

    let recipient = args
        .recipient
        .unwrap_or_else(|| config.email.default_recipient.clone());
    let pipeline = ResearchPipeline::from_config(&config);
    let ctx = RunContext::new(query.as_str(), recipient);

    println!("\nStarting research for: '{}'\n", query);
    let outcome = pipeline.run(&query, &ctx, false).await?;
    print!("{}", format_summary(&outcome.report));

    println!("\n{}", "-".repeat(RULE_WIDTH));
    let send = match args.send_email {
        Some(choice) => choice,
        None => is_yes(&prompt("Would you like to send this report via email? (y/n): ")?),
    };
    if send {
        let result = pipeline.send_report_email(&outcome.report, &ctx).await;
        println!("{}", describe_email(&result));
    } else {
        println!("Report generated but not sent via email.");
    }

    let show = match args.show_report {
        Some(choice) => choice,
        None => is_yes(&prompt("Would you like to display the full report here? (y/n): ")?),
    };
    if show {
        println!("\n{}", "=".repeat(RULE_WIDTH));
        println!("FULL REPORT");
        println!("{}", "=".repeat(RULE_WIDTH));
        println!("{}", outcome.report.markdown_report);
    }

    Ok(())
}

/// Print the environment check and return whether everything required is set.
pub fn check_env() -> bool {
    let (text, ok) = env_report(|key| std::env::var(key).ok());
    print!("{}", text);
    ok
}

/// Environment variables worth checking, with whether each is required.
const CHECKED_VARS: &[(&str, &str, bool)] = &[
    ("OPENAI_API_KEY", "API key for the research agents", true),
    ("SENDGRID_API_KEY", "SendGrid API key for email sending", true),
    ("SENDER_EMAIL", "verified sender address", false),
    ("DEFAULT_RECIPIENT_EMAIL", "recipient for CLI runs", false),
];

fn env_report<F>(lookup: F) -> (String, bool)
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::from("Checking environment setup...\n\n");
    let mut all_good = true;

    for (name, description, required) in CHECKED_VARS {
        match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                out.push_str(&format!("[ok]      {}: {} ({})\n", name, mask_secret(&value), description));
            }
            None if *required => {
                out.push_str(&format!("[missing] {}: Not set ({})\n", name, description));
                all_good = false;
            }
            None => {
                out.push_str(&format!("[default] {}: Not set ({})\n", name, description));
            }
        }
    }

    out.push_str(&format!("\n{}\n", "=".repeat(50)));
    if all_good {
        out.push_str("All required environment variables are set.\n");
        out.push_str("You can now run:\n");
        out.push_str("  newsletter-research serve   (HTTP API)\n");
        out.push_str("  newsletter-research run     (command line)\n");
    } else {
        out.push_str("Missing environment variables!\n\n");
        out.push_str("Create a .env file in the working directory with:\n");
        out.push_str("OPENAI_API_KEY=your_openai_api_key_here\n");
        out.push_str("SENDGRID_API_KEY=your_sendgrid_api_key_here\n");
    }
    (out, all_good)
}

/// First 10 characters followed by `...` when longer.
fn mask_secret(value: &str) -> String {
    if value.chars().count() > 10 {
        let head: String = value.chars().take(10).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

fn format_summary(report: &Report) -> String {
    let mut out = format!("\n{}\nRESEARCH COMPLETE\n{}\n", "=".repeat(RULE_WIDTH), "=".repeat(RULE_WIDTH));
    out.push_str(&format!("\nSummary: {}\n", report.short_summary));
    out.push_str("\nFollow-up questions:\n");
    for (i, question) in report.follow_up_questions.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, question));
    }
    out
}

fn describe_email(result: &EmailSendResult) -> String {
    if result.is_success() {
        format!("Report has been sent via email to {}.", result.sent_to)
    } else {
        format!(
            "Email to {} failed: {}",
            result.sent_to,
            result.message.as_deref().unwrap_or("unknown error")
        )
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Read one line from stdin; end of input reads as an empty answer.
fn prompt(question: &str) -> io::Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
