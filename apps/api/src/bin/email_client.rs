//! Terminal client for the sales email demo.
//!
//! Streams a generation, renders the email as it is reconstructed, and can
//! rate the result afterwards.

use std::io::{self, Write};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use salesmail::client::{DemoClient, GenerationSession, SessionUpdate};
use salesmail::models::email::FeedbackRating;

#[derive(Parser)]
#[command(name = "email-client", version, about = "Sales email demo client")]
struct Cli {
    /// Base URL of the demo API.
    #[arg(long, env = "EMAIL_API_URL", default_value = "http://localhost:8000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the customers emails can be generated for.
    Companies,

    /// Generate a follow-up email and optionally rate it.
    Generate {
        /// Customer name exactly as listed by `companies`.
        #[arg(long)]
        customer: String,

        /// Extra instructions for the writer.
        #[arg(long)]
        instructions: Option<String>,

        /// Rate the finished email.
        #[arg(long, value_enum)]
        rate: Option<Rating>,

        /// Comment sent along with the rating.
        #[arg(long, requires = "rate")]
        comment: Option<String>,

        /// Sales rep name recorded as the feedback source.
        #[arg(long, requires = "rate")]
        rep: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Rating {
    Up,
    Down,
}

impl From<Rating> for FeedbackRating {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Up => FeedbackRating::Up,
            Rating::Down => FeedbackRating::Down,
        }
    }
}

/// Prints the subject once and the body as an append-only tail.
#[derive(Default)]
struct Renderer {
    subject_shown: bool,
    body_shown: String,
}

impl Renderer {
    fn render(
        &mut self,
        out: &mut impl Write,
        subject: Option<&str>,
        body: Option<&str>,
    ) -> io::Result<()> {
        if let (false, Some(subject)) = (self.subject_shown, subject) {
            writeln!(out, "Subject: {subject}\n")?;
            self.subject_shown = true;
        }
        if let Some(body) = body {
            match body.strip_prefix(self.body_shown.as_str()) {
                Some(tail) => write!(out, "{tail}")?,
                // reconstruction revised earlier text; reprint the body
                None => write!(out, "\n\n{body}")?,
            }
            self.body_shown = body.to_string();
        }
        out.flush()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = DemoClient::new(&cli.server)?;

    match cli.command {
        Command::Companies => {
            for company in client.companies().await? {
                println!("{}", company.name);
            }
        }
        Command::Generate {
            customer,
            instructions,
            rate,
            comment,
            rep,
        } => {
            let mut session = GenerationSession::new(customer, instructions);
            let mut renderer = Renderer::default();
            let mut stdout = io::stdout();
            let mut write_error: Option<io::Error> = None;

            client
                .generate(&mut session, |session, update| match update {
                    SessionUpdate::Progress(_) | SessionUpdate::Completed { .. } => {
                        if write_error.is_some() {
                            return;
                        }
                        let email = session.email();
                        if let Err(e) = renderer.render(
                            &mut stdout,
                            email.subject_line.as_deref(),
                            email.body.as_deref(),
                        ) {
                            write_error = Some(e);
                        }
                    }
                    SessionUpdate::Failed(message) => eprintln!("\nError: {message}"),
                    SessionUpdate::Ignored => {}
                })
                .await?;
            if let Some(e) = write_error {
                return Err(anyhow::Error::new(e).context("Failed to write to stdout"));
            }
            println!();

            if let Some(error) = session.error() {
                bail!("Generation failed: {error}");
            }
            if let Some(trace_id) = session.trace_id() {
                println!("\nTrace: {trace_id}");
            }

            if let Some(rating) = rate {
                let response = client
                    .submit_feedback(&session, rating.into(), comment, rep)
                    .await?;
                println!("{}", response.message);
                if !response.success {
                    bail!("Feedback was not recorded");
                }
            }
        }
    }

    Ok(())
}
