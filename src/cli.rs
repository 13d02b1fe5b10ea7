use clap::{Parser, Subcommand};
use persona_rec::Role;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recommend personas for a user
    Recommend {
        /// User id
        #[clap(short, long)]
        user: String,

        /// Content weight in [0.0, 1.0]; the rest goes to similar users.
        /// Uses the configured value when omitted.
        #[clap(short, long)]
        alpha: Option<f32>,

        /// Number of personas to return
        #[clap(short, long)]
        k: Option<usize>,

        /// Print scores and the selection strategy
        #[clap(short, long, default_value = "false")]
        explain: bool,
    },
    /// List available personas
    Personas {},
    /// Append a message to the conversation log
    Log {
        /// User id
        #[clap(short, long)]
        user: String,

        /// Persona id
        #[clap(short, long)]
        persona: String,

        /// Who wrote the message: human or ai
        #[clap(short, long, default_value = "human")]
        role: Role,

        /// Message text
        #[clap(allow_hyphen_values = true)]
        content: String,
    },
    /// Show a user's recent messages, newest first
    History {
        /// User id
        #[clap(short, long)]
        user: String,

        /// Only messages with this persona
        #[clap(short, long)]
        persona: Option<String>,

        /// Maximum number of messages
        #[clap(short, long, default_value = "20")]
        limit: usize,
    },
}
