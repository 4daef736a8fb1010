use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "histvault")]
#[command(author, version, about = "Inspect and edit stored chat histories", long_about = None)]
pub struct Cli {
    /// User id (partition key)
    #[arg(short = 'u', long, default_value = "default")]
    pub user: String,

    /// Session id (document id)
    #[arg(short = 's', long, default_value = "default")]
    pub session: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Human,
    Ai,
    System,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the stored history
    Show,

    /// Append one message
    Add {
        #[arg(short = 'r', long, value_enum, default_value = "human")]
        role: RoleArg,

        text: String,
    },

    /// Delete the stored history
    Clear,

    /// Replace the history with messages from a JSON array file
    Replace { file: String },
}
