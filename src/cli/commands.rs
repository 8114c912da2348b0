use clap::{Args, Subcommand};

/// Database and collection a command works on
#[derive(Debug, Clone, Args)]
pub struct Target {
    pub database: String,
    pub collection: String,
}

/// Commands available from the command line
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Set up a database so that collections can be created in it
    CreateDatabase { database: String },

    /// Create an empty collection
    Create {
        #[clap(flatten)]
        target: Target,
    },

    /// Print the number of documents in a collection
    Count {
        #[clap(flatten)]
        target: Target,
    },

    /// Insert documents given as JSON objects, printing their positions
    Insert {
        #[clap(flatten)]
        target: Target,
        #[clap(required = true)]
        documents: Vec<String>,
    },

    /// Print matching documents, one JSON object per line
    Find {
        #[clap(flatten)]
        target: Target,
        /// Equality query, e.g. '{"status": "open"}'
        #[clap(long, default_value = "{}")]
        query: String,
        /// Sort document, e.g. '{"total": -1}'; defaults to insertion order
        #[clap(long)]
        sort: Option<String>,
        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        skip: i64,
        /// 0 or less for no limit
        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        limit: i64,
    },

    /// Remove the document with the same identifier as the given one
    Remove {
        #[clap(flatten)]
        target: Target,
        document: String,
    },

    /// Give a collection a new name
    Rename {
        #[clap(flatten)]
        target: Target,
        new_collection: String,
        /// Defaults to the current database
        #[clap(long)]
        new_database: Option<String>,
    },

    /// Print the tracked byte size of a collection
    Size {
        #[clap(flatten)]
        target: Target,
    },

    /// Drop a collection and all of its documents
    Drop {
        #[clap(flatten)]
        target: Target,
    },
}
