//! Pipeloom CLI
//!
//! Command line workbench for designing ETL pipelines.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod project;

/// Pipeloom - visual ETL pipeline workbench
#[derive(Parser)]
#[command(name = "pipeloom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory or pipeloom.yaml path
    #[arg(short, long, default_value = ".", env = "PIPELOOM_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Pipeloom project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Use the built-in demo backend
        #[arg(long)]
        demo: bool,
    },

    /// Show project status
    Status {
        /// Also check that the backend is reachable
        #[arg(long)]
        probe: bool,
    },

    /// Log in
    Login {
        /// User name
        user: String,
    },

    /// Log out
    Logout,

    /// Manage the CORS proxy prefix
    Proxy {
        #[command(subcommand)]
        command: ProxyCommands,
    },

    /// Manage database connections
    Connection {
        #[command(subcommand)]
        command: ConnectionCommands,
    },

    /// Browse cached schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },

    /// Select and preview tables
    Table {
        #[command(subcommand)]
        command: TableCommands,
    },

    /// Transform the selected table
    Transform {
        #[command(subcommand)]
        command: TransformCommands,
    },

    /// Edit the pipeline graph
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },

    /// Upload a CSV, TSV, JSON or JSON-lines file as a table
    Upload {
        /// File to upload
        file: String,

        /// Rows to print after uploading
        #[arg(long, default_value_t = 5)]
        preview: usize,
    },
}

#[derive(Subcommand)]
enum ProxyCommands {
    /// Prefix every backend URL with a proxy
    Set {
        /// Proxy URL
        url: String,
    },

    /// Talk to the backend directly
    Clear,
}

#[derive(Subcommand)]
enum ConnectionCommands {
    /// Register a connection
    Add(commands::connection::AddArgs),

    /// List connections
    List,

    /// Show connection details
    Show {
        /// Connection name or id
        connection: String,
    },

    /// Remove a connection with its cached schemas
    Remove {
        /// Connection name or id
        connection: String,
    },

    /// Test connectivity (all connections when none is named)
    Test {
        /// Connection name or id
        connection: Option<String>,
    },

    /// Pick the database a connection works against
    SelectDb {
        /// Connection name or id
        connection: String,

        /// Database name
        database: String,
    },

    /// Forget the selected database of a connection
    ClearDb {
        /// Connection name or id
        connection: String,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Reload the schemas of a connection
    Fetch {
        /// Connection name or id
        connection: String,
    },

    /// Print cached schemas
    Show {
        /// Connection name or id
        connection: String,

        /// Only this schema
        #[arg(short, long)]
        schema: Option<String>,
    },
}

#[derive(Subcommand)]
enum TableCommands {
    /// Make a table active
    Select {
        /// Connection name or id
        connection: String,

        /// Schema name
        schema: String,

        /// Table name
        table: String,
    },

    /// Preview rows of the active table
    Preview,
}

#[derive(Subcommand)]
enum TransformCommands {
    /// Interpret an instruction against a table
    Run {
        /// Instruction, e.g. "rename email to contact; drop column notes"
        instruction: String,

        /// Target table (defaults to the active table)
        #[arg(short, long)]
        table: Option<String>,

        /// Target schema (defaults to the active table's schema)
        #[arg(short, long)]
        schema: Option<String>,

        /// Accept any instruction without interpreting it
        #[arg(long)]
        passthrough: bool,
    },

    /// Apply the pending plan to preview rows
    Preview,

    /// Add the pending plan to the pipeline
    Commit,

    /// Drop the pending plan
    Discard,
}

#[derive(Subcommand)]
enum PipelineCommands {
    /// Add a table node
    AddTable {
        /// Copy columns from a cached table, as schema.table
        #[arg(long)]
        from: Option<String>,

        /// Connection owning the cached table
        #[arg(long, requires = "from")]
        connection: Option<String>,
    },

    /// Connect two nodes
    Connect {
        /// Source node id
        source: String,

        /// Target node id
        target: String,
    },

    /// Flag nodes or edges for deletion
    Select {
        /// Node or edge ids
        ids: Vec<String>,

        /// Flag everything
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Unflag instead
        #[arg(long)]
        clear: bool,
    },

    /// Delete flagged nodes and edges
    DeleteSelected,

    /// Remove a node (with its edges) or an edge by id
    Remove {
        /// Node or edge id
        id: String,
    },

    /// Lay out a cached schema as nodes and relationships
    Seed {
        /// Connection name or id
        connection: String,

        /// Schema name
        schema: String,
    },

    /// Export the pipeline as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace the pipeline from an export
    Import {
        /// Exported JSON file
        file: String,
    },

    /// Print nodes and edges
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_str();
    match cli.command {
        Commands::Init { path, name, demo } => {
            commands::init::run(&path, name.as_deref(), demo).await?;
        }
        Commands::Status { probe } => {
            commands::status::run(config, probe).await?;
        }
        Commands::Login { user } => {
            commands::session::login(config, &user).await?;
        }
        Commands::Logout => {
            commands::session::logout(config).await?;
        }
        Commands::Proxy { command } => match command {
            ProxyCommands::Set { url } => commands::session::set_proxy(config, Some(&url)).await?,
            ProxyCommands::Clear => commands::session::set_proxy(config, None).await?,
        },
        Commands::Connection { command } => match command {
            ConnectionCommands::Add(args) => commands::connection::add(config, args).await?,
            ConnectionCommands::List => commands::connection::list(config).await?,
            ConnectionCommands::Show { connection } => {
                commands::connection::show(config, &connection).await?;
            }
            ConnectionCommands::Remove { connection } => {
                commands::connection::remove(config, &connection).await?;
            }
            ConnectionCommands::Test { connection } => {
                commands::connection::test(config, connection.as_deref()).await?;
            }
            ConnectionCommands::SelectDb {
                connection,
                database,
            } => {
                commands::connection::select_db(config, &connection, &database).await?;
            }
            ConnectionCommands::ClearDb { connection } => {
                commands::connection::clear_db(config, &connection).await?;
            }
        },
        Commands::Schema { command } => match command {
            SchemaCommands::Fetch { connection } => {
                commands::schema::fetch(config, &connection).await?;
            }
            SchemaCommands::Show { connection, schema } => {
                commands::schema::show(config, &connection, schema.as_deref()).await?;
            }
        },
        Commands::Table { command } => match command {
            TableCommands::Select {
                connection,
                schema,
                table,
            } => {
                commands::table::select(config, &connection, &schema, &table).await?;
            }
            TableCommands::Preview => commands::table::preview(config).await?,
        },
        Commands::Transform { command } => match command {
            TransformCommands::Run {
                instruction,
                table,
                schema,
                passthrough,
            } => {
                commands::transform::run(
                    config,
                    &instruction,
                    table.as_deref(),
                    schema.as_deref(),
                    passthrough,
                )
                .await?;
            }
            TransformCommands::Preview => commands::transform::preview(config).await?,
            TransformCommands::Commit => commands::transform::commit(config).await?,
            TransformCommands::Discard => commands::transform::discard(config).await?,
        },
        Commands::Pipeline { command } => match command {
            PipelineCommands::AddTable { from, connection } => {
                commands::pipeline::add_table(config, from.as_deref(), connection.as_deref())
                    .await?;
            }
            PipelineCommands::Connect { source, target } => {
                commands::pipeline::connect(config, &source, &target).await?;
            }
            PipelineCommands::Select { ids, all, clear } => {
                commands::pipeline::select(config, &ids, all, clear).await?;
            }
            PipelineCommands::DeleteSelected => {
                commands::pipeline::delete_selected(config).await?;
            }
            PipelineCommands::Remove { id } => {
                commands::pipeline::remove(config, &id).await?;
            }
            PipelineCommands::Seed { connection, schema } => {
                commands::pipeline::seed(config, &connection, &schema).await?;
            }
            PipelineCommands::Export { output } => {
                commands::pipeline::export(config, output.as_deref()).await?;
            }
            PipelineCommands::Import { file } => {
                commands::pipeline::import(config, &file).await?;
            }
            PipelineCommands::Show => commands::pipeline::show(config).await?,
        },
        Commands::Upload { file, preview } => {
            commands::upload::run(config, &file, preview).await?;
        }
    }

    Ok(())
}
