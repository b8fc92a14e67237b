//! Clap CLI definitions for the `sw` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// sw -- build agents out of typed steps.
#[derive(Parser, Debug)]
#[command(
    name = "sw",
    about = "Build agents out of typed steps",
    long_about = "Assemble agents from ordered blocks, bind values between them with variables, \
                  and keep them in a local store.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database path (default: .stepwise/stepwise.db or the `db` config key).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Owner recorded on new agents and templates (default: config, then $USER).
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a .stepwise directory here.
    Init(InitArgs),

    /// Manage agents.
    Agent(AgentArgs),

    /// Edit the blocks of an agent.
    Block(BlockArgs),

    /// Manage an agent's variables.
    #[command(alias = "variable")]
    Var(VarArgs),

    /// Manage named data sources.
    Source(SourceArgs),

    /// Resolve @{...} references in a block or a piece of text.
    Resolve(ResolveArgs),

    /// Manage agent templates.
    Template(TemplateArgs),

    /// Merge an execution report into its agent.
    Results(ResultsArgs),

    /// Print version information.
    Version,

    /// Generate shell completion scripts.
    Completion(CompletionArgs),
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Arguments for `sw init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-initialize even if a database already exists.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Arguments for `sw agent`.
#[derive(Args, Debug)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

/// Agent subcommands.
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Create an empty agent.
    Create(AgentCreateArgs),
    /// List agents, newest first.
    List(AgentListArgs),
    /// Show an agent with its blocks and variables.
    Show(AgentRefArgs),
    /// Delete an agent and its variables.
    Delete(AgentIdArgs),
    /// Rename an agent.
    Rename(AgentRenameArgs),
    /// Make an agent the active one.
    Use(AgentIdArgs),
}

/// Arguments for `sw agent create`.
#[derive(Args, Debug)]
pub struct AgentCreateArgs {
    /// Agent name.
    pub name: String,

    /// Also make the new agent the active one.
    #[arg(long = "use")]
    pub use_it: bool,
}

/// Arguments for `sw agent list`.
#[derive(Args, Debug)]
pub struct AgentListArgs {
    /// Only agents with this owner.
    #[arg(long = "by", value_name = "OWNER", conflicts_with = "mine")]
    pub by: Option<String>,

    /// Only agents owned by the current owner.
    #[arg(long)]
    pub mine: bool,
}

/// An optional agent id (default: the active agent).
#[derive(Args, Debug)]
pub struct AgentRefArgs {
    /// Agent id (default: active agent).
    pub id: Option<String>,
}

/// A required agent id.
#[derive(Args, Debug)]
pub struct AgentIdArgs {
    /// Agent id.
    pub id: String,
}

/// Arguments for `sw agent rename`.
#[derive(Args, Debug)]
pub struct AgentRenameArgs {
    /// Agent id.
    pub id: String,
    /// New name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Arguments for `sw block`.
#[derive(Args, Debug)]
pub struct BlockArgs {
    /// Agent id (default: active agent).
    #[arg(long, global = true)]
    pub agent: Option<String>,

    #[command(subcommand)]
    pub command: BlockCommands,
}

/// Block subcommands.
#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// Add a block.
    Add(BlockAddArgs),
    /// Change fields of a block.
    Update(BlockUpdateArgs),
    /// Remove a block. Other blocks keep their numbers.
    #[command(alias = "rm")]
    Remove(BlockNumberArgs),
    /// List blocks in execution order.
    List,
    /// Show one block.
    Show(BlockNumberArgs),
    /// Duplicate a block under the next free number.
    Copy(BlockNumberArgs),
    /// Move a block to another position and renumber 1..n.
    Move(BlockMoveArgs),
}

/// Fields shared by `block add` and `block update`.
#[derive(Args, Debug, Default)]
pub struct BlockFieldArgs {
    /// Display name.
    #[arg(long)]
    pub name: Option<String>,

    /// System prompt.
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// User prompt; may contain @{today} and @{source} markers.
    #[arg(long)]
    pub user_prompt: Option<String>,

    /// Variable (name or id) that receives the block's output.
    #[arg(long)]
    pub output: Option<String>,

    /// Column of a table variable that receives the output.
    #[arg(long, requires = "output")]
    pub column: Option<String>,

    /// Skip the block when executing.
    #[arg(long)]
    pub skip: Option<bool>,

    /// Save the block output as CSV.
    #[arg(long)]
    pub save_as_csv: Option<bool>,

    /// Mark the block as holding the agent's primary input.
    #[arg(long)]
    pub primary_input: Option<bool>,

    /// Kind-specific field as key=value (value parsed as JSON, else text).
    /// Variable fields such as selected_variable_id accept names.
    #[arg(long = "field", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

/// Arguments for `sw block add`.
#[derive(Args, Debug)]
pub struct BlockAddArgs {
    /// Block kind (agent-prompt, search, web-analysis, code, checkpoint, ...).
    pub kind: String,

    /// Block number to use instead of the next free one.
    #[arg(long)]
    pub at: Option<u32>,

    #[command(flatten)]
    pub fields: BlockFieldArgs,
}

/// Arguments for `sw block update`.
#[derive(Args, Debug)]
pub struct BlockUpdateArgs {
    /// Block number.
    pub number: u32,

    /// Drop the output binding.
    #[arg(long, conflicts_with = "output")]
    pub no_output: bool,

    #[command(flatten)]
    pub fields: BlockFieldArgs,
}

/// A block number.
#[derive(Args, Debug)]
pub struct BlockNumberArgs {
    /// Block number.
    pub number: u32,
}

/// Arguments for `sw block move`.
#[derive(Args, Debug)]
pub struct BlockMoveArgs {
    /// Current position (1-based).
    pub from: usize,
    /// New position (1-based).
    pub to: usize,
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Arguments for `sw var`.
#[derive(Args, Debug)]
pub struct VarArgs {
    /// Agent id (default: active agent).
    #[arg(long, global = true)]
    pub agent: Option<String>,

    #[command(subcommand)]
    pub command: VarCommands,
}

/// Variable subcommands.
#[derive(Subcommand, Debug)]
pub enum VarCommands {
    /// Add a variable.
    Add(VarAddArgs),
    /// Remove a variable no block references.
    #[command(alias = "rm")]
    Remove(VarRefArgs),
    /// List variables.
    List,
    /// Set a variable's value.
    Set(VarSetArgs),
    /// Rename a variable.
    Rename(VarRenameArgs),
}

/// Arguments for `sw var add`.
#[derive(Args, Debug)]
pub struct VarAddArgs {
    /// Variable name.
    pub name: String,

    /// Variable kind (input, intermediate, table).
    #[arg(short = 'k', long, default_value = "intermediate")]
    pub kind: String,
}

/// A variable name or id.
#[derive(Args, Debug)]
pub struct VarRefArgs {
    /// Variable name or id.
    pub variable: String,
}

/// Arguments for `sw var set`.
#[derive(Args, Debug)]
pub struct VarSetArgs {
    /// Variable name or id.
    pub variable: String,

    /// New value. Table variables take a JSON array of row objects.
    pub value: String,
}

/// Arguments for `sw var rename`.
#[derive(Args, Debug)]
pub struct VarRenameArgs {
    /// Variable name or id.
    pub variable: String,
    /// New name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Arguments for `sw source`.
#[derive(Args, Debug)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub command: SourceCommands,
}

/// Source subcommands.
#[derive(Subcommand, Debug)]
pub enum SourceCommands {
    /// Add or replace a source.
    Add(SourceAddArgs),
    /// Remove a source and its nickname.
    #[command(alias = "rm")]
    Remove(SourceNameArgs),
    /// List sources.
    List,
    /// Attach a display nickname to a source.
    Nickname(SourceNicknameArgs),
}

/// Arguments for `sw source add`.
#[derive(Args, Debug)]
pub struct SourceAddArgs {
    /// Source name, as used in @{name}.
    pub name: String,

    /// Source kind (image, csv, pdf, website, custom).
    #[arg(short = 'k', long, default_value = "custom")]
    pub kind: String,

    /// Read the processed data from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,

    /// Processed data given inline.
    #[arg(long)]
    pub data: Option<String>,
}

/// A source name.
#[derive(Args, Debug)]
pub struct SourceNameArgs {
    /// Source name.
    pub name: String,
}

/// Arguments for `sw source nickname`.
#[derive(Args, Debug)]
pub struct SourceNicknameArgs {
    /// Source name.
    pub name: String,
    /// Display nickname.
    pub nickname: String,
    /// Download URL of the underlying file.
    #[arg(long, default_value = "")]
    pub url: String,
}

// ---------------------------------------------------------------------------
// Resolve
// ---------------------------------------------------------------------------

/// Arguments for `sw resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Block number whose text fields are resolved.
    #[arg(required_unless_present = "text", conflicts_with = "text")]
    pub number: Option<u32>,

    /// Resolve this text instead of a block.
    #[arg(long)]
    pub text: Option<String>,

    /// Agent id (default: active agent).
    #[arg(long)]
    pub agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Arguments for `sw template`.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

/// Template subcommands.
#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Save an agent as a template.
    Create(TemplateCreateArgs),
    /// List templates.
    List,
    /// Show a template's blocks and variables.
    Show(TemplateIdArgs),
    /// Delete a template.
    Delete(TemplateIdArgs),
    /// Create a new agent from a template.
    Instantiate(TemplateInstantiateArgs),
}

/// Arguments for `sw template create`.
#[derive(Args, Debug)]
pub struct TemplateCreateArgs {
    /// Template name.
    pub name: String,

    /// Template description.
    #[arg(short = 'd', long, default_value = "")]
    pub description: String,

    /// Agent to snapshot (default: active agent).
    #[arg(long)]
    pub agent: Option<String>,
}

/// A template id.
#[derive(Args, Debug)]
pub struct TemplateIdArgs {
    /// Template id.
    pub id: String,
}

/// Arguments for `sw template instantiate`.
#[derive(Args, Debug)]
pub struct TemplateInstantiateArgs {
    /// Template id.
    pub id: String,

    /// Name of the new agent (default: "<template> (from template)").
    #[arg(long)]
    pub name: Option<String>,

    /// Make the new agent the active one.
    #[arg(long = "use")]
    pub use_it: bool,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Arguments for `sw results`.
#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Execution report JSON file (`-` for stdin).
    pub file: PathBuf,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Arguments for `sw completion`.
#[derive(Args, Debug)]
pub struct CompletionArgs {
    #[command(subcommand)]
    pub command: CompletionCommands,
}

/// Completion subcommands.
#[derive(Subcommand, Debug)]
pub enum CompletionCommands {
    /// Generate Bash completions.
    Bash,
    /// Generate Zsh completions.
    Zsh,
    /// Generate Fish completions.
    Fish,
    /// Generate PowerShell completions.
    Powershell,
}
